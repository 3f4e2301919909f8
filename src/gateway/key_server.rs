// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodian key servers.
//!
//! A key server holds one secp256k1 secret. For each ciphertext it can
//! unwrap exactly one share of the data key, and only after the ledger
//! approval policy accepts the requester for the ciphertext identifier.
//! The share is returned re-wrapped to the requester's one-shot response
//! key, never in the clear.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use k256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::crypto::{envelope, EncryptionId, SealedBox, SessionCertificate};

/// Why the ledger refused to authorise a decryption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PolicyError(pub String);

/// Approval predicate evaluated by custodians against ledger state.
pub trait ApprovalPolicy: Send + Sync {
    fn check_approval(&self, id: &EncryptionId, requester: Address) -> Result<(), PolicyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyServerError {
    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("invalid share request: {0}")]
    InvalidRequest(String),

    #[error("key server unavailable: {0}")]
    Unavailable(String),

    #[error("key server timed out")]
    Timeout,
}

impl KeyServerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchShareRequest {
    pub id: EncryptionId,
    pub index: u8,
    pub envelope: SealedBox,
    pub certificate: SessionCertificate,
    #[serde(with = "crate::crypto::hex_serde::bytes")]
    pub response_key: Vec<u8>,
    #[serde(with = "crate::crypto::hex_serde::bytes")]
    pub request_signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchShareResponse {
    pub server_id: String,
    pub index: u8,
    pub envelope: SealedBox,
}

/// AAD binding a wrapped share to its ciphertext and position.
pub fn share_aad(id: &EncryptionId, index: u8) -> Vec<u8> {
    let mut aad = id.to_bytes().to_vec();
    aad.push(index);
    aad
}

pub trait KeyServer: Send + Sync {
    fn id(&self) -> &str;

    fn public_key(&self) -> &PublicKey;

    fn fetch_share(
        &self,
        request: &FetchShareRequest,
    ) -> impl Future<Output = Result<FetchShareResponse, KeyServerError>> + Send;
}

// =============================================================================
// In-process custodian
// =============================================================================

pub struct LocalKeyServer {
    id: String,
    secret: SecretKey,
    public: PublicKey,
    policy: Arc<dyn ApprovalPolicy>,
    clock: Arc<dyn Clock>,
    online: std::sync::atomic::AtomicBool,
}

impl LocalKeyServer {
    pub fn new(
        id: impl Into<String>,
        secret: SecretKey,
        policy: Arc<dyn ApprovalPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let public = secret.public_key();
        Self {
            id: id.into(),
            secret,
            public,
            policy,
            clock,
            online: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn random(
        id: impl Into<String>,
        policy: Arc<dyn ApprovalPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(id, SecretKey::random(&mut rand::thread_rng()), policy, clock)
    }

    /// Simulate an outage (share requests fail with `Unavailable`).
    pub fn set_online(&self, online: bool) {
        self.online
            .store(online, std::sync::atomic::Ordering::SeqCst);
    }

    fn handle(&self, request: &FetchShareRequest) -> Result<FetchShareResponse, KeyServerError> {
        if !self.online.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(KeyServerError::Unavailable(format!("{} is offline", self.id)));
        }

        let cert = &request.certificate;
        cert.verify(self.clock.now_millis())
            .map_err(|e| KeyServerError::InvalidRequest(format!("certificate: {e}")))?;
        cert.verify_request(&request.id, &request.response_key, &request.request_signature)
            .map_err(|e| KeyServerError::InvalidRequest(format!("request signature: {e}")))?;

        self.policy
            .check_approval(&request.id, cert.requester)
            .map_err(|e| {
                warn!(
                    server = %self.id,
                    key_id = %request.id,
                    requester = %cert.requester,
                    reason = %e,
                    "Share request denied by policy"
                );
                KeyServerError::PolicyDenied(e.0)
            })?;

        let aad = share_aad(&request.id, request.index);
        let share = envelope::open(&self.secret, &request.envelope, &aad)
            .map_err(|e| KeyServerError::InvalidRequest(format!("share envelope: {e}")))?;
        let response_key = envelope::decode_public_key(&request.response_key)
            .map_err(|e| KeyServerError::InvalidRequest(format!("response key: {e}")))?;
        let rewrapped = envelope::seal(&response_key, &share, &aad)
            .map_err(|e| KeyServerError::Unavailable(e.to_string()))?;

        debug!(server = %self.id, key_id = %request.id, "Share released");
        Ok(FetchShareResponse {
            server_id: self.id.clone(),
            index: request.index,
            envelope: rewrapped,
        })
    }
}

impl KeyServer for LocalKeyServer {
    fn id(&self) -> &str {
        &self.id
    }

    fn public_key(&self) -> &PublicKey {
        &self.public
    }

    async fn fetch_share(
        &self,
        request: &FetchShareRequest,
    ) -> Result<FetchShareResponse, KeyServerError> {
        self.handle(request)
    }
}

// =============================================================================
// Remote custodian
// =============================================================================

/// Key server reached over HTTP at `POST {base_url}/v1/fetch_key`.
pub struct HttpKeyServer {
    id: String,
    base_url: String,
    public: PublicKey,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct RemoteError {
    error: String,
}

impl HttpKeyServer {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        public: PublicKey,
        timeout: Duration,
    ) -> Result<Self, KeyServerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyServerError::Unavailable(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            public,
            client,
        })
    }
}

impl KeyServer for HttpKeyServer {
    fn id(&self) -> &str {
        &self.id
    }

    fn public_key(&self) -> &PublicKey {
        &self.public
    }

    async fn fetch_share(
        &self,
        request: &FetchShareRequest,
    ) -> Result<FetchShareResponse, KeyServerError> {
        let url = format!("{}/v1/fetch_key", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KeyServerError::Timeout
                } else {
                    KeyServerError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<FetchShareResponse>()
                .await
                .map_err(|e| KeyServerError::InvalidRequest(format!("response body: {e}")));
        }

        let message = response
            .json::<RemoteError>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        match status.as_u16() {
            403 => Err(KeyServerError::PolicyDenied(message)),
            400..=499 => Err(KeyServerError::InvalidRequest(message)),
            _ => Err(KeyServerError::Unavailable(message)),
        }
    }
}

// =============================================================================
// Runtime selection
// =============================================================================

/// A custodian chosen at startup: in-process for development, remote otherwise.
pub enum Custodian {
    Local(LocalKeyServer),
    Remote(HttpKeyServer),
}

impl KeyServer for Custodian {
    fn id(&self) -> &str {
        match self {
            Self::Local(s) => s.id(),
            Self::Remote(s) => s.id(),
        }
    }

    fn public_key(&self) -> &PublicKey {
        match self {
            Self::Local(s) => s.public_key(),
            Self::Remote(s) => s.public_key(),
        }
    }

    async fn fetch_share(
        &self,
        request: &FetchShareRequest,
    ) -> Result<FetchShareResponse, KeyServerError> {
        match self {
            Self::Local(s) => s.fetch_share(request).await,
            Self::Remote(s) => s.fetch_share(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::SessionKey;
    use alloy::{primitives::B256, signers::local::PrivateKeySigner};

    struct AllowOnly(Address);

    impl ApprovalPolicy for AllowOnly {
        fn check_approval(&self, _id: &EncryptionId, requester: Address) -> Result<(), PolicyError> {
            if requester == self.0 {
                Ok(())
            } else {
                Err(PolicyError("not the owner".to_string()))
            }
        }
    }

    fn request_for(
        server: &LocalKeyServer,
        session: &SessionKey,
        response_secret: &SecretKey,
    ) -> (FetchShareRequest, Vec<u8>) {
        let id = EncryptionId::new(B256::repeat_byte(5));
        let share = vec![7u8; 32];
        let envelope = envelope::seal(server.public_key(), &share, &share_aad(&id, 1)).unwrap();
        let response_key = envelope::encode_public_key(&response_secret.public_key());
        let request_signature = session.sign_request(&id, &response_key).unwrap();
        (
            FetchShareRequest {
                id,
                index: 1,
                envelope,
                certificate: session.certificate().clone(),
                response_key,
                request_signature,
            },
            share,
        )
    }

    #[tokio::test]
    async fn releases_share_to_approved_requester() {
        let clock = Arc::new(ManualClock::at_secs(10_000));
        let owner = PrivateKeySigner::random();
        let server = LocalKeyServer::random("ks-1", Arc::new(AllowOnly(owner.address())), clock.clone());
        let session = SessionKey::new(&owner, 10, clock.as_ref()).unwrap();
        let response_secret = SecretKey::random(&mut rand::thread_rng());

        let (request, share) = request_for(&server, &session, &response_secret);
        let response = server.fetch_share(&request).await.unwrap();
        assert_eq!(response.server_id, "ks-1");
        let opened = envelope::open(
            &response_secret,
            &response.envelope,
            &share_aad(&request.id, request.index),
        )
        .unwrap();
        assert_eq!(opened, share);
    }

    #[tokio::test]
    async fn denies_other_requesters() {
        let clock = Arc::new(ManualClock::at_secs(10_000));
        let owner = PrivateKeySigner::random();
        let intruder = PrivateKeySigner::random();
        let server = LocalKeyServer::random("ks-1", Arc::new(AllowOnly(owner.address())), clock.clone());
        let session = SessionKey::new(&intruder, 10, clock.as_ref()).unwrap();
        let response_secret = SecretKey::random(&mut rand::thread_rng());

        let (request, _) = request_for(&server, &session, &response_secret);
        assert!(matches!(
            server.fetch_share(&request).await,
            Err(KeyServerError::PolicyDenied(_))
        ));
    }

    #[tokio::test]
    async fn rejects_expired_session_and_tampered_signature() {
        let clock = Arc::new(ManualClock::at_secs(10_000));
        let owner = PrivateKeySigner::random();
        let server = LocalKeyServer::random("ks-1", Arc::new(AllowOnly(owner.address())), clock.clone());
        let session = SessionKey::new(&owner, 10, clock.as_ref()).unwrap();
        let response_secret = SecretKey::random(&mut rand::thread_rng());

        let (mut request, _) = request_for(&server, &session, &response_secret);
        request.response_key = envelope::encode_public_key(
            &SecretKey::random(&mut rand::thread_rng()).public_key(),
        );
        assert!(matches!(
            server.fetch_share(&request).await,
            Err(KeyServerError::InvalidRequest(_))
        ));

        let (request, _) = request_for(&server, &session, &response_secret);
        clock.advance_secs(11 * 60);
        assert!(matches!(
            server.fetch_share(&request).await,
            Err(KeyServerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn offline_server_is_transient() {
        let clock = Arc::new(ManualClock::at_secs(10_000));
        let owner = PrivateKeySigner::random();
        let server = LocalKeyServer::random("ks-1", Arc::new(AllowOnly(owner.address())), clock.clone());
        let session = SessionKey::new(&owner, 10, clock.as_ref()).unwrap();
        let (request, _) = request_for(&server, &session, &SecretKey::random(&mut rand::thread_rng()));

        server.set_online(false);
        let err = server.fetch_share(&request).await.unwrap_err();
        assert!(err.is_transient());
    }
}
