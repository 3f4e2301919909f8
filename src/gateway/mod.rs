// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encryption Gateway
//!
//! Threshold encryption of hidden amounts and swap payloads.
//!
//! ## Encrypt
//!
//! 1. Fresh 32-byte data key; payload sealed with ChaCha20-Poly1305, AAD =
//!    identifier bytes.
//! 2. Data key split with Shamir into one share per custodian.
//! 3. Each share ECIES-wrapped to its custodian, AAD = identifier ‖ index.
//!
//! Encryption needs no custodian round-trip.
//!
//! ## Decrypt
//!
//! The caller presents a [`SessionKey`] (the approval proof). Custodians are
//! asked one at a time until `threshold` shares are in hand; each custodian
//! re-checks the ledger policy, so nothing is cached between calls. A
//! denial does not stop the walk: the remaining custodians may still reach
//! quorum. Falling short with at least one denial yields `PolicyDenied`,
//! otherwise `ShareQuorumFailed`. Partial plaintext is never returned.

pub mod key_server;
pub mod pointer;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use k256::SecretKey;
use rand::RngCore;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::crypto::{envelope, shamir, EncryptionId, SessionError, SessionKey, Share};
use crate::retry::RetryPolicy;

pub use key_server::{
    share_aad, ApprovalPolicy, Custodian, FetchShareRequest, FetchShareResponse, HttpKeyServer,
    KeyServer, KeyServerError, LocalKeyServer, PolicyError,
};
pub use pointer::{ConsumedPointer, Encrypted, Sealable, ThresholdCiphertext, WrappedShare};

/// Default per-custodian fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default share quorum.
pub const DEFAULT_THRESHOLD: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("decryption denied: {0}")]
    PolicyDenied(String),

    #[error("share quorum not reached: {received} of {required}")]
    ShareQuorumFailed { received: usize, required: usize },

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("invalid threshold {threshold} for {servers} custodians")]
    InvalidThreshold { threshold: u8, servers: usize },

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("encryption failed: {0}")]
    Encryption(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

pub struct EncryptionGateway<K> {
    servers: Vec<K>,
    threshold: u8,
    fetch_timeout: Duration,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl<K: KeyServer> EncryptionGateway<K> {
    pub fn new(servers: Vec<K>, threshold: u8, clock: Arc<dyn Clock>) -> GatewayResult<Self> {
        check_threshold(threshold, servers.len())?;
        Ok(Self {
            servers,
            threshold,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryPolicy::default(),
            clock,
        })
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn servers(&self) -> &[K] {
        &self.servers
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Encrypt `value` under a fresh identifier in `namespace`.
    pub fn encrypt<T: Sealable>(
        &self,
        value: &T,
        namespace: B256,
        threshold: u8,
    ) -> GatewayResult<(Encrypted<T>, EncryptionId)> {
        check_threshold(threshold, self.servers.len())?;
        let id = EncryptionId::new(namespace);

        let mut data_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut data_key);
        let (nonce, ciphertext) = envelope::aead_seal(&data_key, &value.to_plaintext(), &id.to_bytes())
            .map_err(|e| GatewayError::Encryption(e.to_string()))?;

        let shares = shamir::split(&data_key, threshold, self.servers.len() as u8)
            .map_err(|e| GatewayError::Encryption(e.to_string()))?;

        let mut wrapped = Vec::with_capacity(shares.len());
        for (server, share) in self.servers.iter().zip(shares) {
            let envelope = envelope::seal(server.public_key(), &share.value, &share_aad(&id, share.index))
                .map_err(|e| GatewayError::Encryption(e.to_string()))?;
            wrapped.push(WrappedShare {
                server_id: server.id().to_string(),
                index: share.index,
                envelope,
            });
        }

        let container = ThresholdCiphertext {
            version: pointer::CONTAINER_VERSION,
            id,
            threshold,
            shares: wrapped,
            nonce: nonce.to_vec(),
            ciphertext,
        };
        Ok((Encrypted::from_container(container), id))
    }

    /// Encrypt with the gateway's configured threshold.
    pub fn seal<T: Sealable>(&self, value: &T, namespace: B256) -> GatewayResult<Encrypted<T>> {
        self.encrypt(value, namespace, self.threshold).map(|(pointer, _)| pointer)
    }

    pub async fn decrypt<T: Sealable>(
        &self,
        pointer: &Encrypted<T>,
        approval: &SessionKey,
    ) -> GatewayResult<T> {
        let container = pointer.container();
        let id = container.id;
        let required = usize::from(container.threshold);

        let response_secret = SecretKey::random(&mut rand::thread_rng());
        let response_key = envelope::encode_public_key(&response_secret.public_key());
        let request_signature = approval.sign_request(&id, &response_key)?;

        let mut shares: Vec<Share> = Vec::with_capacity(required);
        let mut denial: Option<String> = None;
        for wrapped in &container.shares {
            if shares.len() >= required {
                break;
            }
            let Some(server) = self.servers.iter().find(|s| s.id() == wrapped.server_id) else {
                warn!(key_id = %id, server = %wrapped.server_id, "No custodian configured for share");
                continue;
            };

            let request = FetchShareRequest {
                id,
                index: wrapped.index,
                envelope: wrapped.envelope.clone(),
                certificate: approval.certificate().clone(),
                response_key: response_key.clone(),
                request_signature: request_signature.clone(),
            };

            match self.fetch(server, &request).await {
                Ok(response) => {
                    match envelope::open(&response_secret, &response.envelope, &share_aad(&id, wrapped.index)) {
                        Ok(value) => shares.push(Share {
                            index: wrapped.index,
                            value,
                        }),
                        Err(e) => {
                            warn!(key_id = %id, server = server.id(), error = %e, "Custodian returned an unreadable share");
                        }
                    }
                }
                Err(KeyServerError::PolicyDenied(reason)) => {
                    warn!(key_id = %id, server = server.id(), reason = %reason, "Custodian denied share");
                    if denial.is_none() {
                        denial = Some(reason);
                    }
                }
                Err(e) => {
                    warn!(key_id = %id, server = server.id(), error = %e, "Share fetch failed");
                }
            }
        }

        if shares.len() < required {
            if let Some(reason) = denial {
                return Err(GatewayError::PolicyDenied(reason));
            }
            return Err(GatewayError::ShareQuorumFailed {
                received: shares.len(),
                required,
            });
        }

        let key_bytes = shamir::combine(&shares).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let data_key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| GatewayError::Malformed("data key has wrong length".to_string()))?;
        let plaintext = envelope::aead_open(&data_key, &container.nonce, &container.ciphertext, &id.to_bytes())
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        debug!(key_id = %id, shares = shares.len(), "Pointer decrypted");
        T::from_plaintext(&plaintext)
    }

    async fn fetch(
        &self,
        server: &K,
        request: &FetchShareRequest,
    ) -> Result<FetchShareResponse, KeyServerError> {
        self.retry
            .run(
                "fetch_share",
                || async {
                    tokio::time::timeout(self.fetch_timeout, server.fetch_share(request))
                        .await
                        .unwrap_or(Err(KeyServerError::Timeout))
                },
                KeyServerError::is_transient,
            )
            .await
    }
}

fn check_threshold(threshold: u8, servers: usize) -> GatewayResult<()> {
    if threshold == 0 || usize::from(threshold) > servers || servers > usize::from(u8::MAX) {
        return Err(GatewayError::InvalidThreshold { threshold, servers });
    }
    Ok(())
}
