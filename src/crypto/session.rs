// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session certificates for share requests.
//!
//! A requester signs one certificate with its identity key delegating to an
//! ephemeral session key for `ttl_min` minutes. Each share request is then
//! signed by the session key over `identifier ‖ response_public_key`, so a
//! custodian can tie every request to the identity the ledger policy is
//! evaluated against without the identity key touching each call.

use alloy::{
    primitives::{keccak256, Address, Signature, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use serde::{Deserialize, Serialize};

use super::identifier::EncryptionId;
use crate::clock::Clock;

/// Default session lifetime in minutes.
pub const DEFAULT_SESSION_TTL_MIN: u64 = 10;

const CERTIFICATE_DOMAIN: &[u8] = b"sealed-swap/session-certificate/v1";
const REQUEST_DOMAIN: &[u8] = b"sealed-swap/share-request/v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("signature is malformed")]
    MalformedSignature,

    #[error("signature does not match {expected}")]
    SignerMismatch { expected: Address },

    #[error("session expired")]
    Expired,

    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCertificate {
    #[serde(with = "super::hex_serde::string")]
    pub requester: Address,
    #[serde(with = "super::hex_serde::string")]
    pub session_address: Address,
    pub created_at_ms: u64,
    pub ttl_min: u64,
    #[serde(with = "super::hex_serde::bytes")]
    pub signature: Vec<u8>,
}

impl SessionCertificate {
    fn digest(requester: Address, session: Address, created_at_ms: u64, ttl_min: u64) -> B256 {
        let mut message = Vec::with_capacity(CERTIFICATE_DOMAIN.len() + 56);
        message.extend_from_slice(CERTIFICATE_DOMAIN);
        message.extend_from_slice(requester.as_slice());
        message.extend_from_slice(session.as_slice());
        message.extend_from_slice(&created_at_ms.to_be_bytes());
        message.extend_from_slice(&ttl_min.to_be_bytes());
        keccak256(message)
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.created_at_ms
            .saturating_add(self.ttl_min.saturating_mul(60_000))
    }

    /// Check the identity signature and the validity window.
    pub fn verify(&self, now_ms: u64) -> Result<(), SessionError> {
        if now_ms >= self.expires_at_ms() || now_ms < self.created_at_ms {
            return Err(SessionError::Expired);
        }
        let digest = Self::digest(
            self.requester,
            self.session_address,
            self.created_at_ms,
            self.ttl_min,
        );
        verify_prehash(&self.signature, &digest, self.requester)
    }

    /// Check a share request signed by this certificate's session key.
    pub fn verify_request(
        &self,
        id: &EncryptionId,
        response_key: &[u8],
        signature: &[u8],
    ) -> Result<(), SessionError> {
        verify_prehash(signature, &request_digest(id, response_key), self.session_address)
    }
}

fn request_digest(id: &EncryptionId, response_key: &[u8]) -> B256 {
    let mut message = Vec::with_capacity(REQUEST_DOMAIN.len() + 37 + response_key.len());
    message.extend_from_slice(REQUEST_DOMAIN);
    message.extend_from_slice(&id.to_bytes());
    message.extend_from_slice(response_key);
    keccak256(message)
}

/// Recover the signer of `digest` and compare it with `expected`.
pub fn verify_prehash(signature: &[u8], digest: &B256, expected: Address) -> Result<(), SessionError> {
    let signature =
        Signature::try_from(signature).map_err(|_| SessionError::MalformedSignature)?;
    let recovered = signature
        .recover_address_from_prehash(digest)
        .map_err(|_| SessionError::MalformedSignature)?;
    if recovered != expected {
        return Err(SessionError::SignerMismatch { expected });
    }
    Ok(())
}

/// Sign a 32-byte digest, returning the 65-byte `r ‖ s ‖ v` encoding.
pub fn sign_prehash(signer: &PrivateKeySigner, digest: &B256) -> Result<Vec<u8>, SessionError> {
    signer
        .sign_hash_sync(digest)
        .map(|sig| sig.as_bytes().to_vec())
        .map_err(|e| SessionError::Signing(e.to_string()))
}

/// A live decryption session: the certificate plus the session signing key.
///
/// This is the approval proof presented to the gateway on decrypt.
#[derive(Debug, Clone)]
pub struct SessionKey {
    certificate: SessionCertificate,
    session_signer: PrivateKeySigner,
}

impl SessionKey {
    pub fn new(
        identity: &PrivateKeySigner,
        ttl_min: u64,
        clock: &dyn Clock,
    ) -> Result<Self, SessionError> {
        let session_signer = PrivateKeySigner::random();
        let created_at_ms = clock.now_millis();
        let digest = SessionCertificate::digest(
            identity.address(),
            session_signer.address(),
            created_at_ms,
            ttl_min,
        );
        let signature = sign_prehash(identity, &digest)?;

        Ok(Self {
            certificate: SessionCertificate {
                requester: identity.address(),
                session_address: session_signer.address(),
                created_at_ms,
                ttl_min,
                signature,
            },
            session_signer,
        })
    }

    pub fn requester(&self) -> Address {
        self.certificate.requester
    }

    pub fn certificate(&self) -> &SessionCertificate {
        &self.certificate
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now_millis() >= self.certificate.expires_at_ms()
    }

    pub fn sign_request(&self, id: &EncryptionId, response_key: &[u8]) -> Result<Vec<u8>, SessionError> {
        sign_prehash(&self.session_signer, &request_digest(id, response_key))
    }
}
