// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption identifiers.
//!
//! Every ciphertext is bound to `namespace (32 bytes) ‖ nonce (5 bytes)`.
//! The namespace is deterministic (a vault id, or a padded address for
//! stealth outputs) and is what the ledger approval predicate authorises
//! against; the nonce keeps identifiers under one namespace distinct.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256};
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub const NAMESPACE_LEN: usize = 32;
pub const NONCE_LEN: usize = 5;
pub const ID_LEN: usize = NAMESPACE_LEN + NONCE_LEN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("identifier is not valid hex: {0}")]
    InvalidHex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncryptionId {
    namespace: B256,
    nonce: [u8; NONCE_LEN],
}

impl EncryptionId {
    /// New identifier under `namespace` with a random nonce.
    pub fn new(namespace: B256) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self { namespace, nonce }
    }

    pub fn from_parts(namespace: B256, nonce: [u8; NONCE_LEN]) -> Self {
        Self { namespace, nonce }
    }

    pub fn namespace(&self) -> B256 {
        self.namespace
    }

    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        self.nonce
    }

    pub fn to_bytes(&self) -> [u8; ID_LEN] {
        let mut out = [0u8; ID_LEN];
        out[..NAMESPACE_LEN].copy_from_slice(self.namespace.as_slice());
        out[NAMESPACE_LEN..].copy_from_slice(&self.nonce);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        if bytes.len() != ID_LEN {
            return Err(IdentifierError::InvalidLength {
                expected: ID_LEN,
                actual: bytes.len(),
            });
        }
        let namespace = B256::from_slice(&bytes[..NAMESPACE_LEN]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[NAMESPACE_LEN..]);
        Ok(Self { namespace, nonce })
    }

    pub fn to_hex(&self) -> String {
        alloy::hex::encode(self.to_bytes())
    }
}

impl fmt::Display for EncryptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for EncryptionId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = alloy::hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for EncryptionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Namespace owned by a bare address: the address left-padded to 32 bytes.
pub fn address_namespace(address: Address) -> B256 {
    address.into_word()
}
