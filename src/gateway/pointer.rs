// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Opaque threshold ciphertexts ("pointers").
//!
//! Wire format: standard base64 of the JSON [`ThresholdCiphertext`]
//! container. The identifier inside the container is the 37-byte
//! `namespace ‖ nonce` value the approval policy is evaluated against.
//!
//! [`Encrypted<T>`] is the only handle the rest of the crate sees. It can be
//! produced from plaintext only by the gateway, decoded from the wire with
//! structural validation, and read back only through a gateway decrypt with
//! an approval proof. When the ledger replaces or burns a pointer it calls
//! [`Encrypted::consume`], leaving a [`ConsumedPointer`] tombstone.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use alloy::primitives::B256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::GatewayError;
use crate::crypto::{envelope::NONCE_BYTES, EncryptionId, SealedBox};

pub const CONTAINER_VERSION: u8 = 1;

/// One custodian's share of the data key, wrapped to that custodian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedShare {
    pub server_id: String,
    pub index: u8,
    pub envelope: SealedBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCiphertext {
    pub version: u8,
    pub id: EncryptionId,
    pub threshold: u8,
    pub shares: Vec<WrappedShare>,
    #[serde(with = "crate::crypto::hex_serde::bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "crate::crypto::hex_serde::bytes")]
    pub ciphertext: Vec<u8>,
}

impl ThresholdCiphertext {
    fn validate(&self) -> Result<(), GatewayError> {
        if self.version != CONTAINER_VERSION {
            return Err(GatewayError::Malformed(format!(
                "unsupported container version {}",
                self.version
            )));
        }
        if self.threshold == 0 || usize::from(self.threshold) > self.shares.len() {
            return Err(GatewayError::Malformed(format!(
                "threshold {} with {} shares",
                self.threshold,
                self.shares.len()
            )));
        }
        let mut indices = HashSet::new();
        for share in &self.shares {
            if share.index == 0 || !indices.insert(share.index) {
                return Err(GatewayError::Malformed(format!(
                    "duplicate or zero share index {}",
                    share.index
                )));
            }
        }
        if self.nonce.len() != NONCE_BYTES {
            return Err(GatewayError::Malformed("bad payload nonce".to_string()));
        }
        Ok(())
    }
}

/// Plaintext types that may be sealed into a pointer.
pub trait Sealable: Sized {
    fn to_plaintext(&self) -> Vec<u8>;
    fn from_plaintext(bytes: &[u8]) -> Result<Self, GatewayError>;
}

/// Hidden token amounts are stored as their decimal string.
impl Sealable for u64 {
    fn to_plaintext(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn from_plaintext(bytes: &[u8]) -> Result<Self, GatewayError> {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GatewayError::Malformed("amount is not a decimal u64".to_string()))
    }
}

/// A typed, opaque threshold ciphertext.
pub struct Encrypted<T> {
    container: ThresholdCiphertext,
    _plaintext: PhantomData<fn() -> T>,
}

impl<T> Encrypted<T> {
    pub(super) fn from_container(container: ThresholdCiphertext) -> Self {
        Self {
            container,
            _plaintext: PhantomData,
        }
    }

    pub(super) fn container(&self) -> &ThresholdCiphertext {
        &self.container
    }

    pub fn id(&self) -> EncryptionId {
        self.container.id
    }

    pub fn namespace(&self) -> B256 {
        self.container.id.namespace()
    }

    pub fn threshold(&self) -> u8 {
        self.container.threshold
    }

    pub fn to_base64(&self) -> String {
        // Serializing a plain struct of strings and integers cannot fail.
        let json = serde_json::to_vec(&self.container).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode a pointer received over the wire. Only structure is checked;
    /// authenticity is established on decrypt.
    pub fn from_base64(encoded: &str) -> Result<Self, GatewayError> {
        let json = STANDARD
            .decode(encoded.trim())
            .map_err(|e| GatewayError::Malformed(format!("base64: {e}")))?;
        let container: ThresholdCiphertext = serde_json::from_slice(&json)
            .map_err(|e| GatewayError::Malformed(format!("container: {e}")))?;
        container.validate()?;
        Ok(Self::from_container(container))
    }

    /// Retire this pointer.
    pub fn consume(self) -> ConsumedPointer {
        ConsumedPointer {
            id: self.container.id,
        }
    }
}

impl<T> Clone for Encrypted<T> {
    fn clone(&self) -> Self {
        Self::from_container(self.container.clone())
    }
}

impl<T> PartialEq for Encrypted<T> {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
    }
}

impl<T> Eq for Encrypted<T> {}

impl<T> fmt::Debug for Encrypted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encrypted")
            .field("id", &self.container.id)
            .field("threshold", &self.container.threshold)
            .finish_non_exhaustive()
    }
}

impl<T> Serialize for Encrypted<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de, T> Deserialize<'de> for Encrypted<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_base64(&raw).map_err(serde::de::Error::custom)
    }
}

/// Tombstone of a pointer the ledger replaced or burned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedPointer {
    pub id: EncryptionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(threshold: u8, indices: &[u8]) -> ThresholdCiphertext {
        ThresholdCiphertext {
            version: CONTAINER_VERSION,
            id: EncryptionId::from_parts(B256::repeat_byte(3), [9; 5]),
            threshold,
            shares: indices
                .iter()
                .map(|&index| WrappedShare {
                    server_id: format!("ks-{index}"),
                    index,
                    envelope: SealedBox {
                        ephemeral_pubkey: vec![2; 33],
                        nonce: vec![0; 12],
                        ciphertext: vec![1, 2, 3],
                    },
                })
                .collect(),
            nonce: vec![0; NONCE_BYTES],
            ciphertext: vec![4, 5, 6],
        }
    }

    #[test]
    fn base64_wire_round_trip() {
        let pointer: Encrypted<u64> = Encrypted::from_container(container(2, &[1, 2, 3]));
        let wire = pointer.to_base64();
        let decoded = Encrypted::<u64>::from_base64(&wire).unwrap();
        assert_eq!(decoded, pointer);
        assert_eq!(decoded.id().to_bytes().len(), 37);
        assert_eq!(decoded.namespace(), B256::repeat_byte(3));
    }

    #[test]
    fn structural_validation() {
        for bad in [container(0, &[1, 2]), container(3, &[1, 2]), container(2, &[1, 1])] {
            let wire = Encrypted::<u64>::from_container(bad).to_base64();
            assert!(matches!(
                Encrypted::<u64>::from_base64(&wire),
                Err(GatewayError::Malformed(_))
            ));
        }
        assert!(Encrypted::<u64>::from_base64("not base64!").is_err());
        assert!(Encrypted::<u64>::from_base64(&STANDARD.encode(b"{}")).is_err());
    }

    #[test]
    fn serde_uses_wire_format() {
        let pointer: Encrypted<u64> = Encrypted::from_container(container(2, &[1, 2, 3]));
        let json = serde_json::to_value(&pointer).unwrap();
        assert_eq!(json.as_str().unwrap(), pointer.to_base64());
        let back: Encrypted<u64> = serde_json::from_value(json).unwrap();
        assert_eq!(back, pointer);
    }

    #[test]
    fn consume_keeps_identifier() {
        let pointer: Encrypted<u64> = Encrypted::from_container(container(2, &[1, 2]));
        let id = pointer.id();
        assert_eq!(pointer.consume().id, id);
    }

    #[test]
    fn amount_plaintext_is_decimal() {
        assert_eq!(500_000_000u64.to_plaintext(), b"500000000".to_vec());
        assert_eq!(u64::from_plaintext(b"42").unwrap(), 42);
        assert!(u64::from_plaintext(b"-1").is_err());
    }
}
