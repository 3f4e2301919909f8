// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::{signer_from_hex, SignerKeyError};

/// Single-use receiving identity generated per swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StealthKeyRecord {
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub address: Address,
    /// Hex secp256k1 secret, never leaves the owner's storage.
    pub private_key: String,
    pub created_at: DateTime<Utc>,
    pub claimed: bool,
}

impl StealthKeyRecord {
    pub fn generate() -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            address: signer.address(),
            private_key: alloy::hex::encode(signer.to_bytes()),
            created_at: Utc::now(),
            claimed: false,
        }
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, SignerKeyError> {
        signer_from_hex(&self.private_key)
    }
}
