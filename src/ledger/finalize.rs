// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The finalize-swap transaction.
//!
//! The processor builds a [`FinalizeSwap`], the signing delegate signs its
//! digest, and the ledger recovers the signer to authorise the call. The
//! transaction hash covers the signature, so resubmitting the same signed
//! bytes always yields the same hash.

use alloy::primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

use super::types::{Amount, IntentId, Nullifier, TicketId, VaultId};
use crate::crypto::session::verify_prehash;
use crate::crypto::SessionError;
use crate::gateway::Encrypted;

const FINALIZE_DOMAIN: &[u8] = b"sealed-swap/finalize-swap/v1";

/// What happens to the part of the source ticket that was not swapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Remainder {
    /// Whole ticket consumed; the ticket is burned.
    None,
    /// Ticket keeps a fresh pointer bound to a new note commitment.
    InPlace {
        pointer: Encrypted<Amount>,
        #[serde(with = "crate::crypto::hex_serde::string")]
        commitment: B256,
    },
    /// Ticket is burned and the remainder becomes a stealth output.
    Stealth {
        #[serde(with = "crate::crypto::hex_serde::string")]
        recipient: Address,
        pointer: Encrypted<Amount>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSwap {
    pub intent_id: IntentId,
    pub nullifier: Nullifier,
    pub vault_id: VaultId,
    pub ticket_id: TicketId,
    /// Real `token_in` released from reserves to the finalizer.
    pub from_amount: Amount,
    /// Real `token_out` paid into reserves by the finalizer.
    pub to_amount: Amount,
    pub remainder: Remainder,
    pub output_pointer: Encrypted<Amount>,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub output_recipient: Address,
}

impl FinalizeSwap {
    /// Canonical byte encoding handed to the signing delegate.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Digest signed by the finalizer key.
    pub fn digest(&self) -> B256 {
        let mut message = FINALIZE_DOMAIN.to_vec();
        message.extend_from_slice(&self.encode());
        keccak256(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedFinalize {
    pub tx: FinalizeSwap,
    #[serde(with = "crate::crypto::hex_serde::bytes")]
    pub signature: Vec<u8>,
}

impl SignedFinalize {
    pub fn tx_hash(&self) -> B256 {
        let mut message = self.tx.digest().to_vec();
        message.extend_from_slice(&self.signature);
        keccak256(message)
    }

    pub fn verify_signer(&self, expected: Address) -> Result<(), SessionError> {
        verify_prehash(&self.signature, &self.tx.digest(), expected)
    }
}

/// Result of a successful finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReceipt {
    pub intent_id: IntentId,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub tx_hash: B256,
    pub output_id: super::types::OutputId,
}
