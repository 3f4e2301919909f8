// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decrypted swap intent payload.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::types::{Amount, Nullifier, TicketId, TokenType, VaultId};
use crate::gateway::{GatewayError, Sealable};

/// Contents of an intent's encrypted payload, visible only to the owner and
/// the TEE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPayload {
    pub nullifier: Nullifier,
    pub vault_id: VaultId,
    pub ticket_id: TicketId,
    pub input_amount: Amount,
    pub token_in: TokenType,
    pub token_out: TokenType,
    /// Absolute floor on the output; `0` leaves only the slippage bound.
    pub min_output_amount: Amount,
    /// Tolerance applied to the venue quote, in basis points.
    pub slippage_bps: u16,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub output_stealth: Address,
    /// Where a non-zero remainder goes instead of staying on the ticket.
    #[serde(default, with = "crate::crypto::hex_serde::option_string")]
    pub remainder_stealth: Option<Address>,
    /// Commitment of the fresh note covering a remainder left on the ticket.
    #[serde(default, with = "crate::crypto::hex_serde::option_string")]
    pub remainder_commitment: Option<B256>,
}

impl Sealable for SwapPayload {
    fn to_plaintext(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn from_plaintext(bytes: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::Malformed(format!("swap payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_round_trip() {
        let payload = SwapPayload {
            nullifier: Nullifier::random(),
            vault_id: VaultId(B256::repeat_byte(1)),
            ticket_id: TicketId(0),
            input_amount: 500_000_000,
            token_in: "A".into(),
            token_out: "B".into(),
            min_output_amount: 0,
            slippage_bps: 100,
            output_stealth: Address::repeat_byte(9),
            remainder_stealth: None,
            remainder_commitment: Some(B256::repeat_byte(2)),
        };
        let bytes = payload.to_plaintext();
        assert_eq!(SwapPayload::from_plaintext(&bytes).unwrap(), payload);
        assert!(SwapPayload::from_plaintext(b"{\"nope\":1}").is_err());
    }
}
