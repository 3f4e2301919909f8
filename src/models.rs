// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the processing endpoint. Hashes and
//! nullifiers travel as `0x`-prefixed hex strings; intent ids as integers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::{IntentId, IntentState, SwapIntent, TokenType};

// =============================================================================
// Intent processing
// =============================================================================

/// Request to process one queued intent immediately.
///
/// `encrypted_data` and `key_id` must match the ciphertext stored on the
/// intent; they guard against processing an intent the caller did not mean.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessIntentRequest {
    pub intent_id: IntentId,
    /// Base64 threshold-ciphertext container of the payload.
    pub encrypted_data: String,
    /// Hex encryption identifier (namespace ‖ nonce).
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessIntentResponse {
    pub executed: bool,
    /// Finalize transaction hash, also returned when confirmation is pending.
    pub tx_hash: Option<String>,
}

// =============================================================================
// Status queries
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntentStatusResponse {
    pub intent_id: IntentId,
    pub state: IntentState,
    pub token_in: TokenType,
    pub token_out: TokenType,
    pub deadline: u64,
    pub created_at: u64,
    pub key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl From<SwapIntent> for IntentStatusResponse {
    fn from(intent: SwapIntent) -> Self {
        Self {
            intent_id: intent.intent_id,
            state: intent.state,
            key_id: intent.payload.id().to_hex(),
            token_in: intent.token_in,
            token_out: intent.token_out,
            deadline: intent.deadline,
            created_at: intent.created_at,
            failure_reason: intent.failure_reason,
            tx_hash: intent.tx_hash.map(|h| h.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NullifierStatusResponse {
    pub nullifier: String,
    pub is_spent: bool,
}
