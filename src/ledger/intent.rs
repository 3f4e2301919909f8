// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Intent Queue: append-only swap intents and their lifecycle.
//!
//! ```text
//! Pending ──► Processing ──► Executed
//!    │             ├───────► Failed
//!    │             └───────► Expired
//!    ├──────────────────────► Failed
//!    └──────────────────────► Expired
//! ```
//!
//! Terminal states accept no further transition and an intent never
//! re-enters `Pending`.

use std::collections::BTreeMap;

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::payload::SwapPayload;
use super::types::{IntentId, TokenType};
use crate::gateway::Encrypted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Pending,
    Processing,
    Executed,
    Failed,
    Expired,
}

impl IntentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Failed | Self::Expired)
    }

    pub fn can_transition_to(self, next: IntentState) -> bool {
        use IntentState::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Pending, Expired)
                | (Processing, Executed)
                | (Processing, Failed)
                | (Processing, Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("intent {0} not found")]
    NotFound(IntentId),

    #[error("intent {id}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: IntentId,
        from: IntentState,
        to: IntentState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapIntent {
    pub intent_id: IntentId,
    pub payload: Encrypted<SwapPayload>,
    pub token_in: TokenType,
    pub token_out: TokenType,
    /// Unix seconds after which the intent may not execute.
    pub deadline: u64,
    pub created_at: u64,
    pub state: IntentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::crypto::hex_serde::option_string"
    )]
    pub tx_hash: Option<B256>,
}

impl SwapIntent {
    pub fn is_past_deadline(&self, now_secs: u64) -> bool {
        now_secs > self.deadline
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntentQueue {
    intents: BTreeMap<IntentId, SwapIntent>,
    next_id: u64,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(
        &mut self,
        payload: Encrypted<SwapPayload>,
        token_in: TokenType,
        token_out: TokenType,
        deadline: u64,
        created_at: u64,
    ) -> IntentId {
        let intent_id = IntentId(self.next_id);
        self.next_id += 1;
        self.intents.insert(
            intent_id,
            SwapIntent {
                intent_id,
                payload,
                token_in,
                token_out,
                deadline,
                created_at,
                state: IntentState::Pending,
                failure_reason: None,
                tx_hash: None,
            },
        );
        intent_id
    }

    pub fn get(&self, id: IntentId) -> Result<&SwapIntent, QueueError> {
        self.intents.get(&id).ok_or(QueueError::NotFound(id))
    }

    /// Check that `id` may move to `to` without changing anything.
    pub fn check_transition(&self, id: IntentId, to: IntentState) -> Result<(), QueueError> {
        let intent = self.get(id)?;
        if intent.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(QueueError::InvalidTransition {
                id,
                from: intent.state,
                to,
            })
        }
    }

    pub fn transition(&mut self, id: IntentId, to: IntentState) -> Result<&mut SwapIntent, QueueError> {
        self.check_transition(id, to)?;
        let intent = self.intents.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        intent.state = to;
        Ok(intent)
    }

    /// Pending intents, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &SwapIntent> {
        self.intents
            .values()
            .filter(|intent| intent.state == IntentState::Pending)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ThresholdCiphertext, WrappedShare};

    fn payload() -> Encrypted<SwapPayload> {
        // Structurally valid container; contents are never decrypted here.
        let container = ThresholdCiphertext {
            version: 1,
            id: crate::crypto::EncryptionId::new(B256::ZERO),
            threshold: 1,
            shares: vec![WrappedShare {
                server_id: "ks-1".into(),
                index: 1,
                envelope: crate::crypto::SealedBox {
                    ephemeral_pubkey: vec![],
                    nonce: vec![],
                    ciphertext: vec![],
                },
            }],
            nonce: vec![0; 12],
            ciphertext: vec![1],
        };
        let wire = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            serde_json::to_vec(&container).unwrap(),
        );
        Encrypted::from_base64(&wire).unwrap()
    }

    #[test]
    fn lattice() {
        use IntentState::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Expired));
        assert!(Processing.can_transition_to(Executed));
        assert!(!Processing.can_transition_to(Pending));
        for terminal in [Executed, Failed, Expired] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Executed, Failed, Expired] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn ids_are_sequential_and_pending_is_oldest_first() {
        let mut queue = IntentQueue::new();
        let a = queue.enqueue(payload(), "A".into(), "B".into(), 100, 1);
        let b = queue.enqueue(payload(), "A".into(), "B".into(), 100, 2);
        let c = queue.enqueue(payload(), "B".into(), "A".into(), 100, 3);
        assert_eq!((a, b, c), (IntentId(0), IntentId(1), IntentId(2)));

        queue.transition(b, IntentState::Processing).unwrap();
        let pending: Vec<_> = queue.pending().map(|i| i.intent_id).collect();
        assert_eq!(pending, vec![a, c]);
    }

    #[test]
    fn terminal_intents_are_immutable() {
        let mut queue = IntentQueue::new();
        let id = queue.enqueue(payload(), "A".into(), "B".into(), 100, 1);
        queue.transition(id, IntentState::Processing).unwrap();
        queue.transition(id, IntentState::Executed).unwrap();

        let err = queue.transition(id, IntentState::Failed).unwrap_err();
        assert_eq!(
            err,
            QueueError::InvalidTransition {
                id,
                from: IntentState::Executed,
                to: IntentState::Failed
            }
        );
        assert_eq!(queue.get(id).unwrap().state, IntentState::Executed);
        assert_eq!(
            queue.check_transition(IntentId(9), IntentState::Processing),
            Err(QueueError::NotFound(IntentId(9)))
        );
    }
}
