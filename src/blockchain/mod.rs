// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Processor-side access to the Balance Ledger.
//!
//! The processor never touches ledger state directly. Everything it reads or
//! writes goes through [`LedgerClient`], acting as the enclave identity for
//! queue management and submitting delegate-signed finalize transactions.
//!
//! Implementations:
//! - [`LocalLedgerClient`] - in-process ledger, with fault injection for
//!   submission timeouts

pub mod local;
pub mod signing;

use std::future::Future;

use alloy::primitives::B256;

use crate::ledger::{
    FinalizeReceipt, IntentId, LedgerError, Nullifier, SignedFinalize, SwapIntent, Ticket,
    TicketId, VaultId,
};

pub use local::{LocalLedgerClient, SubmitFault};
pub use signing::{load_signer, pem_to_hex, signer_from_hex, signer_from_pem, SignerKeyError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The ledger evaluated and refused the call.
    #[error("ledger rejected call: {0}")]
    Rejected(#[from] LedgerError),

    /// No answer arrived; the call may or may not have been applied.
    #[error("submission timed out")]
    SubmissionTimeout,

    #[error("ledger unreachable: {0}")]
    Unavailable(String),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

pub trait LedgerClient: Send + Sync {
    /// Unix seconds as the ledger sees them.
    fn now_secs(&self) -> impl Future<Output = ChainResult<u64>> + Send;

    fn pending_intents(&self) -> impl Future<Output = ChainResult<Vec<SwapIntent>>> + Send;

    fn intent(&self, intent_id: IntentId) -> impl Future<Output = ChainResult<SwapIntent>> + Send;

    fn claim_intent(&self, intent_id: IntentId)
        -> impl Future<Output = ChainResult<SwapIntent>> + Send;

    fn fail_intent(
        &self,
        intent_id: IntentId,
        reason: &str,
    ) -> impl Future<Output = ChainResult<()>> + Send;

    fn expire_intent(&self, intent_id: IntentId) -> impl Future<Output = ChainResult<()>> + Send;

    fn ticket(
        &self,
        vault_id: VaultId,
        ticket_id: TicketId,
    ) -> impl Future<Output = ChainResult<Ticket>> + Send;

    fn is_nullifier_spent(
        &self,
        nullifier: &Nullifier,
    ) -> impl Future<Output = ChainResult<bool>> + Send;

    /// Submit a signed finalize transaction.
    fn submit_finalize(
        &self,
        signed: &SignedFinalize,
    ) -> impl Future<Output = ChainResult<FinalizeReceipt>> + Send;

    /// Intent an applied transaction belongs to, `None` if never applied.
    fn transaction(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = ChainResult<Option<IntentId>>> + Send;
}
