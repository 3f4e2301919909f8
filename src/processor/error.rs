// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Processor failure taxonomy.

use crate::blockchain::ChainError;
use crate::gateway::GatewayError;
use crate::ledger::{Amount, LedgerError};
use crate::signer::SignerError;
use crate::storage::JournalError;
use crate::venue::VenueError;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("decryption denied: {0}")]
    DecryptionDenied(String),

    #[error("key-server quorum unavailable: {0}")]
    QuorumUnavailable(String),

    #[error("nullifier already spent")]
    NullifierReplay,

    #[error("venue execution failed: {0}")]
    VenueExecutionFailed(String),

    #[error("slippage exceeded: got {actual}, minimum {minimum}")]
    SlippageExceeded { minimum: Amount, actual: Amount },

    #[error("intent deadline passed")]
    DeadlineExpired,

    #[error("signing delegate unavailable: {0}")]
    SigningUnavailable(String),

    /// Outcome unknown; the journal entry is reconciled on a later tick.
    #[error("submission timed out, awaiting reconciliation")]
    SubmissionTimeout,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("ledger rejected: {0}")]
    Ledger(String),

    /// A journal entry was left before any signed bytes were recorded.
    #[error("processing interrupted before submission")]
    Interrupted,

    #[error("intent is already being processed")]
    Busy,

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

impl ProcessError {
    /// Short reason recorded on the failed intent.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DecryptionDenied(_) => "decryption_denied",
            Self::QuorumUnavailable(_) => "quorum_unavailable",
            Self::NullifierReplay => "nullifier_replay",
            Self::VenueExecutionFailed(_) => "venue_execution_failed",
            Self::SlippageExceeded { .. } => "slippage_exceeded",
            Self::DeadlineExpired => "deadline_expired",
            Self::SigningUnavailable(_) => "signing_unavailable",
            Self::SubmissionTimeout => "submission_timeout",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Ledger(_) => "ledger_rejected",
            Self::Interrupted => "interrupted",
            Self::Busy => "busy",
            Self::Journal(_) => "journal_error",
        }
    }
}

impl From<GatewayError> for ProcessError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::PolicyDenied(reason) => Self::DecryptionDenied(reason),
            GatewayError::Session(e) => Self::DecryptionDenied(e.to_string()),
            GatewayError::ShareQuorumFailed { .. } => Self::QuorumUnavailable(e.to_string()),
            other => Self::InvalidPayload(other.to_string()),
        }
    }
}

impl From<VenueError> for ProcessError {
    fn from(e: VenueError) -> Self {
        match e {
            VenueError::BelowMinimum { minimum, actual } => Self::SlippageExceeded { minimum, actual },
            other => Self::VenueExecutionFailed(other.to_string()),
        }
    }
}

impl From<SignerError> for ProcessError {
    fn from(e: SignerError) -> Self {
        Self::SigningUnavailable(e.to_string())
    }
}

impl From<ChainError> for ProcessError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Rejected(LedgerError::NullifierReplay) => Self::NullifierReplay,
            ChainError::Rejected(LedgerError::DeadlineExpired(_)) => Self::DeadlineExpired,
            ChainError::SubmissionTimeout => Self::SubmissionTimeout,
            other => Self::Ledger(other.to_string()),
        }
    }
}
