// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DEX boundary.
//!
//! The processor asks a [`SwapVenue`] for a quote, derives the minimum
//! acceptable output from the payload's slippage tolerance, and then
//! executes. The venue settles against the finalizer's own token accounts;
//! the ledger only sees the resulting `to_amount` when the swap is finalized.

pub mod simulated;

use std::future::Future;

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};

use crate::ledger::{Amount, TokenType};

pub use simulated::{parse_rates, Rate, RateEntry, SimulatedVenue};

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VenueError {
    #[error("no route from {token_in} to {token_out}")]
    NoRoute {
        token_in: TokenType,
        token_out: TokenType,
    },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("output {actual} below minimum {minimum}")]
    BelowMinimum { minimum: Amount, actual: Amount },

    #[error("venue unavailable: {0}")]
    Unavailable(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("venue call timed out")]
    Timeout,
}

impl VenueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

pub type VenueResult<T> = Result<T, VenueError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub token_in: TokenType,
    pub token_out: TokenType,
    pub amount_in: Amount,
    pub expected_out: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapExecution {
    pub amount_in: Amount,
    pub amount_out: Amount,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub venue_tx: B256,
}

pub trait SwapVenue: Send + Sync {
    fn quote(
        &self,
        token_in: &TokenType,
        token_out: &TokenType,
        amount_in: Amount,
    ) -> impl Future<Output = VenueResult<Quote>> + Send;

    /// Execute a swap, failing with [`VenueError::BelowMinimum`] rather than
    /// settling for less than `min_out`.
    fn build_and_submit_swap(
        &self,
        token_in: &TokenType,
        token_out: &TokenType,
        amount_in: Amount,
        min_out: Amount,
    ) -> impl Future<Output = VenueResult<SwapExecution>> + Send;
}

/// `expected * (1 - bps/10000)`, rounded down. Tolerances above 100% floor
/// at zero.
pub fn minimum_output(expected: Amount, slippage_bps: u16) -> Amount {
    let keep = BPS_DENOMINATOR.saturating_sub(u64::from(slippage_bps));
    let min = u128::from(expected) * u128::from(keep) / u128::from(BPS_DENOMINATOR);
    // min <= expected, so it always fits.
    u64::try_from(min).unwrap_or(expected)
}
