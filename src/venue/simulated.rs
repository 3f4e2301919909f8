// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-rate venue for local deployments and tests.

use std::collections::HashMap;
use std::str::FromStr;

use alloy::primitives::{keccak256, B256};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Quote, SwapExecution, SwapVenue, VenueError, VenueResult, BPS_DENOMINATOR};
use crate::ledger::{Amount, TokenType};

/// Exchange rate `num / den` of output units per input unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub num: u64,
    pub den: u64,
}

impl Rate {
    pub fn apply(&self, amount: Amount) -> Amount {
        if self.den == 0 {
            return 0;
        }
        let out = u128::from(amount) * u128::from(self.num) / u128::from(self.den);
        u64::try_from(out).unwrap_or(u64::MAX)
    }
}

/// One `IN:OUT:NUM/DEN` entry of a rate table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateEntry {
    pub token_in: TokenType,
    pub token_out: TokenType,
    pub rate: Rate,
}

impl FromStr for RateEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let (Some(token_in), Some(token_out), Some(ratio), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("expected IN:OUT:NUM/DEN, got {s:?}"));
        };
        let (num, den) = ratio
            .split_once('/')
            .ok_or_else(|| format!("rate {ratio:?} is not NUM/DEN"))?;
        let num: u64 = num.parse().map_err(|_| format!("bad numerator in {s:?}"))?;
        let den: u64 = den.parse().map_err(|_| format!("bad denominator in {s:?}"))?;
        if den == 0 || token_in.is_empty() || token_out.is_empty() {
            return Err(format!("invalid rate entry {s:?}"));
        }
        Ok(Self {
            token_in: TokenType::new(token_in),
            token_out: TokenType::new(token_out),
            rate: Rate { num, den },
        })
    }
}

/// Parse a comma-separated rate table.
pub fn parse_rates(raw: &str) -> Result<Vec<RateEntry>, String> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Default)]
struct VenueState {
    rates: HashMap<(TokenType, TokenType), Rate>,
    /// Price movement between quote and execution, in bps.
    execution_drift_bps: u64,
    offline: bool,
    executed: u64,
}

pub struct SimulatedVenue {
    state: Mutex<VenueState>,
}

impl SimulatedVenue {
    pub fn new(entries: impl IntoIterator<Item = RateEntry>) -> Self {
        let rates = entries
            .into_iter()
            .map(|e| ((e.token_in, e.token_out), e.rate))
            .collect();
        Self {
            state: Mutex::new(VenueState {
                rates,
                ..Default::default()
            }),
        }
    }

    /// Default table: A→B at 0.96, B→A at 1.04.
    pub fn with_default_rates() -> Self {
        Self::new([
            RateEntry {
                token_in: "A".into(),
                token_out: "B".into(),
                rate: Rate { num: 960, den: 1000 },
            },
            RateEntry {
                token_in: "B".into(),
                token_out: "A".into(),
                rate: Rate { num: 1040, den: 1000 },
            },
        ])
    }

    pub async fn set_rate(&self, token_in: TokenType, token_out: TokenType, rate: Rate) {
        self.state.lock().await.rates.insert((token_in, token_out), rate);
    }

    /// Make executions return `drift_bps` less than quoted.
    pub async fn set_execution_drift(&self, drift_bps: u64) {
        self.state.lock().await.execution_drift_bps = drift_bps;
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn executed_count(&self) -> u64 {
        self.state.lock().await.executed
    }

    fn rate(state: &VenueState, token_in: &TokenType, token_out: &TokenType) -> VenueResult<Rate> {
        state
            .rates
            .get(&(token_in.clone(), token_out.clone()))
            .copied()
            .ok_or_else(|| VenueError::NoRoute {
                token_in: token_in.clone(),
                token_out: token_out.clone(),
            })
    }
}

impl SwapVenue for SimulatedVenue {
    async fn quote(
        &self,
        token_in: &TokenType,
        token_out: &TokenType,
        amount_in: Amount,
    ) -> VenueResult<Quote> {
        if amount_in == 0 {
            return Err(VenueError::ZeroAmount);
        }
        let state = self.state.lock().await;
        if state.offline {
            return Err(VenueError::Unavailable("venue offline".to_string()));
        }
        let expected_out = Self::rate(&state, token_in, token_out)?.apply(amount_in);
        debug!(%token_in, %token_out, amount_in, expected_out, "Quoted swap");
        Ok(Quote {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in,
            expected_out,
        })
    }

    async fn build_and_submit_swap(
        &self,
        token_in: &TokenType,
        token_out: &TokenType,
        amount_in: Amount,
        min_out: Amount,
    ) -> VenueResult<SwapExecution> {
        if amount_in == 0 {
            return Err(VenueError::ZeroAmount);
        }
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(VenueError::Unavailable("venue offline".to_string()));
        }
        let quoted = Self::rate(&state, token_in, token_out)?.apply(amount_in);
        let keep = BPS_DENOMINATOR.saturating_sub(state.execution_drift_bps);
        let amount_out = Rate {
            num: keep,
            den: BPS_DENOMINATOR,
        }
        .apply(quoted);
        if amount_out < min_out {
            return Err(VenueError::BelowMinimum {
                minimum: min_out,
                actual: amount_out,
            });
        }

        state.executed += 1;
        let mut seed = state.executed.to_be_bytes().to_vec();
        seed.extend_from_slice(token_in.as_str().as_bytes());
        seed.extend_from_slice(token_out.as_str().as_bytes());
        let venue_tx: B256 = keccak256(seed);

        info!(%token_in, %token_out, amount_in, amount_out, venue_tx = %venue_tx, "Venue swap executed");
        Ok(SwapExecution {
            amount_in,
            amount_out,
            venue_tx,
        })
    }
}
