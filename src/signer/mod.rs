// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signing Delegate
//!
//! The finalizer key never lives in the processor. The processor hands the
//! encoded finalize transaction to a delegate on the same host and gets a
//! signature back.
//!
//! ## Wire
//!
//! ```text
//! POST /sign   {"caller": "0x..", "payload_b64": "..."}  ->  {"signature": "0x..", "signer": "0x.."}
//! GET  /health                                            ->  OK
//! ```
//!
//! ## Retry rule
//!
//! Connect failures, timeouts and 5xx are retried with backoff. Once a 2xx
//! arrives the request is never repeated, even if the body is unreadable:
//! the delegate may have produced a signature and the caller must treat the
//! outcome as ambiguous.

pub mod client;
pub mod service;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::session::sign_prehash;
use crate::ledger::{FinalizeSwap, SignedFinalize};

pub use client::{is_loopback, HttpSigningDelegate};
pub use service::{router as service_router, SignerService};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("signing delegate unreachable: {0}")]
    Unreachable(String),

    #[error("signing delegate timed out")]
    Timeout,

    #[error("signing delegate returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("caller not allowed by signing delegate")]
    Forbidden,

    /// A 2xx arrived but its body was unusable; a signature may exist.
    #[error("ambiguous signing outcome: {0}")]
    AmbiguousSignature(String),

    #[error("signing delegate must be on loopback, got {0}")]
    NotLoopback(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl SignerError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type SignerResult<T> = Result<T, SignerError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub caller: Address,
    pub payload_b64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    #[serde(with = "crate::crypto::hex_serde::bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub signer: Address,
}

pub trait SigningDelegate: Send + Sync {
    fn sign_finalize(
        &self,
        tx: &FinalizeSwap,
    ) -> impl Future<Output = SignerResult<SignedFinalize>> + Send;
}

/// Delegate holding the key in-process. Used by tests and single-host
/// development setups.
pub struct LocalSigningDelegate {
    signer: PrivateKeySigner,
    online: AtomicBool,
}

impl LocalSigningDelegate {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            online: AtomicBool::new(true),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl SigningDelegate for LocalSigningDelegate {
    async fn sign_finalize(&self, tx: &FinalizeSwap) -> SignerResult<SignedFinalize> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(SignerError::Unreachable("delegate offline".to_string()));
        }
        let signature = sign_prehash(&self.signer, &tx.digest())
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        debug!(intent_id = %tx.intent_id, "Finalize signed in-process");
        Ok(SignedFinalize {
            tx: tx.clone(),
            signature,
        })
    }
}

pub enum Delegate {
    Local(LocalSigningDelegate),
    Http(HttpSigningDelegate),
}

impl SigningDelegate for Delegate {
    async fn sign_finalize(&self, tx: &FinalizeSwap) -> SignerResult<SignedFinalize> {
        match self {
            Self::Local(delegate) => delegate.sign_finalize(tx).await,
            Self::Http(delegate) => delegate.sign_finalize(tx).await,
        }
    }
}
