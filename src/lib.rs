// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed Swap - Private Swap Intent Processor
//!
//! Owners queue swap intents whose parameters are encrypted under a 2-of-3
//! custodian threshold scheme. A TEE-resident processor drains the queue,
//! decrypts each payload with its own attested identity, executes the swap
//! against a venue and settles the encrypted balance ledger through an
//! isolated signing delegate. Outputs land on one-time stealth addresses.
//!
//! ## Modules
//!
//! - `api` - TEE processing endpoint (Axum)
//! - `blockchain` - Ledger client boundary and finalizer key loading
//! - `crypto` - Envelopes, identifiers, Shamir shares, session keys
//! - `gateway` - Threshold encryption gateway and custodian key servers
//! - `ledger` - Encrypted balance ledger and intent queue
//! - `processor` - Intent processing pipeline and reconciliation
//! - `signer` - Signing delegate (client and service)
//! - `storage` - Encrypted storage, audit log, submission journal
//! - `venue` - Swap venue boundary
//! - `wallet` - Owner-side notes, stealth keys and backups

pub mod api;
pub mod blockchain;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod processor;
pub mod retry;
pub mod signer;
pub mod state;
pub mod storage;
pub mod venue;
pub mod wallet;
