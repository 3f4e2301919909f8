// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Storage Module
//!
//! Persistent state of the service, kept under the enclave's encrypted
//! data mount (`/data` by default).
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   journal.redb                   # Submission journal (processor)
//!   wallets/{owner}/
//!     notes/{nullifier}.json       # Deposit notes
//!     stealth/{address}.json       # Stealth keys
//!   audit/
//!     {date}/events.jsonl          # Daily audit logs
//! ```
//!
//! The mount is encrypted by the TEE runtime; nothing in this module does
//! its own crypto.

pub mod audit;
pub mod encrypted_fs;
pub mod journal;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use encrypted_fs::{EncryptedStorage, StorageError, StorageResult};
pub use journal::{JournalEntry, JournalError, JournalPhase, JournalResult, SubmissionJournal};
pub use paths::StoragePaths;
pub use repository::{NoteRepository, StealthKeyRepository};
