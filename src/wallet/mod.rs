// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side wallet: deposit notes, stealth keys, backups and the owner
//! flows that use them.

pub mod backup;
pub mod client;
pub mod notes;
pub mod stealth;

pub use backup::{export, import, BackupError, ImportSummary, NoteBackup, BACKUP_VERSION};
pub use client::{ClaimedOutput, OwnerClient, PreparedSwap, SwapRequest, WalletError, WalletResult};
pub use notes::DepositNote;
pub use stealth::StealthKeyRecord;
