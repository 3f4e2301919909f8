// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout of the encrypted data directory.

use std::path::{Path, PathBuf};

/// Base directory for all encrypted persistent storage.
pub const DATA_ROOT: &str = "/data";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Owner Wallet Paths ==========

    pub fn wallets_dir(&self) -> PathBuf {
        self.root.join("wallets")
    }

    /// Directory of one owner wallet, keyed by lowercase address.
    pub fn wallet_dir(&self, address: &str) -> PathBuf {
        self.wallets_dir().join(address.to_ascii_lowercase())
    }

    pub fn notes_dir(&self, address: &str) -> PathBuf {
        self.wallet_dir(address).join("notes")
    }

    pub fn note(&self, address: &str, nullifier: &str) -> PathBuf {
        self.notes_dir(address)
            .join(format!("{}.json", nullifier.to_ascii_lowercase()))
    }

    pub fn stealth_dir(&self, address: &str) -> PathBuf {
        self.wallet_dir(address).join("stealth")
    }

    pub fn stealth_key(&self, address: &str, stealth_address: &str) -> PathBuf {
        self.stealth_dir(address)
            .join(format!("{}.json", stealth_address.to_ascii_lowercase()))
    }

    // ========== Processor Paths ==========

    /// redb database holding the submission journal.
    pub fn journal_db(&self) -> PathBuf {
        self.root.join("journal.redb")
    }

    // ========== Audit Log Paths ==========

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Daily audit events file (JSONL).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
