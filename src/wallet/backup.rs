// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deposit-note backup export and import.
//!
//! ```json
//! {"version": 1, "walletAddress": "0x..", "timestamp": 1767225600000,
//!  "notes": [...], "stealthKeys": [...]}
//! ```
//!
//! Import is idempotent: a note whose nullifier is already stored, or a
//! stealth key whose address is already stored, is skipped and never
//! overwritten.

use alloy::primitives::Address;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{DepositNote, StealthKeyRecord};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, EncryptedStorage, NoteRepository,
    StealthKeyRepository, StorageError,
};

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("unsupported backup version {0}")]
    UnsupportedVersion(u32),

    #[error("backup belongs to {found}, not {expected}")]
    WalletMismatch { expected: Address, found: Address },

    #[error("invalid backup document: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteBackup {
    pub version: u32,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub wallet_address: Address,
    /// Unix milliseconds of the export.
    pub timestamp: i64,
    pub notes: Vec<DepositNote>,
    pub stealth_keys: Vec<StealthKeyRecord>,
}

impl NoteBackup {
    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, BackupError> {
        let backup: Self = serde_json::from_str(raw)?;
        if backup.version != BACKUP_VERSION {
            return Err(BackupError::UnsupportedVersion(backup.version));
        }
        Ok(backup)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub notes_imported: usize,
    pub notes_skipped: usize,
    pub keys_imported: usize,
    pub keys_skipped: usize,
}

pub fn export(storage: &EncryptedStorage, owner: Address) -> Result<NoteBackup, BackupError> {
    let backup = NoteBackup {
        version: BACKUP_VERSION,
        wallet_address: owner,
        timestamp: Utc::now().timestamp_millis(),
        notes: NoteRepository::new(storage, owner).list()?,
        stealth_keys: StealthKeyRepository::new(storage, owner).list()?,
    };

    let _ = AuditRepository::new(storage).log(
        &AuditEvent::new(AuditEventType::NotesExported)
            .with_actor(owner.to_string())
            .with_details(serde_json::json!({
                "notes": backup.notes.len(),
                "stealth_keys": backup.stealth_keys.len(),
            })),
    );
    Ok(backup)
}

pub fn import(
    storage: &EncryptedStorage,
    owner: Address,
    backup: &NoteBackup,
) -> Result<ImportSummary, BackupError> {
    if backup.version != BACKUP_VERSION {
        return Err(BackupError::UnsupportedVersion(backup.version));
    }
    if backup.wallet_address != owner {
        return Err(BackupError::WalletMismatch {
            expected: owner,
            found: backup.wallet_address,
        });
    }

    let notes = NoteRepository::new(storage, owner);
    let keys = StealthKeyRepository::new(storage, owner);
    let mut summary = ImportSummary::default();

    for note in &backup.notes {
        if notes.exists(&note.nullifier) {
            summary.notes_skipped += 1;
        } else {
            notes.create(note)?;
            summary.notes_imported += 1;
        }
    }
    for key in &backup.stealth_keys {
        if keys.exists(key.address) {
            summary.keys_skipped += 1;
        } else {
            keys.create(key)?;
            summary.keys_imported += 1;
        }
    }

    info!(
        owner = %owner,
        notes_imported = summary.notes_imported,
        notes_skipped = summary.notes_skipped,
        keys_imported = summary.keys_imported,
        keys_skipped = summary.keys_skipped,
        "Backup imported"
    );
    let _ = AuditRepository::new(storage).log(
        &AuditEvent::new(AuditEventType::NotesImported)
            .with_actor(owner.to_string())
            .with_details(serde_json::json!(summary)),
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{TicketId, VaultId};
    use crate::storage::StoragePaths;
    use alloy::primitives::B256;

    fn storage() -> (tempfile::TempDir, EncryptedStorage) {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().unwrap();
        (dir, storage)
    }

    fn note(amount: u64) -> DepositNote {
        DepositNote::new(amount, "A".into(), VaultId(B256::repeat_byte(1)), TicketId(0))
    }

    #[test]
    fn export_uses_camel_case_document() {
        let (_dir, storage) = storage();
        let owner = Address::repeat_byte(0x0a);
        NoteRepository::new(&storage, owner).create(&note(5)).unwrap();
        StealthKeyRepository::new(&storage, owner)
            .create(&StealthKeyRecord::generate())
            .unwrap();

        let backup = export(&storage, owner).unwrap();
        let json: serde_json::Value = serde_json::from_str(&backup.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert!(json["walletAddress"].is_string());
        assert!(json["timestamp"].is_i64());
        assert_eq!(json["notes"].as_array().unwrap().len(), 1);
        assert_eq!(json["stealthKeys"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn import_is_idempotent_by_nullifier() {
        let (_dir, source) = storage();
        let owner = Address::repeat_byte(0x0a);
        let repo = NoteRepository::new(&source, owner);
        let (first, second) = (note(1), note(2));
        repo.create(&first).unwrap();
        repo.create(&second).unwrap();
        let backup = NoteBackup::from_json(&export(&source, owner).unwrap().to_json().unwrap()).unwrap();

        let (_dir2, target) = storage();
        let mut local = first.clone();
        local.spent = true;
        NoteRepository::new(&target, owner).create(&local).unwrap();

        let summary = import(&target, owner, &backup).unwrap();
        assert_eq!(summary.notes_imported, 1);
        assert_eq!(summary.notes_skipped, 1);
        // Existing note is not overwritten.
        assert!(NoteRepository::new(&target, owner).get(&first.nullifier).unwrap().spent);

        let again = import(&target, owner, &backup).unwrap();
        assert_eq!(again.notes_imported, 0);
        assert_eq!(again.notes_skipped, 2);
    }

    #[test]
    fn rejects_unknown_version_and_foreign_wallet() {
        let raw = r#"{"version":2,"walletAddress":"0x0000000000000000000000000000000000000001","timestamp":0,"notes":[],"stealthKeys":[]}"#;
        assert!(matches!(NoteBackup::from_json(raw), Err(BackupError::UnsupportedVersion(2))));

        let (_dir, storage) = storage();
        let backup = NoteBackup {
            version: 1,
            wallet_address: Address::repeat_byte(1),
            timestamp: 0,
            notes: vec![],
            stealth_keys: vec![],
        };
        assert!(matches!(
            import(&storage, Address::repeat_byte(2), &backup),
            Err(BackupError::WalletMismatch { .. })
        ));
    }
}
