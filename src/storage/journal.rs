// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Submission journal backed by redb (pure Rust, ACID).
//!
//! The processor writes an entry when it claims an intent and overwrites it
//! with the signed transaction *before* submitting. After a crash or a
//! submission timeout the entry tells the next tick exactly which bytes may
//! already be on the ledger, so reconciliation resubmits those bytes instead
//! of signing again.
//!
//! ## Table Layout
//!
//! - `submissions`: intent id → JSON [`JournalEntry`]
//!
//! Intent ids restart at zero with a fresh ledger, so every entry also
//! records the identifier of the sealed payload it was written for.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptionId;
use crate::ledger::{IntentId, SignedFinalize};

const SUBMISSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("submissions");

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no journal entry for intent {0}")]
    NotFound(IntentId),
}

pub type JournalResult<T> = Result<T, JournalError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum JournalPhase {
    /// Intent moved to Processing; nothing signed yet.
    Claimed,
    /// Signed transaction handed to the ledger at least once.
    Submitted { signed: Box<SignedFinalize> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub intent_id: IntentId,
    /// Payload identifier of the intent this entry was written for.
    pub payload: EncryptionId,
    pub phase: JournalPhase,
    /// Submissions of the signed bytes so far.
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

pub struct SubmissionJournal {
    db: Database,
}

impl SubmissionJournal {
    /// Open (or create) the journal at `path`.
    pub fn open(path: &Path) -> JournalResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SUBMISSIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn put(&self, entry: &JournalEntry) -> JournalResult<()> {
        let json = serde_json::to_vec(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SUBMISSIONS)?;
            table.insert(entry.intent_id.0, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn record_claimed(&self, intent_id: IntentId, payload: EncryptionId) -> JournalResult<()> {
        self.put(&JournalEntry {
            intent_id,
            payload,
            phase: JournalPhase::Claimed,
            attempts: 0,
            updated_at: Utc::now(),
        })
    }

    /// Persist the signed transaction; called before every submission.
    pub fn record_submission(
        &self,
        payload: EncryptionId,
        signed: &SignedFinalize,
    ) -> JournalResult<JournalEntry> {
        let intent_id = signed.tx.intent_id;
        let attempts = match self.get(intent_id)? {
            Some(JournalEntry {
                phase: JournalPhase::Submitted { .. },
                payload: recorded,
                attempts,
                ..
            }) if recorded == payload => attempts,
            _ => 0,
        };
        let entry = JournalEntry {
            intent_id,
            payload,
            phase: JournalPhase::Submitted {
                signed: Box::new(signed.clone()),
            },
            attempts: attempts + 1,
            updated_at: Utc::now(),
        };
        self.put(&entry)?;
        Ok(entry)
    }

    pub fn get(&self, intent_id: IntentId) -> JournalResult<Option<JournalEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SUBMISSIONS)?;
        match table.get(intent_id.0)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All open entries, oldest intent first.
    pub fn outstanding(&self) -> JournalResult<Vec<JournalEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SUBMISSIONS)?;
        let mut entries = Vec::new();
        for row in table.iter()? {
            let (_, value) = row?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    /// Close the entry for an intent that reached a terminal state.
    pub fn close(&self, intent_id: IntentId) -> JournalResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SUBMISSIONS)?;
            table.remove(intent_id.0)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
