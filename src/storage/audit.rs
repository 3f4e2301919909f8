// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit log of security-relevant processor outcomes.
//!
//! One JSONL file per UTC day under `audit/{date}/events.jsonl`. Events
//! never carry hidden amounts or nullifiers, only identifiers already
//! visible on the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EncryptedStorage, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Intent lifecycle
    IntentExecuted,
    IntentFailed,
    IntentExpired,
    SubmissionReconciled,

    // Security
    NullifierReplay,
    PolicyDenied,

    // Owner wallet
    NotesExported,
    NotesImported,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Address or service identity that caused the event.
    pub actor: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor: None,
            resource_type: None,
            resource_id: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

pub struct AuditRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let mut line = serde_json::to_vec(event).map_err(|e| {
            StorageError::SerializationError(format!("Failed to serialize audit event: {e}"))
        })?;
        line.push(b'\n');
        self.storage.append_raw(&path, &line)
    }

    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = String::from_utf8(self.storage.read_raw(&path)?).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::SerializationError(format!(
                        "Failed to deserialize audit event: {e}"
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, EncryptedStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::IntentFailed)
            .with_actor("processor")
            .with_resource("intent", "7")
            .failed("slippage exceeded");

        assert_eq!(event.event_type, AuditEventType::IntentFailed);
        assert_eq!(event.actor.as_deref(), Some("processor"));
        assert_eq!(event.resource_id.as_deref(), Some("7"));
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("slippage exceeded"));
    }

    #[test]
    fn log_and_read_back() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(&AuditEvent::new(AuditEventType::IntentExecuted).with_resource("intent", "1"))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::NullifierReplay).with_resource("intent", "2"))
            .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::IntentFailed).with_resource("intent", "2"))
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = repo.read_events(&today).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, AuditEventType::IntentExecuted);
        assert_eq!(events[1].resource_id.as_deref(), Some("2"));
        assert!(matches!(
            repo.read_events("2000-01-01"),
            Err(StorageError::NotFound(_))
        ));
    }
}
