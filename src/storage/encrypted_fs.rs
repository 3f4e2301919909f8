// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem operations on the enclave's encrypted data mount.
//!
//! The mount is encrypted by the TEE runtime, so this module does plain
//! filesystem I/O and implements no crypto of its own. Integrity failures
//! reported by the runtime surface as I/O errors and are mapped to
//! [`StorageError::IntegrityViolation`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::StoragePaths;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        let msg = e.to_string();
        if msg.contains("Authentication") || msg.contains("integrity") || msg.contains("tamper") {
            StorageError::IntegrityViolation(msg)
        } else if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(msg)
        } else {
            StorageError::Io(e)
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct EncryptedStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl EncryptedStorage {
    /// Call [`initialize`](Self::initialize) before any other operation.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the directory layout. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in [self.paths.wallets_dir(), self.paths.audit_dir()] {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    /// Write-read-delete probe of the mount.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";
        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    // ========== JSON Operations ==========

    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        self.ensure_initialized()?;
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Atomic write: temp file, then rename.
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Uses `open()` rather than `stat()`, which the encrypted mount may
    /// refuse for protected files.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        File::open(path.as_ref()).is_ok()
    }

    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.ensure_initialized()?;
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// File stems in `dir` with the given extension.
    pub fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> StorageResult<Vec<String>> {
        self.ensure_initialized()?;
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != extension) {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    // ========== Raw Operations ==========

    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        self.ensure_initialized()?;
        let mut data = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Append bytes, creating the file and its parents if needed.
    pub fn append_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn test_storage() -> (tempfile::TempDir, EncryptedStorage) {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().unwrap();
        (dir, storage)
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        id: String,
        value: i32,
    }

    #[test]
    fn initialize_creates_directories() {
        let (_dir, storage) = test_storage();
        assert!(storage.paths().wallets_dir().exists());
        assert!(storage.paths().audit_dir().exists());
        storage.health_check().unwrap();
    }

    #[test]
    fn write_read_list_delete() {
        let (_dir, storage) = test_storage();
        let notes = storage.paths().notes_dir("0xabc");
        for i in [2, 1] {
            storage
                .write_json(
                    notes.join(format!("n-{i}.json")),
                    &TestData {
                        id: format!("n-{i}"),
                        value: i,
                    },
                )
                .unwrap();
        }

        assert_eq!(storage.list_files(&notes, "json").unwrap(), vec!["n-1", "n-2"]);
        let read: TestData = storage.read_json(notes.join("n-2.json")).unwrap();
        assert_eq!(read.value, 2);

        storage.delete(notes.join("n-1.json")).unwrap();
        assert!(!storage.exists(notes.join("n-1.json")));
        assert!(matches!(
            storage.read_json::<TestData>(notes.join("n-1.json")),
            Err(StorageError::NotFound(_))
        ));
        assert!(storage.list_files(storage.paths().notes_dir("0xnone"), "json").unwrap().is_empty());
    }

    #[test]
    fn append_raw_accumulates() {
        let (_dir, storage) = test_storage();
        let path = storage.paths().audit_events_file("2026-01-01");
        storage.append_raw(&path, b"one\n").unwrap();
        storage.append_raw(&path, b"two\n").unwrap();
        assert_eq!(storage.read_raw(&path).unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn uninitialized_storage_returns_error() {
        let storage = EncryptedStorage::new(StoragePaths::new("/tmp/never-init"));
        assert!(matches!(
            storage.read_json::<TestData>("/tmp/any.json"),
            Err(StorageError::NotInitialized)
        ));
    }
}
