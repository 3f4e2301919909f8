// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deposit notes of one owner, one JSON file per nullifier under
//! `wallets/{owner}/notes/`.

use alloy::primitives::Address;

use super::super::{EncryptedStorage, StorageError, StorageResult};
use crate::ledger::Nullifier;
use crate::wallet::DepositNote;

pub struct NoteRepository<'a> {
    storage: &'a EncryptedStorage,
    owner: String,
}

impl<'a> NoteRepository<'a> {
    pub fn new(storage: &'a EncryptedStorage, owner: Address) -> Self {
        Self {
            storage,
            owner: owner.to_string(),
        }
    }

    fn path(&self, nullifier: &Nullifier) -> std::path::PathBuf {
        self.storage
            .paths()
            .note(&self.owner, &nullifier.to_string())
    }

    pub fn exists(&self, nullifier: &Nullifier) -> bool {
        self.storage.exists(self.path(nullifier))
    }

    pub fn get(&self, nullifier: &Nullifier) -> StorageResult<DepositNote> {
        let path = self.path(nullifier);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Note {nullifier}")));
        }
        self.storage.read_json(path)
    }

    /// Store a new note. An existing note is never overwritten.
    pub fn create(&self, note: &DepositNote) -> StorageResult<()> {
        if self.exists(&note.nullifier) {
            return Err(StorageError::AlreadyExists(format!("Note {}", note.nullifier)));
        }
        self.storage.write_json(self.path(&note.nullifier), note)
    }

    pub fn update(&self, note: &DepositNote) -> StorageResult<()> {
        if !self.exists(&note.nullifier) {
            return Err(StorageError::NotFound(format!("Note {}", note.nullifier)));
        }
        self.storage.write_json(self.path(&note.nullifier), note)
    }

    /// All notes, oldest first.
    pub fn list(&self) -> StorageResult<Vec<DepositNote>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().notes_dir(&self.owner), "json")?;

        let mut notes = Vec::with_capacity(ids.len());
        for id in ids {
            let nullifier: Nullifier = id
                .parse()
                .map_err(|_| StorageError::SerializationError(format!("bad note file name {id}")))?;
            notes.push(self.get(&nullifier)?);
        }
        notes.sort_by_key(|note| note.created_at);
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{TicketId, VaultId};
    use crate::storage::StoragePaths;
    use alloy::primitives::B256;

    fn setup() -> (tempfile::TempDir, EncryptedStorage) {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().unwrap();
        (dir, storage)
    }

    #[test]
    fn create_get_list_update() {
        let (_dir, storage) = setup();
        let repo = NoteRepository::new(&storage, Address::repeat_byte(0xab));
        let note = DepositNote::new(
            1_000,
            "A".into(),
            VaultId(B256::repeat_byte(1)),
            TicketId(0),
        );

        repo.create(&note).unwrap();
        assert!(matches!(repo.create(&note), Err(StorageError::AlreadyExists(_))));
        assert_eq!(repo.get(&note.nullifier).unwrap(), note);

        let mut spent = note.clone();
        spent.spent = true;
        repo.update(&spent).unwrap();
        assert_eq!(repo.list().unwrap(), vec![spent]);

        assert!(matches!(
            repo.get(&Nullifier::random()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn owners_are_isolated() {
        let (_dir, storage) = setup();
        let alice = NoteRepository::new(&storage, Address::repeat_byte(1));
        let bob = NoteRepository::new(&storage, Address::repeat_byte(2));
        let note = DepositNote::new(5, "A".into(), VaultId(B256::ZERO), TicketId(0));
        alice.create(&note).unwrap();
        assert!(!bob.exists(&note.nullifier));
        assert!(bob.list().unwrap().is_empty());
    }
}
