// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stealth keys of one owner under `wallets/{owner}/stealth/`.

use alloy::primitives::Address;

use super::super::{EncryptedStorage, StorageError, StorageResult};
use crate::wallet::StealthKeyRecord;

pub struct StealthKeyRepository<'a> {
    storage: &'a EncryptedStorage,
    owner: String,
}

impl<'a> StealthKeyRepository<'a> {
    pub fn new(storage: &'a EncryptedStorage, owner: Address) -> Self {
        Self {
            storage,
            owner: owner.to_string(),
        }
    }

    fn path(&self, address: Address) -> std::path::PathBuf {
        self.storage
            .paths()
            .stealth_key(&self.owner, &address.to_string())
    }

    pub fn exists(&self, address: Address) -> bool {
        self.storage.exists(self.path(address))
    }

    pub fn get(&self, address: Address) -> StorageResult<StealthKeyRecord> {
        let path = self.path(address);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Stealth key {address}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, record: &StealthKeyRecord) -> StorageResult<()> {
        if self.exists(record.address) {
            return Err(StorageError::AlreadyExists(format!(
                "Stealth key {}",
                record.address
            )));
        }
        self.storage.write_json(self.path(record.address), record)
    }

    pub fn update(&self, record: &StealthKeyRecord) -> StorageResult<()> {
        if !self.exists(record.address) {
            return Err(StorageError::NotFound(format!("Stealth key {}", record.address)));
        }
        self.storage.write_json(self.path(record.address), record)
    }

    pub fn list(&self) -> StorageResult<Vec<StealthKeyRecord>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().stealth_dir(&self.owner), "json")?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let address: Address = id
                .parse()
                .map_err(|_| StorageError::SerializationError(format!("bad stealth file name {id}")))?;
            records.push(self.get(address)?);
        }
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    #[test]
    fn create_list_and_mark_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().unwrap();
        let repo = StealthKeyRepository::new(&storage, Address::repeat_byte(7));

        let record = StealthKeyRecord::generate();
        repo.create(&record).unwrap();
        assert!(repo.create(&record).is_err());

        let mut claimed = repo.get(record.address).unwrap();
        claimed.claimed = true;
        repo.update(&claimed).unwrap();

        let listed = repo.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].claimed);
        assert_eq!(listed[0].signer().unwrap().address(), record.address);
    }
}
