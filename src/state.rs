// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::blockchain::LocalLedgerClient;
use crate::gateway::Custodian;
use crate::processor::IntentProcessor;
use crate::signer::Delegate;
use crate::storage::EncryptedStorage;
use crate::venue::SimulatedVenue;

/// The processor as composed by the server binary.
pub type AppProcessor = IntentProcessor<LocalLedgerClient, Custodian, SimulatedVenue, Delegate>;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<AppProcessor>,
    /// Encrypted data root, checked by the health endpoint.
    pub storage: Option<Arc<EncryptedStorage>>,
}

impl AppState {
    pub fn new(processor: Arc<AppProcessor>) -> Self {
        Self {
            processor,
            storage: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<EncryptedStorage>) -> Self {
        self.storage = Some(storage);
        self
    }
}
