// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use tokio::sync::Mutex;
use tracing::warn;

use super::{ChainError, ChainResult, LedgerClient};
use crate::ledger::{
    BalanceLedger, FinalizeReceipt, IntentId, Nullifier, SignedFinalize, SwapIntent, Ticket,
    TicketId, VaultId,
};

/// Simulated failure of the next `submit_finalize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitFault {
    /// The transaction never reaches the ledger.
    DropBeforeApply,
    /// The ledger applies the transaction but the receipt is lost.
    DropAfterApply,
}

/// [`LedgerClient`] over an in-process [`BalanceLedger`].
pub struct LocalLedgerClient {
    ledger: Arc<BalanceLedger>,
    caller: Address,
    faults: Mutex<Vec<SubmitFault>>,
}

impl LocalLedgerClient {
    /// `caller` is the enclave identity used for queue management.
    pub fn new(ledger: Arc<BalanceLedger>, caller: Address) -> Self {
        Self {
            ledger,
            caller,
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    /// Queue a fault for an upcoming submission. Faults apply in FIFO order.
    pub async fn inject_fault(&self, fault: SubmitFault) {
        self.faults.lock().await.push(fault);
    }
}

impl LedgerClient for LocalLedgerClient {
    async fn now_secs(&self) -> ChainResult<u64> {
        Ok(self.ledger.now_secs())
    }

    async fn pending_intents(&self) -> ChainResult<Vec<SwapIntent>> {
        Ok(self.ledger.pending_intents()?)
    }

    async fn intent(&self, intent_id: IntentId) -> ChainResult<SwapIntent> {
        Ok(self.ledger.intent(intent_id)?)
    }

    async fn claim_intent(&self, intent_id: IntentId) -> ChainResult<SwapIntent> {
        Ok(self.ledger.claim_intent(self.caller, intent_id)?)
    }

    async fn fail_intent(&self, intent_id: IntentId, reason: &str) -> ChainResult<()> {
        Ok(self.ledger.fail_intent(self.caller, intent_id, reason)?)
    }

    async fn expire_intent(&self, intent_id: IntentId) -> ChainResult<()> {
        Ok(self.ledger.expire_intent(self.caller, intent_id)?)
    }

    async fn ticket(&self, vault_id: VaultId, ticket_id: TicketId) -> ChainResult<Ticket> {
        Ok(self.ledger.ticket(vault_id, ticket_id)?)
    }

    async fn is_nullifier_spent(&self, nullifier: &Nullifier) -> ChainResult<bool> {
        Ok(self.ledger.is_nullifier_spent(nullifier)?)
    }

    async fn submit_finalize(&self, signed: &SignedFinalize) -> ChainResult<FinalizeReceipt> {
        let fault = {
            let mut faults = self.faults.lock().await;
            if faults.is_empty() {
                None
            } else {
                Some(faults.remove(0))
            }
        };

        match fault {
            Some(SubmitFault::DropBeforeApply) => {
                warn!(intent_id = %signed.tx.intent_id, "Injected fault: submission dropped");
                Err(ChainError::SubmissionTimeout)
            }
            Some(SubmitFault::DropAfterApply) => {
                let applied = self.ledger.finalize_swap(signed);
                warn!(
                    intent_id = %signed.tx.intent_id,
                    applied = applied.is_ok(),
                    "Injected fault: receipt dropped"
                );
                Err(ChainError::SubmissionTimeout)
            }
            None => Ok(self.ledger.finalize_swap(signed)?),
        }
    }

    async fn transaction(&self, tx_hash: B256) -> ChainResult<Option<IntentId>> {
        Ok(self.ledger.transaction(tx_hash)?)
    }
}
