// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decryption approval predicate evaluated by every custodian.
//!
//! | Namespace | Approved requester |
//! |-----------|--------------------|
//! | vault id | vault owner, or the enclave identity |
//! | padded address | that address, or the enclave if an output is addressed to it |
//!
//! Anything else is denied, and the enclave is never approved for a pointer
//! the ledger has already replaced or burned. The predicate reads current
//! ledger state on every call, so revoking an authority takes effect on the
//! next request.

use alloy::primitives::Address;

use super::{BalanceLedger, VaultId};
use crate::crypto::{address_namespace, EncryptionId};
use crate::gateway::{ApprovalPolicy, PolicyError};

impl ApprovalPolicy for BalanceLedger {
    fn check_approval(&self, id: &EncryptionId, requester: Address) -> Result<(), PolicyError> {
        let namespace = id.namespace();
        if namespace == address_namespace(requester) {
            return Ok(());
        }

        let state = self
            .read()
            .map_err(|e| PolicyError(e.to_string()))?;

        if requester == state.authority.enclave && state.retired.contains(id) {
            return Err(PolicyError(format!("pointer {id} has been retired")));
        }

        if let Some(vault) = state.vaults.get(&VaultId(namespace)) {
            if vault.owner == requester || requester == state.authority.enclave {
                return Ok(());
            }
            return Err(PolicyError(format!(
                "{requester} may not decrypt pointers of vault {}",
                vault.id
            )));
        }

        let addressed_output = state
            .outputs
            .values()
            .any(|output| address_namespace(output.recipient) == namespace);
        if addressed_output && requester == state.authority.enclave {
            return Ok(());
        }

        Err(PolicyError(format!(
            "{requester} is not approved for namespace {namespace}"
        )))
    }
}
