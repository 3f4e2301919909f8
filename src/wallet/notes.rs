// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Amount, Nullifier, TicketId, TokenType, VaultId};

/// Owner-held record proving entitlement to a ticket.
///
/// The nullifier is the only link between the deposit and the swap that
/// later spends it. Losing it loses the funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositNote {
    pub nullifier: Nullifier,
    pub amount: Amount,
    pub token_type: TokenType,
    pub vault_id: VaultId,
    pub ticket_id: TicketId,
    pub created_at: DateTime<Utc>,
    pub spent: bool,
    /// Note whose swap or unwrap creates this one; the note is live only
    /// once that parent is spent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Nullifier>,
}

impl DepositNote {
    pub fn new(amount: Amount, token_type: TokenType, vault_id: VaultId, ticket_id: TicketId) -> Self {
        Self {
            nullifier: Nullifier::random(),
            amount,
            token_type,
            vault_id,
            ticket_id,
            created_at: Utc::now(),
            spent: false,
            parent: None,
        }
    }

    /// Fresh note for the remainder of `self` after `spent_amount` leaves.
    pub fn remainder(&self, spent_amount: Amount) -> Option<Self> {
        let rest = self.amount.checked_sub(spent_amount)?;
        if rest == 0 {
            return None;
        }
        let mut note = Self::new(rest, self.token_type.clone(), self.vault_id, self.ticket_id);
        note.parent = Some(self.nullifier);
        Some(note)
    }
}
