// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Journal reconciliation.
//!
//! | Journal phase | Ledger intent state | Action |
//! |---|---|---|
//! | any | unknown, or a different payload | close as stale |
//! | any | `Pending` | close as stale |
//! | any | `Executed` | close, count executed |
//! | any | `Failed` / `Expired` | close |
//! | `Claimed` | `Processing` | fail as interrupted |
//! | `Submitted` | `Processing`, past deadline | expire |
//! | `Submitted` | `Processing`, attempts exhausted | fail as submission timeout |
//! | `Submitted` | `Processing` | resubmit the journaled bytes |

use tracing::{info, warn};

use super::{IntentOutcome, IntentProcessor, ProcessError, TickReport, MAX_SUBMISSION_ATTEMPTS};
use crate::blockchain::{ChainError, LedgerClient};
use crate::gateway::KeyServer;
use crate::ledger::{IntentState, LedgerError};
use crate::signer::SigningDelegate;
use crate::storage::{AuditEvent, AuditEventType, JournalEntry, JournalPhase};
use crate::venue::SwapVenue;

impl<L, K, V, S> IntentProcessor<L, K, V, S>
where
    L: LedgerClient,
    K: KeyServer,
    V: SwapVenue,
    S: SigningDelegate,
{
    pub(super) async fn reconcile(&self, report: &mut TickReport) {
        let entries = match self.journal.outstanding() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not read submission journal");
                return;
            }
        };

        for entry in entries {
            // An entry owned by a running pipeline is not stale.
            let Some(_guard) = self.begin(entry.intent_id) else {
                continue;
            };
            if let Some(outcome) = self.reconcile_entry(entry).await {
                report.record(&outcome);
            }
        }
    }

    async fn reconcile_entry(&self, entry: JournalEntry) -> Option<IntentOutcome> {
        let intent_id = entry.intent_id;
        let intent = match self.ledger.intent(intent_id).await {
            Ok(intent) => intent,
            Err(ChainError::Rejected(LedgerError::IntentNotFound(_))) => {
                warn!(intent_id = %intent_id, "Closing journal entry for an unknown intent");
                self.close(intent_id);
                return None;
            }
            Err(e) => {
                warn!(intent_id = %intent_id, error = %e, "Could not reconcile intent");
                return Some(IntentOutcome::Untouched(e.into()));
            }
        };

        // Same id, different intent: the entry predates the current ledger.
        if intent.payload.id() != entry.payload {
            warn!(
                intent_id = %intent_id,
                journaled = %entry.payload,
                current = %intent.payload.id(),
                "Closing journal entry written for an earlier intent"
            );
            self.close(intent_id);
            return None;
        }

        match intent.state {
            IntentState::Pending => {
                // Never claimed, so nothing of this entry reached the ledger.
                warn!(intent_id = %intent_id, "Closing stale journal entry for a pending intent");
                self.close(intent_id);
                return None;
            }
            IntentState::Executed => {
                info!(intent_id = %intent_id, attempts = entry.attempts, "Submission reconciled as executed");
                self.audit(
                    AuditEvent::new(AuditEventType::SubmissionReconciled)
                        .with_resource("intent", intent_id.to_string())
                        .with_details(serde_json::json!({ "attempts": entry.attempts })),
                );
                let tx_hash = intent.tx_hash.unwrap_or_default();
                return Some(self.executed(intent_id, tx_hash));
            }
            state if state.is_terminal() => {
                self.close(intent_id);
                return None;
            }
            _ => {}
        }

        let signed = match entry.phase {
            JournalPhase::Claimed => {
                warn!(intent_id = %intent_id, "Found intent claimed but never submitted");
                return Some(self.fail(intent_id, ProcessError::Interrupted).await);
            }
            JournalPhase::Submitted { signed } => signed,
        };

        let now = match self.ledger.now_secs().await {
            Ok(now) => now,
            Err(e) => return Some(IntentOutcome::Untouched(e.into())),
        };
        if intent.is_past_deadline(now) {
            return Some(self.expire(intent_id).await);
        }
        if entry.attempts >= MAX_SUBMISSION_ATTEMPTS {
            return Some(self.fail(intent_id, ProcessError::SubmissionTimeout).await);
        }

        // The transaction never landed: resend the same signed bytes.
        match self.ledger.transaction(signed.tx_hash()).await {
            Ok(Some(_)) => return Some(self.executed(intent_id, signed.tx_hash())),
            Ok(None) => {}
            Err(e) => return Some(IntentOutcome::Untouched(e.into())),
        }
        if let Err(e) = self.journal.record_submission(entry.payload, &signed) {
            return Some(IntentOutcome::Untouched(e.into()));
        }
        info!(
            intent_id = %intent_id,
            attempt = entry.attempts + 1,
            tx_hash = %signed.tx_hash(),
            "Resubmitting journaled finalize"
        );
        Some(self.submit(&signed).await)
    }
}
