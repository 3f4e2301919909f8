// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Intent Processor
//!
//! Background task that drains the intent queue from inside the enclave.
//!
//! ## Tick
//!
//! Every `poll_interval` (default 5 s) the processor:
//! 1. Reconciles journal entries left by earlier ticks (see [`reconcile`]).
//! 2. Lists pending intents oldest-first. Intents past their deadline are
//!    expired; the rest run the pipeline one at a time.
//!
//! ## Pipeline
//!
//! claim → journal `Claimed` → decrypt payload → validate against the
//! ticket → decrypt ticket amount → quote → execute at the venue → seal
//! output and remainder → sign via the delegate → journal `Submitted` →
//! submit.
//!
//! Venue calls run under `venue_timeout` (default 10 s). Quotes are
//! retried with bounded backoff on timeouts and outages; an execution is
//! retried only when the venue reported it unavailable, since a timed-out
//! execution may already have traded. Either way a hung venue costs one
//! intent, never the tick.
//!
//! Every failure before submission fails the intent with a
//! [`ProcessError`] code. A submission whose outcome is unknown stays in
//! the journal and is never re-signed: reconciliation resubmits the exact
//! bytes that were journaled, or fails the intent after
//! [`MAX_SUBMISSION_ATTEMPTS`].
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`.

mod error;
mod pipeline;
mod reconcile;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::blockchain::{ChainError, LedgerClient};
use crate::gateway::{EncryptionGateway, KeyServer};
use crate::ledger::{IntentId, LedgerError, SignedFinalize};
use crate::retry::RetryPolicy;
use crate::signer::SigningDelegate;
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, EncryptedStorage, SubmissionJournal};
use crate::venue::SwapVenue;

pub use error::ProcessError;

/// Default interval between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default bound on a single venue call.
pub const DEFAULT_VENUE_TIMEOUT: Duration = Duration::from_secs(10);

/// Submissions of one signed transaction before the intent is failed.
pub const MAX_SUBMISSION_ATTEMPTS: u32 = 3;

/// What happened to one intent.
#[derive(Debug)]
pub enum IntentOutcome {
    Executed { intent_id: IntentId, tx_hash: B256 },
    Failed(ProcessError),
    Expired,
    /// Submitted without confirmation; left for reconciliation.
    Unconfirmed { tx_hash: B256 },
    /// The intent was not touched (already claimed, busy, ledger offline).
    Untouched(ProcessError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub executed: usize,
    pub failed: usize,
    pub expired: usize,
    pub deferred: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &IntentOutcome) {
        match outcome {
            IntentOutcome::Executed { .. } => self.executed += 1,
            IntentOutcome::Failed(_) => self.failed += 1,
            IntentOutcome::Expired => self.expired += 1,
            IntentOutcome::Unconfirmed { .. } | IntentOutcome::Untouched(_) => self.deferred += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct IntentProcessor<L, K, V, S> {
    ledger: L,
    gateway: Arc<EncryptionGateway<K>>,
    venue: V,
    signer: S,
    /// Decryption identity registered as the ledger's enclave authority.
    enclave: PrivateKeySigner,
    journal: SubmissionJournal,
    audit: Option<Arc<EncryptedStorage>>,
    in_flight: Mutex<HashSet<IntentId>>,
    poll_interval: Duration,
    venue_timeout: Duration,
    venue_retry: RetryPolicy,
}

/// Removes the intent from the in-flight set on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<IntentId>>,
    intent_id: IntentId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.intent_id);
    }
}

impl<L, K, V, S> IntentProcessor<L, K, V, S>
where
    L: LedgerClient,
    K: KeyServer,
    V: SwapVenue,
    S: SigningDelegate,
{
    pub fn new(
        ledger: L,
        gateway: Arc<EncryptionGateway<K>>,
        venue: V,
        signer: S,
        enclave: PrivateKeySigner,
        journal: SubmissionJournal,
    ) -> Self {
        Self {
            ledger,
            gateway,
            venue,
            signer,
            enclave,
            journal,
            audit: None,
            in_flight: Mutex::new(HashSet::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            venue_timeout: DEFAULT_VENUE_TIMEOUT,
            venue_retry: RetryPolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_venue_timeout(mut self, timeout: Duration) -> Self {
        self.venue_timeout = timeout;
        self
    }

    pub fn with_venue_retry(mut self, retry: RetryPolicy) -> Self {
        self.venue_retry = retry;
        self
    }

    pub fn with_audit(mut self, storage: Arc<EncryptedStorage>) -> Self {
        self.audit = Some(storage);
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn journal(&self) -> &SubmissionJournal {
        &self.journal
    }

    /// Run the poll loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(processor.clone().run(shutdown.clone()));
    /// ```
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            enclave = %self.enclave.address(),
            "Intent processor starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Intent processor shutting down");
                return;
            }

            self.poll_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Intent processor shutting down");
                    return;
                }
            }
        }
    }

    /// One tick: reconcile, then expire or process every pending intent.
    pub async fn poll_step(&self) -> TickReport {
        let mut report = TickReport::default();
        self.reconcile(&mut report).await;

        let pending = match self.ledger.pending_intents().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Could not list pending intents");
                return report;
            }
        };
        let now = match self.ledger.now_secs().await {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, "Could not read ledger time");
                return report;
            }
        };

        for intent in pending {
            let Some(_guard) = self.begin(intent.intent_id) else {
                report.deferred += 1;
                continue;
            };
            let outcome = if intent.is_past_deadline(now) {
                self.expire(intent.intent_id).await
            } else {
                self.execute(intent.intent_id).await
            };
            report.record(&outcome);
        }

        if !report.is_empty() {
            info!(
                executed = report.executed,
                failed = report.failed,
                expired = report.expired,
                deferred = report.deferred,
                "Processor tick complete"
            );
        }
        report
    }

    /// Process one intent on demand (the TEE processing endpoint).
    pub async fn process_intent(&self, intent_id: IntentId) -> IntentOutcome {
        let Some(_guard) = self.begin(intent_id) else {
            return IntentOutcome::Untouched(ProcessError::Busy);
        };
        self.execute(intent_id).await
    }

    fn begin(&self, intent_id: IntentId) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(intent_id) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            intent_id,
        })
    }

    /// Claim and run the pipeline. The caller holds the in-flight guard.
    async fn execute(&self, intent_id: IntentId) -> IntentOutcome {
        let intent = match self.ledger.claim_intent(intent_id).await {
            Ok(intent) => intent,
            Err(ChainError::Rejected(LedgerError::DeadlineExpired(_))) => {
                return self.expire(intent_id).await;
            }
            Err(e) => {
                warn!(intent_id = %intent_id, error = %e, "Intent not claimed");
                return IntentOutcome::Untouched(ProcessError::from(e));
            }
        };

        let payload_id = intent.payload.id();
        if let Err(e) = self.journal.record_claimed(intent_id, payload_id) {
            return self.fail(intent_id, e.into()).await;
        }

        let signed = match self.prepare(&intent).await {
            Ok(signed) => signed,
            Err(e) => return self.fail(intent_id, e).await,
        };

        if let Err(e) = self.journal.record_submission(payload_id, &signed) {
            return self.fail(intent_id, e.into()).await;
        }
        self.submit(&signed).await
    }

    /// Hand signed bytes to the ledger. The journal already holds them.
    async fn submit(&self, signed: &SignedFinalize) -> IntentOutcome {
        let intent_id = signed.tx.intent_id;
        let tx_hash = signed.tx_hash();

        match self.ledger.submit_finalize(signed).await {
            Ok(receipt) => self.executed(intent_id, receipt.tx_hash),
            Err(ChainError::Rejected(LedgerError::AlreadyFinalized(_))) => {
                // A previous submission of these bytes landed.
                self.executed(intent_id, tx_hash)
            }
            Err(e @ (ChainError::SubmissionTimeout | ChainError::Unavailable(_))) => {
                warn!(
                    intent_id = %intent_id,
                    tx_hash = %tx_hash,
                    error = %e,
                    "Submission outcome unknown, deferring to reconciliation"
                );
                IntentOutcome::Unconfirmed { tx_hash }
            }
            Err(e) => self.fail(intent_id, e.into()).await,
        }
    }

    fn executed(&self, intent_id: IntentId, tx_hash: B256) -> IntentOutcome {
        self.close(intent_id);
        info!(intent_id = %intent_id, tx_hash = %tx_hash, "Intent executed");
        self.audit(
            AuditEvent::new(AuditEventType::IntentExecuted)
                .with_actor(self.enclave.address().to_string())
                .with_resource("intent", intent_id.to_string())
                .with_details(serde_json::json!({ "tx_hash": tx_hash.to_string() })),
        );
        IntentOutcome::Executed { intent_id, tx_hash }
    }

    async fn fail(&self, intent_id: IntentId, reason: ProcessError) -> IntentOutcome {
        if matches!(reason, ProcessError::DeadlineExpired) {
            return self.expire(intent_id).await;
        }

        match self.ledger.fail_intent(intent_id, reason.code()).await {
            Ok(()) => self.close(intent_id),
            Err(e) => {
                // The journal entry stays; reconciliation retries the failure.
                error!(intent_id = %intent_id, error = %e, "Could not mark intent failed");
            }
        }

        warn!(intent_id = %intent_id, code = reason.code(), error = %reason, "Intent failed");
        let event_type = match reason {
            ProcessError::NullifierReplay => AuditEventType::NullifierReplay,
            ProcessError::DecryptionDenied(_) => AuditEventType::PolicyDenied,
            _ => AuditEventType::IntentFailed,
        };
        self.audit(
            AuditEvent::new(event_type)
                .with_actor(self.enclave.address().to_string())
                .with_resource("intent", intent_id.to_string())
                .failed(reason.code()),
        );
        IntentOutcome::Failed(reason)
    }

    async fn expire(&self, intent_id: IntentId) -> IntentOutcome {
        if let Err(e) = self.ledger.expire_intent(intent_id).await {
            warn!(intent_id = %intent_id, error = %e, "Could not expire intent");
            return IntentOutcome::Untouched(ProcessError::from(e));
        }
        self.close(intent_id);
        info!(intent_id = %intent_id, "Intent expired");
        self.audit(
            AuditEvent::new(AuditEventType::IntentExpired)
                .with_actor(self.enclave.address().to_string())
                .with_resource("intent", intent_id.to_string()),
        );
        IntentOutcome::Expired
    }

    fn close(&self, intent_id: IntentId) {
        if let Err(e) = self.journal.close(intent_id) {
            error!(intent_id = %intent_id, error = %e, "Could not close journal entry");
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(storage) = &self.audit {
            if let Err(e) = AuditRepository::new(storage).log(&event) {
                warn!(error = %e, "Failed to write audit event");
            }
        }
    }
}
