// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance Ledger
//!
//! In-process model of the on-chain pool: vaults of encrypted tickets, the
//! real-token reserves backing them, the nullifier set, stealth outputs and
//! the Intent Queue.
//!
//! ## Atomicity
//!
//! Every mutating operation takes the state write lock, performs all of its
//! checks, and only then applies its effects. No check follows the first
//! write, so a failed call leaves no trace and a successful one is
//! observed whole.
//!
//! ## What the ledger knows
//!
//! Public amounts (`amount_public`, `from_amount`, `to_amount`), pointer
//! ciphertexts, nullifier commitments and spent nullifiers. It never sees a
//! hidden amount and never derives a pointer itself.
//!
//! ## Authority
//!
//! Admin operations require the [`AdminCap`] returned by
//! [`BalanceLedger::new`]. Finalize must be signed by the registered
//! finalizer; other queue operations accept either registered TEE identity.

pub mod finalize;
pub mod intent;
pub mod payload;
pub mod policy;
pub mod types;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use alloy::primitives::{keccak256, Address, B256};
use rand::RngCore;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::crypto::{address_namespace, session::verify_prehash, EncryptionId};
use crate::gateway::{ConsumedPointer, Encrypted};

pub use finalize::{FinalizeReceipt, FinalizeSwap, Remainder, SignedFinalize};
pub use intent::{IntentQueue, IntentState, QueueError, SwapIntent};
pub use payload::SwapPayload;
pub use types::{
    Amount, IntentId, Nullifier, OutputId, StealthOutput, TeeAuthority, Ticket, TicketId,
    TokenType, Vault, VaultId,
};

const CLAIM_DOMAIN: &[u8] = b"sealed-swap/claim-output/v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger is paused")]
    Paused,

    #[error("vault {0} not found")]
    VaultNotFound(VaultId),

    #[error("ticket {ticket} not found in vault {vault}")]
    TicketNotFound { vault: VaultId, ticket: TicketId },

    #[error("intent {0} not found")]
    IntentNotFound(IntentId),

    #[error("stealth output {0} not found")]
    OutputNotFound(OutputId),

    #[error("stealth output {0} already claimed")]
    OutputAlreadyClaimed(OutputId),

    #[error("caller {0} is not the vault owner")]
    NotVaultOwner(Address),

    #[error("caller {0} is not the registered TEE authority")]
    UnauthorizedAuthority(Address),

    #[error("admin capability does not belong to this ledger")]
    InvalidCapability,

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("pointer namespace {actual} does not match {expected}")]
    NamespaceMismatch { expected: B256, actual: B256 },

    #[error("insufficient {token} funds: need {needed}, have {available}")]
    InsufficientFunds {
        token: TokenType,
        needed: Amount,
        available: Amount,
    },

    #[error("insufficient {token} reserves: need {needed}, have {available}")]
    InsufficientReserves {
        token: TokenType,
        needed: Amount,
        available: Amount,
    },

    #[error("nullifier already spent")]
    NullifierReplay,

    #[error("nullifier does not match the ticket commitment")]
    NullifierMismatch,

    #[error("intent {0} already finalized")]
    AlreadyFinalized(IntentId),

    #[error("intent {0} is past its deadline")]
    DeadlineExpired(IntentId),

    #[error("intent {0} has not reached its deadline")]
    DeadlineNotReached(IntentId),

    #[error("intent {id}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: IntentId,
        from: IntentState,
        to: IntentState,
    },

    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("ledger state unavailable")]
    Unavailable,
}

impl From<QueueError> for LedgerError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::NotFound(id) => Self::IntentNotFound(id),
            QueueError::InvalidTransition { id, from, to } => Self::InvalidTransition { id, from, to },
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Capability for admin operations. Exactly one exists per ledger.
#[derive(Debug)]
pub struct AdminCap {
    ledger_id: u64,
}

#[derive(Debug)]
struct LedgerState {
    paused: bool,
    authority: TeeAuthority,
    vault_seq: u64,
    vaults: BTreeMap<VaultId, Vault>,
    queue: IntentQueue,
    nullifiers: BTreeSet<Nullifier>,
    reserves: BTreeMap<TokenType, Amount>,
    accounts: BTreeMap<(Address, TokenType), Amount>,
    outputs: BTreeMap<OutputId, StealthOutput>,
    next_output_id: u64,
    transactions: BTreeMap<B256, IntentId>,
    /// Identifiers of pointers replaced or burned; never released to the enclave again.
    retired: HashSet<EncryptionId>,
}

impl LedgerState {
    fn retire(&mut self, pointers: impl IntoIterator<Item = ConsumedPointer>) {
        self.retired.extend(pointers.into_iter().map(|p| p.id));
    }

    fn account(&self, who: Address, token: &TokenType) -> Amount {
        self.accounts
            .get(&(who, token.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn reserve(&self, token: &TokenType) -> Amount {
        self.reserves.get(token).copied().unwrap_or(0)
    }

    fn require_funds(&self, who: Address, token: &TokenType, needed: Amount) -> LedgerResult<()> {
        let available = self.account(who, token);
        if available < needed {
            return Err(LedgerError::InsufficientFunds {
                token: token.clone(),
                needed,
                available,
            });
        }
        Ok(())
    }

    fn require_reserves(&self, token: &TokenType, needed: Amount) -> LedgerResult<()> {
        let available = self.reserve(token);
        if available < needed {
            return Err(LedgerError::InsufficientReserves {
                token: token.clone(),
                needed,
                available,
            });
        }
        Ok(())
    }

    fn owned_vault(&self, caller: Address, vault_id: VaultId) -> LedgerResult<&Vault> {
        let vault = self
            .vaults
            .get(&vault_id)
            .ok_or(LedgerError::VaultNotFound(vault_id))?;
        if vault.owner != caller {
            return Err(LedgerError::NotVaultOwner(caller));
        }
        Ok(vault)
    }

    fn require_authority(&self, caller: Address) -> LedgerResult<()> {
        if !self.authority.is_authority(caller) {
            return Err(LedgerError::UnauthorizedAuthority(caller));
        }
        Ok(())
    }

    fn require_active(&self) -> LedgerResult<()> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    // Infallible effects, applied only after all checks pass.

    fn debit_account(&mut self, who: Address, token: &TokenType, amount: Amount) {
        let entry = self.accounts.entry((who, token.clone())).or_insert(0);
        *entry = entry.saturating_sub(amount);
    }

    fn credit_account(&mut self, who: Address, token: &TokenType, amount: Amount) {
        let entry = self.accounts.entry((who, token.clone())).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    fn lock_reserves(&mut self, token: &TokenType, amount: Amount) {
        let entry = self.reserves.entry(token.clone()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    fn release_reserves(&mut self, token: &TokenType, amount: Amount) {
        let entry = self.reserves.entry(token.clone()).or_insert(0);
        *entry = entry.saturating_sub(amount);
    }

    fn push_output(
        &mut self,
        recipient: Address,
        token_type: TokenType,
        pointer: Encrypted<Amount>,
        source_intent: IntentId,
    ) -> OutputId {
        let output_id = OutputId(self.next_output_id);
        self.next_output_id += 1;
        self.outputs.insert(
            output_id,
            StealthOutput {
                output_id,
                recipient,
                token_type,
                pointer,
                source_intent,
                claimed: false,
            },
        );
        output_id
    }
}

fn check_namespace(pointer: &Encrypted<Amount>, expected: B256) -> LedgerResult<()> {
    if pointer.namespace() != expected {
        return Err(LedgerError::NamespaceMismatch {
            expected,
            actual: pointer.namespace(),
        });
    }
    Ok(())
}

/// Digest a stealth key signs to claim an output into a vault.
pub fn claim_digest(output_id: OutputId, vault_id: VaultId, claimant: Address) -> B256 {
    let mut message = CLAIM_DOMAIN.to_vec();
    message.extend_from_slice(&output_id.0.to_be_bytes());
    message.extend_from_slice(vault_id.0.as_slice());
    message.extend_from_slice(claimant.as_slice());
    keccak256(message)
}

pub struct BalanceLedger {
    ledger_id: u64,
    state: RwLock<LedgerState>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    pub fn new(authority: TeeAuthority, clock: Arc<dyn Clock>) -> (Self, AdminCap) {
        let ledger_id = rand::thread_rng().next_u64();
        let ledger = Self {
            ledger_id,
            state: RwLock::new(LedgerState {
                paused: false,
                authority,
                vault_seq: 0,
                vaults: BTreeMap::new(),
                queue: IntentQueue::new(),
                nullifiers: BTreeSet::new(),
                reserves: BTreeMap::new(),
                accounts: BTreeMap::new(),
                outputs: BTreeMap::new(),
                next_output_id: 0,
                transactions: BTreeMap::new(),
                retired: HashSet::new(),
            }),
            clock,
        };
        (ledger, AdminCap { ledger_id })
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.state.read().map_err(|_| LedgerError::Unavailable)
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state.write().map_err(|_| LedgerError::Unavailable)
    }

    fn check_cap(&self, cap: &AdminCap) -> LedgerResult<()> {
        if cap.ledger_id != self.ledger_id {
            return Err(LedgerError::InvalidCapability);
        }
        Ok(())
    }

    pub fn now_secs(&self) -> u64 {
        self.clock.now_secs()
    }

    // =========================================================================
    // Admin
    // =========================================================================

    pub fn pause(&self, cap: &AdminCap) -> LedgerResult<()> {
        self.check_cap(cap)?;
        self.write()?.paused = true;
        warn!("Ledger paused");
        Ok(())
    }

    pub fn unpause(&self, cap: &AdminCap) -> LedgerResult<()> {
        self.check_cap(cap)?;
        self.write()?.paused = false;
        info!("Ledger unpaused");
        Ok(())
    }

    pub fn update_authority(&self, cap: &AdminCap, authority: TeeAuthority) -> LedgerResult<()> {
        self.check_cap(cap)?;
        let mut state = self.write()?;
        let previous = state.authority;
        state.authority = authority;
        info!(
            old_finalizer = %previous.finalizer,
            new_finalizer = %authority.finalizer,
            new_enclave = %authority.enclave,
            "TEE authority updated"
        );
        Ok(())
    }

    /// Credit real tokens to an account (bootstrap / faucet).
    pub fn credit_account(
        &self,
        cap: &AdminCap,
        who: Address,
        token: &TokenType,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.check_cap(cap)?;
        self.write()?.credit_account(who, token, amount);
        Ok(())
    }

    // =========================================================================
    // Owner operations
    // =========================================================================

    pub fn open_vault(&self, owner: Address) -> LedgerResult<VaultId> {
        let mut state = self.write()?;
        state.require_active()?;

        let mut seed = owner.to_vec();
        seed.extend_from_slice(&state.vault_seq.to_be_bytes());
        let vault_id = VaultId(keccak256(seed));
        state.vault_seq += 1;
        state.vaults.insert(vault_id, Vault::new(vault_id, owner));

        info!(vault_id = %vault_id, owner = %owner, "Vault opened");
        Ok(vault_id)
    }

    /// Lock `amount_public` real tokens and mint a ticket bound to `pointer`.
    pub fn deposit(
        &self,
        caller: Address,
        vault_id: VaultId,
        token: &TokenType,
        amount_public: Amount,
        pointer: Encrypted<Amount>,
        nullifier_commitment: B256,
    ) -> LedgerResult<TicketId> {
        let mut state = self.write()?;
        state.require_active()?;
        state.owned_vault(caller, vault_id)?;
        if amount_public == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        check_namespace(&pointer, vault_id.0)?;
        state.require_funds(caller, token, amount_public)?;

        state.debit_account(caller, token, amount_public);
        state.lock_reserves(token, amount_public);
        let ticket_id = state
            .vaults
            .get_mut(&vault_id)
            .ok_or(LedgerError::VaultNotFound(vault_id))?
            .mint(token.clone(), pointer, nullifier_commitment);

        info!(vault_id = %vault_id, ticket_id = %ticket_id, token = %token, "Deposit locked");
        Ok(ticket_id)
    }

    /// Release `amount_public` real tokens to `recipient`, burning the ticket
    /// or leaving it with the caller-supplied remainder pointer.
    pub fn unwrap(
        &self,
        caller: Address,
        vault_id: VaultId,
        ticket_id: TicketId,
        amount_public: Amount,
        recipient: Address,
        remainder: Option<(Encrypted<Amount>, B256)>,
    ) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.require_active()?;
        let vault = state.owned_vault(caller, vault_id)?;
        let token = vault
            .tickets
            .get(&ticket_id)
            .ok_or(LedgerError::TicketNotFound {
                vault: vault_id,
                ticket: ticket_id,
            })?
            .token_type
            .clone();
        if amount_public == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if let Some((pointer, _)) = &remainder {
            check_namespace(pointer, vault_id.0)?;
        }
        state.require_reserves(&token, amount_public)?;

        state.release_reserves(&token, amount_public);
        state.credit_account(recipient, &token, amount_public);
        let tombstone = {
            let vault = state
                .vaults
                .get_mut(&vault_id)
                .ok_or(LedgerError::VaultNotFound(vault_id))?;
            match remainder {
                Some((pointer, commitment)) => vault.tickets.get_mut(&ticket_id).map(|ticket| {
                    ticket.nullifier_commitment = commitment;
                    std::mem::replace(&mut ticket.pointer, pointer).consume()
                }),
                None => vault
                    .tickets
                    .remove(&ticket_id)
                    .map(|ticket| ticket.pointer.consume()),
            }
        };
        state.retire(tombstone);

        info!(
            vault_id = %vault_id,
            ticket_id = %ticket_id,
            token = %token,
            amount = amount_public,
            recipient = %recipient,
            "Ticket unwrapped"
        );
        Ok(())
    }

    /// Move a stealth output into the caller's vault as a new ticket.
    ///
    /// `stealth_signature` is the output recipient's signature over
    /// [`claim_digest`]; `pointer` is the owner's re-encryption of the amount
    /// under the vault namespace.
    pub fn claim_output(
        &self,
        caller: Address,
        output_id: OutputId,
        vault_id: VaultId,
        pointer: Encrypted<Amount>,
        nullifier_commitment: B256,
        stealth_signature: &[u8],
    ) -> LedgerResult<TicketId> {
        let mut state = self.write()?;
        state.require_active()?;
        state.owned_vault(caller, vault_id)?;
        let output = state
            .outputs
            .get(&output_id)
            .ok_or(LedgerError::OutputNotFound(output_id))?;
        if output.claimed {
            return Err(LedgerError::OutputAlreadyClaimed(output_id));
        }
        verify_prehash(
            stealth_signature,
            &claim_digest(output_id, vault_id, caller),
            output.recipient,
        )
        .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
        check_namespace(&pointer, vault_id.0)?;

        let token = output.token_type.clone();
        let retired = state.outputs.get_mut(&output_id).map(|output| {
            output.claimed = true;
            output.pointer.id()
        });
        state.retire(retired.map(|id| ConsumedPointer { id }));
        let ticket_id = state
            .vaults
            .get_mut(&vault_id)
            .ok_or(LedgerError::VaultNotFound(vault_id))?
            .mint(token, pointer, nullifier_commitment);

        info!(output_id = %output_id, vault_id = %vault_id, ticket_id = %ticket_id, "Stealth output claimed");
        Ok(ticket_id)
    }

    // =========================================================================
    // Intent queue
    // =========================================================================

    pub fn create_swap_intent(
        &self,
        payload: Encrypted<SwapPayload>,
        token_in: TokenType,
        token_out: TokenType,
        deadline: u64,
    ) -> LedgerResult<IntentId> {
        let mut state = self.write()?;
        state.require_active()?;
        if token_in == token_out {
            return Err(LedgerError::InvalidIntent(
                "token_in and token_out must differ".to_string(),
            ));
        }
        let now = self.clock.now_secs();
        let intent_id = state
            .queue
            .enqueue(payload, token_in.clone(), token_out.clone(), deadline, now);

        info!(intent_id = %intent_id, token_in = %token_in, token_out = %token_out, deadline, "Swap intent queued");
        Ok(intent_id)
    }

    /// Pending → Processing.
    pub fn claim_intent(&self, caller: Address, intent_id: IntentId) -> LedgerResult<SwapIntent> {
        let mut state = self.write()?;
        state.require_active()?;
        state.require_authority(caller)?;
        let intent = state.queue.get(intent_id)?;
        if intent.is_past_deadline(self.clock.now_secs()) {
            return Err(LedgerError::DeadlineExpired(intent_id));
        }
        let intent = state.queue.transition(intent_id, IntentState::Processing)?;
        Ok(intent.clone())
    }

    pub fn fail_intent(&self, caller: Address, intent_id: IntentId, reason: &str) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.require_active()?;
        state.require_authority(caller)?;
        let intent = state.queue.transition(intent_id, IntentState::Failed)?;
        intent.failure_reason = Some(reason.to_string());
        warn!(intent_id = %intent_id, reason, "Intent failed");
        Ok(())
    }

    pub fn expire_intent(&self, caller: Address, intent_id: IntentId) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.require_active()?;
        state.require_authority(caller)?;
        if !state.queue.get(intent_id)?.is_past_deadline(self.clock.now_secs()) {
            return Err(LedgerError::DeadlineNotReached(intent_id));
        }
        state.queue.transition(intent_id, IntentState::Expired)?;
        info!(intent_id = %intent_id, "Intent expired");
        Ok(())
    }

    /// Apply a signed swap result. See the module docs for the guarantees.
    pub fn finalize_swap(&self, signed: &SignedFinalize) -> LedgerResult<FinalizeReceipt> {
        let tx = &signed.tx;
        let mut state = self.write()?;

        let finalizer = state.authority.finalizer;
        signed
            .verify_signer(finalizer)
            .map_err(|_| LedgerError::UnauthorizedAuthority(finalizer))?;
        state.require_active()?;

        let intent = state.queue.get(tx.intent_id)?;
        match intent.state {
            IntentState::Executed => {
                warn!(intent_id = %tx.intent_id, "Finalize replay for executed intent");
                return Err(LedgerError::AlreadyFinalized(tx.intent_id));
            }
            IntentState::Processing => {}
            other => {
                return Err(LedgerError::InvalidTransition {
                    id: tx.intent_id,
                    from: other,
                    to: IntentState::Executed,
                });
            }
        }
        if intent.is_past_deadline(self.clock.now_secs()) {
            return Err(LedgerError::DeadlineExpired(tx.intent_id));
        }
        let token_in = intent.token_in.clone();
        let token_out = intent.token_out.clone();

        if state.nullifiers.contains(&tx.nullifier) {
            warn!(intent_id = %tx.intent_id, "Nullifier replay rejected");
            return Err(LedgerError::NullifierReplay);
        }

        let vault = state
            .vaults
            .get(&tx.vault_id)
            .ok_or(LedgerError::VaultNotFound(tx.vault_id))?;
        let ticket = vault
            .tickets
            .get(&tx.ticket_id)
            .ok_or(LedgerError::TicketNotFound {
                vault: tx.vault_id,
                ticket: tx.ticket_id,
            })?;
        if ticket.token_type != token_in {
            return Err(LedgerError::InvalidIntent(format!(
                "ticket holds {} but intent sells {}",
                ticket.token_type, token_in
            )));
        }
        if tx.nullifier.commitment() != ticket.nullifier_commitment {
            return Err(LedgerError::NullifierMismatch);
        }

        if tx.from_amount == 0 || tx.to_amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        match &tx.remainder {
            Remainder::None => {}
            Remainder::InPlace { pointer, .. } => check_namespace(pointer, tx.vault_id.0)?,
            Remainder::Stealth { recipient, pointer } => {
                check_namespace(pointer, address_namespace(*recipient))?
            }
        }
        check_namespace(&tx.output_pointer, address_namespace(tx.output_recipient))?;
        state.require_reserves(&token_in, tx.from_amount)?;
        state.require_funds(finalizer, &token_out, tx.to_amount)?;

        // Effects.
        let tx_hash = signed.tx_hash();
        state.release_reserves(&token_in, tx.from_amount);
        state.credit_account(finalizer, &token_in, tx.from_amount);
        state.debit_account(finalizer, &token_out, tx.to_amount);
        state.lock_reserves(&token_out, tx.to_amount);

        let mut retired = Vec::new();
        let mut remainder_output = None;
        if let Some(vault) = state.vaults.get_mut(&tx.vault_id) {
            match &tx.remainder {
                Remainder::InPlace { pointer, commitment } => {
                    if let Some(ticket) = vault.tickets.get_mut(&tx.ticket_id) {
                        ticket.nullifier_commitment = *commitment;
                        retired.push(std::mem::replace(&mut ticket.pointer, pointer.clone()).consume());
                    }
                }
                Remainder::None | Remainder::Stealth { .. } => {
                    if let Some(ticket) = vault.tickets.remove(&tx.ticket_id) {
                        retired.push(ticket.pointer.consume());
                    }
                }
            }
        }
        if let Remainder::Stealth { recipient, pointer } = &tx.remainder {
            remainder_output = Some(state.push_output(*recipient, token_in.clone(), pointer.clone(), tx.intent_id));
        }
        state.retire(retired);

        let output_id = state.push_output(
            tx.output_recipient,
            token_out.clone(),
            tx.output_pointer.clone(),
            tx.intent_id,
        );
        state.nullifiers.insert(tx.nullifier);
        state.transactions.insert(tx_hash, tx.intent_id);
        let intent = state.queue.transition(tx.intent_id, IntentState::Executed)?;
        intent.tx_hash = Some(tx_hash);

        info!(
            intent_id = %tx.intent_id,
            tx_hash = %tx_hash,
            token_in = %token_in,
            token_out = %token_out,
            output_id = %output_id,
            remainder_output = ?remainder_output.map(|o| o.0),
            "Swap finalized"
        );
        Ok(FinalizeReceipt {
            intent_id: tx.intent_id,
            tx_hash,
            output_id,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_paused(&self) -> LedgerResult<bool> {
        Ok(self.read()?.paused)
    }

    pub fn authority(&self) -> LedgerResult<TeeAuthority> {
        Ok(self.read()?.authority)
    }

    pub fn vault(&self, vault_id: VaultId) -> LedgerResult<Vault> {
        self.read()?
            .vaults
            .get(&vault_id)
            .cloned()
            .ok_or(LedgerError::VaultNotFound(vault_id))
    }

    pub fn ticket(&self, vault_id: VaultId, ticket_id: TicketId) -> LedgerResult<Ticket> {
        self.read()?
            .vaults
            .get(&vault_id)
            .ok_or(LedgerError::VaultNotFound(vault_id))?
            .tickets
            .get(&ticket_id)
            .cloned()
            .ok_or(LedgerError::TicketNotFound {
                vault: vault_id,
                ticket: ticket_id,
            })
    }

    pub fn intent(&self, intent_id: IntentId) -> LedgerResult<SwapIntent> {
        Ok(self.read()?.queue.get(intent_id)?.clone())
    }

    /// Pending intents, oldest first, including those already past deadline.
    pub fn pending_intents(&self) -> LedgerResult<Vec<SwapIntent>> {
        Ok(self.read()?.queue.pending().cloned().collect())
    }

    pub fn is_nullifier_spent(&self, nullifier: &Nullifier) -> LedgerResult<bool> {
        Ok(self.read()?.nullifiers.contains(nullifier))
    }

    pub fn outputs_for(&self, recipient: Address) -> LedgerResult<Vec<StealthOutput>> {
        Ok(self
            .read()?
            .outputs
            .values()
            .filter(|o| o.recipient == recipient && !o.claimed)
            .cloned()
            .collect())
    }

    pub fn output(&self, output_id: OutputId) -> LedgerResult<StealthOutput> {
        self.read()?
            .outputs
            .get(&output_id)
            .cloned()
            .ok_or(LedgerError::OutputNotFound(output_id))
    }

    pub fn reserves(&self, token: &TokenType) -> LedgerResult<Amount> {
        Ok(self.read()?.reserve(token))
    }

    pub fn account_balance(&self, who: Address, token: &TokenType) -> LedgerResult<Amount> {
        Ok(self.read()?.account(who, token))
    }

    /// The intent a finalize transaction hash belongs to, if it was applied.
    pub fn transaction(&self, tx_hash: B256) -> LedgerResult<Option<IntentId>> {
        Ok(self.read()?.transactions.get(&tx_hash).copied())
    }
}

#[cfg(test)]
mod tests;
