// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner-side flows against the ledger and the gateway.
//!
//! The client holds the owner's identity key and the note store. Every
//! hidden amount it sends is sealed by the gateway under the right
//! namespace: the vault for tickets, the stealth address for outputs the
//! TEE writes back.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use tracing::{debug, info};

use super::{DepositNote, StealthKeyRecord};
use crate::blockchain::SignerKeyError;
use crate::crypto::session::sign_prehash;
use crate::crypto::{SessionError, SessionKey, DEFAULT_SESSION_TTL_MIN};
use crate::gateway::{EncryptionGateway, GatewayError, KeyServer};
use crate::ledger::{
    claim_digest, Amount, BalanceLedger, IntentId, LedgerError, Nullifier, SwapPayload, TicketId,
    TokenType, VaultId,
};
use crate::storage::{EncryptedStorage, NoteRepository, StealthKeyRepository, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("note {0} not found")]
    NoteNotFound(Nullifier),

    #[error("note {0} is spent or not yet live")]
    NoteNotLive(Nullifier),

    #[error("note holds {available}, requested {requested}")]
    InsufficientNote { available: Amount, requested: Amount },

    #[error("amount must be positive")]
    InvalidAmount,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Key(#[from] SignerKeyError),
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Parameters of a swap the owner wants to queue.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub note: Nullifier,
    pub input_amount: Amount,
    pub token_out: TokenType,
    pub min_output_amount: Amount,
    pub slippage_bps: u16,
    /// Unix seconds.
    pub deadline: u64,
}

/// What [`OwnerClient::prepare_swap`] queued.
#[derive(Debug, Clone)]
pub struct PreparedSwap {
    pub intent_id: IntentId,
    pub output_stealth: Address,
    pub remainder: Option<DepositNote>,
}

/// One stealth output moved into a vault.
#[derive(Debug, Clone)]
pub struct ClaimedOutput {
    pub stealth: Address,
    pub note: DepositNote,
}

pub struct OwnerClient<K> {
    identity: PrivateKeySigner,
    ledger: Arc<BalanceLedger>,
    gateway: Arc<EncryptionGateway<K>>,
    storage: EncryptedStorage,
}

impl<K: KeyServer> OwnerClient<K> {
    pub fn new(
        identity: PrivateKeySigner,
        ledger: Arc<BalanceLedger>,
        gateway: Arc<EncryptionGateway<K>>,
        storage: EncryptedStorage,
    ) -> Self {
        Self {
            identity,
            ledger,
            gateway,
            storage,
        }
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub fn storage(&self) -> &EncryptedStorage {
        &self.storage
    }

    fn notes(&self) -> NoteRepository<'_> {
        NoteRepository::new(&self.storage, self.address())
    }

    fn stealth_keys(&self) -> StealthKeyRepository<'_> {
        StealthKeyRepository::new(&self.storage, self.address())
    }

    fn session(&self, identity: &PrivateKeySigner) -> WalletResult<SessionKey> {
        Ok(SessionKey::new(
            identity,
            DEFAULT_SESSION_TTL_MIN,
            self.gateway.clock().as_ref(),
        )?)
    }

    pub fn open_vault(&self) -> WalletResult<VaultId> {
        Ok(self.ledger.open_vault(self.address())?)
    }

    /// Lock `amount` of `token` into `vault` and record the deposit note.
    pub fn deposit(&self, vault_id: VaultId, token: &TokenType, amount: Amount) -> WalletResult<DepositNote> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount);
        }
        let nullifier = Nullifier::random();
        let pointer = self.gateway.seal(&amount, vault_id.0)?;
        let ticket_id = self.ledger.deposit(
            self.address(),
            vault_id,
            token,
            amount,
            pointer,
            nullifier.commitment(),
        )?;

        let mut note = DepositNote::new(amount, token.clone(), vault_id, ticket_id);
        note.nullifier = nullifier;
        self.notes().create(&note)?;
        info!(vault_id = %vault_id, ticket_id = %ticket_id, token = %token, "Deposit note recorded");
        Ok(note)
    }

    /// Unspent notes whose parent (if any) has been spent.
    pub fn live_notes(&self) -> WalletResult<Vec<DepositNote>> {
        let all = self.notes().list()?;
        let spent = |n: &Nullifier| all.iter().any(|o| o.nullifier == *n && o.spent);
        Ok(all
            .iter()
            .filter(|note| !note.spent && note.parent.as_ref().is_none_or(|p| spent(p)))
            .cloned()
            .collect())
    }

    fn live_note(&self, nullifier: &Nullifier) -> WalletResult<DepositNote> {
        if !self.notes().exists(nullifier) {
            return Err(WalletError::NoteNotFound(*nullifier));
        }
        self.live_notes()?
            .into_iter()
            .find(|note| note.nullifier == *nullifier)
            .ok_or(WalletError::NoteNotLive(*nullifier))
    }

    /// Decrypt the hidden amount of one of the owner's tickets.
    pub async fn ticket_amount(&self, vault_id: VaultId, ticket_id: TicketId) -> WalletResult<Amount> {
        let ticket = self.ledger.ticket(vault_id, ticket_id)?;
        let session = self.session(&self.identity)?;
        Ok(self.gateway.decrypt(&ticket.pointer, &session).await?)
    }

    /// Queue a swap of part or all of a note.
    ///
    /// A fresh stealth key receives the output. A non-zero remainder stays
    /// on the ticket bound to a fresh note, stored now with `parent` set so
    /// it only becomes live once the swap spends the source note.
    pub fn prepare_swap(&self, request: SwapRequest) -> WalletResult<PreparedSwap> {
        let note = self.live_note(&request.note)?;
        if request.input_amount == 0 {
            return Err(WalletError::InvalidAmount);
        }
        if request.input_amount > note.amount {
            return Err(WalletError::InsufficientNote {
                available: note.amount,
                requested: request.input_amount,
            });
        }

        let stealth = StealthKeyRecord::generate();
        self.stealth_keys().create(&stealth)?;
        let remainder = note.remainder(request.input_amount);
        if let Some(rest) = &remainder {
            self.notes().create(rest)?;
        }

        let payload = SwapPayload {
            nullifier: note.nullifier,
            vault_id: note.vault_id,
            ticket_id: note.ticket_id,
            input_amount: request.input_amount,
            token_in: note.token_type.clone(),
            token_out: request.token_out.clone(),
            min_output_amount: request.min_output_amount,
            slippage_bps: request.slippage_bps,
            output_stealth: stealth.address,
            remainder_stealth: None,
            remainder_commitment: remainder.as_ref().map(|rest| rest.nullifier.commitment()),
        };
        let sealed = self.gateway.seal(&payload, note.vault_id.0)?;
        let intent_id = self.ledger.create_swap_intent(
            sealed,
            note.token_type.clone(),
            request.token_out,
            request.deadline,
        )?;

        info!(
            intent_id = %intent_id,
            vault_id = %note.vault_id,
            ticket_id = %note.ticket_id,
            stealth = %stealth.address,
            "Swap intent prepared"
        );
        Ok(PreparedSwap {
            intent_id,
            output_stealth: stealth.address,
            remainder,
        })
    }

    /// Mark local notes whose nullifier the ledger has consumed. Returns how
    /// many changed.
    pub fn sync_spent(&self) -> WalletResult<usize> {
        let repo = self.notes();
        let mut updated = 0;
        for mut note in repo.list()? {
            if !note.spent && self.ledger.is_nullifier_spent(&note.nullifier)? {
                note.spent = true;
                repo.update(&note)?;
                updated += 1;
            }
        }
        if updated > 0 {
            debug!(owner = %self.address(), updated, "Notes marked spent");
        }
        Ok(updated)
    }

    /// Claim every output addressed to an unclaimed stealth key into `vault_id`.
    pub async fn scan_and_claim(&self, vault_id: VaultId) -> WalletResult<Vec<ClaimedOutput>> {
        let keys = self.stealth_keys();
        let mut claimed = Vec::new();

        for mut record in keys.list()? {
            if record.claimed {
                continue;
            }
            let outputs = self.ledger.outputs_for(record.address)?;
            if outputs.is_empty() {
                continue;
            }
            let stealth_signer = record.signer()?;
            let session = self.session(&stealth_signer)?;

            for output in outputs {
                let amount = self.gateway.decrypt(&output.pointer, &session).await?;
                let nullifier = Nullifier::random();
                let pointer = self.gateway.seal(&amount, vault_id.0)?;
                let signature = sign_prehash(
                    &stealth_signer,
                    &claim_digest(output.output_id, vault_id, self.address()),
                )?;
                let ticket_id = self.ledger.claim_output(
                    self.address(),
                    output.output_id,
                    vault_id,
                    pointer,
                    nullifier.commitment(),
                    &signature,
                )?;

                let mut note = DepositNote::new(amount, output.token_type.clone(), vault_id, ticket_id);
                note.nullifier = nullifier;
                self.notes().create(&note)?;
                info!(
                    output_id = %output.output_id,
                    vault_id = %vault_id,
                    ticket_id = %ticket_id,
                    "Stealth output claimed"
                );
                claimed.push(ClaimedOutput {
                    stealth: record.address,
                    note,
                });
            }

            record.claimed = true;
            keys.update(&record)?;
        }
        Ok(claimed)
    }

    /// Withdraw `amount` of a note to `recipient`. A non-zero remainder
    /// stays on the ticket under a fresh note.
    pub fn unwrap(
        &self,
        nullifier: &Nullifier,
        amount: Amount,
        recipient: Address,
    ) -> WalletResult<Option<DepositNote>> {
        let mut note = self.live_note(nullifier)?;
        if amount == 0 {
            return Err(WalletError::InvalidAmount);
        }
        if amount > note.amount {
            return Err(WalletError::InsufficientNote {
                available: note.amount,
                requested: amount,
            });
        }

        let remainder = note.remainder(amount);
        let sealed = match &remainder {
            Some(rest) => Some((
                self.gateway.seal(&rest.amount, note.vault_id.0)?,
                rest.nullifier.commitment(),
            )),
            None => None,
        };
        self.ledger.unwrap(
            self.address(),
            note.vault_id,
            note.ticket_id,
            amount,
            recipient,
            sealed,
        )?;

        note.spent = true;
        self.notes().update(&note)?;
        if let Some(rest) = &remainder {
            self.notes().create(rest)?;
        }
        info!(vault_id = %note.vault_id, ticket_id = %note.ticket_id, amount, recipient = %recipient, "Note unwrapped");
        Ok(remainder)
    }

    /// Commitment a ticket must carry for `note` to be spendable.
    pub fn commitment_of(note: &DepositNote) -> B256 {
        note.nullifier.commitment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::{ApprovalPolicy, LocalKeyServer};
    use crate::ledger::{AdminCap, TeeAuthority};
    use crate::retry::RetryPolicy;
    use crate::storage::StoragePaths;

    const NOW: u64 = 1_700_000_000;

    struct Env {
        _dir: tempfile::TempDir,
        ledger: Arc<BalanceLedger>,
        _cap: AdminCap,
        client: OwnerClient<LocalKeyServer>,
    }

    fn env() -> Env {
        let clock = Arc::new(ManualClock::at_secs(NOW));
        let (ledger, cap) = BalanceLedger::new(
            TeeAuthority {
                finalizer: Address::repeat_byte(0xf1),
                enclave: Address::repeat_byte(0xe1),
            },
            clock.clone(),
        );
        let ledger = Arc::new(ledger);
        let policy: Arc<dyn ApprovalPolicy> = ledger.clone();
        let servers = (1..=3)
            .map(|i| LocalKeyServer::random(format!("ks-{i}"), policy.clone(), clock.clone()))
            .collect();
        let gateway = Arc::new(
            EncryptionGateway::new(servers, 2, clock)
                .unwrap()
                .with_retry(RetryPolicy::none()),
        );

        let identity = PrivateKeySigner::random();
        ledger
            .credit_account(&cap, identity.address(), &TokenType::new("A"), 1_000)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().unwrap();

        Env {
            _dir: dir,
            ledger: ledger.clone(),
            _cap: cap,
            client: OwnerClient::new(identity, ledger, gateway, storage),
        }
    }

    #[tokio::test]
    async fn deposit_records_note_bound_to_ticket() {
        let env = env();
        let vault = env.client.open_vault().unwrap();
        let note = env.client.deposit(vault, &"A".into(), 600).unwrap();

        let ticket = env.ledger.ticket(vault, note.ticket_id).unwrap();
        assert_eq!(ticket.nullifier_commitment, OwnerClient::<LocalKeyServer>::commitment_of(&note));
        assert_eq!(env.client.ticket_amount(vault, note.ticket_id).await.unwrap(), 600);
        assert_eq!(env.client.live_notes().unwrap(), vec![note]);
    }

    #[test]
    fn prepare_swap_stores_pending_remainder() {
        let env = env();
        let vault = env.client.open_vault().unwrap();
        let note = env.client.deposit(vault, &"A".into(), 600).unwrap();

        let prepared = env
            .client
            .prepare_swap(SwapRequest {
                note: note.nullifier,
                input_amount: 200,
                token_out: "B".into(),
                min_output_amount: 0,
                slippage_bps: 100,
                deadline: NOW + 3600,
            })
            .unwrap();

        let rest = prepared.remainder.unwrap();
        assert_eq!(rest.amount, 400);
        assert_eq!(env.ledger.pending_intents().unwrap().len(), 1);
        // The remainder is not live until the source note is spent.
        let live = env.client.live_notes().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].nullifier, note.nullifier);

        assert!(matches!(
            env.client.prepare_swap(SwapRequest {
                note: note.nullifier,
                input_amount: 601,
                token_out: "B".into(),
                min_output_amount: 0,
                slippage_bps: 100,
                deadline: NOW + 3600,
            }),
            Err(WalletError::InsufficientNote { .. })
        ));
    }

    #[test]
    fn unwrap_splits_note() {
        let env = env();
        let vault = env.client.open_vault().unwrap();
        let note = env.client.deposit(vault, &"A".into(), 600).unwrap();
        let recipient = Address::repeat_byte(0x77);

        let rest = env.client.unwrap(&note.nullifier, 250, recipient).unwrap().unwrap();
        assert_eq!(rest.amount, 350);
        assert_eq!(env.ledger.account_balance(recipient, &"A".into()).unwrap(), 250);
        assert_eq!(env.client.live_notes().unwrap(), vec![rest.clone()]);

        assert!(env.client.unwrap(&rest.nullifier, 350, recipient).unwrap().is_none());
        assert!(env.client.live_notes().unwrap().is_empty());
        assert!(matches!(
            env.client.unwrap(&rest.nullifier, 1, recipient),
            Err(WalletError::NoteNotLive(_))
        ));
    }
}
