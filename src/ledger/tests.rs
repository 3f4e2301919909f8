// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;

use super::*;
use crate::clock::ManualClock;
use crate::crypto::session::sign_prehash;
use crate::crypto::SessionKey;
use crate::gateway::{ApprovalPolicy, EncryptionGateway, LocalKeyServer};
use crate::retry::RetryPolicy;

const NOW: u64 = 1_700_000_000;

struct Fixture {
    ledger: Arc<BalanceLedger>,
    cap: AdminCap,
    gateway: EncryptionGateway<LocalKeyServer>,
    clock: Arc<ManualClock>,
    owner: PrivateKeySigner,
    finalizer: PrivateKeySigner,
    enclave: PrivateKeySigner,
}

fn a() -> TokenType {
    TokenType::new("A")
}

fn b() -> TokenType {
    TokenType::new("B")
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::at_secs(NOW));
    let owner = PrivateKeySigner::random();
    let finalizer = PrivateKeySigner::random();
    let enclave = PrivateKeySigner::random();
    let (ledger, cap) = BalanceLedger::new(
        TeeAuthority {
            finalizer: finalizer.address(),
            enclave: enclave.address(),
        },
        clock.clone(),
    );
    let ledger = Arc::new(ledger);
    let policy: Arc<dyn ApprovalPolicy> = ledger.clone();
    let servers = (1..=3)
        .map(|i| LocalKeyServer::random(format!("ks-{i}"), policy.clone(), clock.clone()))
        .collect();
    let gateway = EncryptionGateway::new(servers, 2, clock.clone())
        .unwrap()
        .with_retry(RetryPolicy::none());

    ledger
        .credit_account(&cap, owner.address(), &a(), 2_000_000_000)
        .unwrap();
    ledger
        .credit_account(&cap, finalizer.address(), &b(), 1_000_000_000)
        .unwrap();

    Fixture {
        ledger,
        cap,
        gateway,
        clock,
        owner,
        finalizer,
        enclave,
    }
}

struct Deposited {
    vault: VaultId,
    ticket: TicketId,
    nullifier: Nullifier,
}

fn deposit(f: &Fixture, amount: Amount) -> Deposited {
    let vault = f.ledger.open_vault(f.owner.address()).unwrap();
    let nullifier = Nullifier::random();
    let pointer = f.gateway.seal(&amount, vault.0).unwrap();
    let ticket = f
        .ledger
        .deposit(f.owner.address(), vault, &a(), amount, pointer, nullifier.commitment())
        .unwrap();
    Deposited {
        vault,
        ticket,
        nullifier,
    }
}

fn queue_intent(f: &Fixture, d: &Deposited, deadline: u64) -> IntentId {
    let payload = SwapPayload {
        nullifier: d.nullifier,
        vault_id: d.vault,
        ticket_id: d.ticket,
        input_amount: 500_000_000,
        token_in: a(),
        token_out: b(),
        min_output_amount: 0,
        slippage_bps: 500,
        output_stealth: Address::repeat_byte(0x51),
        remainder_stealth: None,
        remainder_commitment: None,
    };
    let sealed = f.gateway.seal(&payload, d.vault.0).unwrap();
    f.ledger.create_swap_intent(sealed, a(), b(), deadline).unwrap()
}

fn finalize_tx(f: &Fixture, d: &Deposited, intent_id: IntentId, nullifier: Nullifier) -> FinalizeSwap {
    let stealth = Address::repeat_byte(0x51);
    let remainder_note = Nullifier::random();
    FinalizeSwap {
        intent_id,
        nullifier,
        vault_id: d.vault,
        ticket_id: d.ticket,
        from_amount: 500_000_000,
        to_amount: 480_000_000,
        remainder: Remainder::InPlace {
            pointer: f.gateway.seal(&500_000_000u64, d.vault.0).unwrap(),
            commitment: remainder_note.commitment(),
        },
        output_pointer: f
            .gateway
            .seal(&480_000_000u64, address_namespace(stealth))
            .unwrap(),
        output_recipient: stealth,
    }
}

fn sign(signer: &PrivateKeySigner, tx: FinalizeSwap) -> SignedFinalize {
    let signature = sign_prehash(signer, &tx.digest()).unwrap();
    SignedFinalize { tx, signature }
}

fn total(f: &Fixture, token: &TokenType, holders: &[Address]) -> Amount {
    let accounts: Amount = holders
        .iter()
        .map(|h| f.ledger.account_balance(*h, token).unwrap())
        .sum();
    accounts + f.ledger.reserves(token).unwrap()
}

#[tokio::test]
async fn deposit_swap_and_pointer_update() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    assert_eq!(f.ledger.reserves(&a()).unwrap(), 1_000_000_000);

    let intent = queue_intent(&f, &d, NOW + 600);
    let claimed = f.ledger.claim_intent(f.enclave.address(), intent).unwrap();
    assert_eq!(claimed.state, IntentState::Processing);

    let old_pointer = f.ledger.ticket(d.vault, d.ticket).unwrap().pointer.id();
    let tx = finalize_tx(&f, &d, intent, d.nullifier);
    let new_pointer = match &tx.remainder {
        Remainder::InPlace { pointer, .. } => pointer.clone(),
        _ => unreachable!(),
    };
    let receipt = f.ledger.finalize_swap(&sign(&f.finalizer, tx)).unwrap();

    assert_eq!(f.ledger.reserves(&a()).unwrap(), 500_000_000);
    assert_eq!(f.ledger.reserves(&b()).unwrap(), 480_000_000);
    assert!(f.ledger.is_nullifier_spent(&d.nullifier).unwrap());

    let intent = f.ledger.intent(intent).unwrap();
    assert_eq!(intent.state, IntentState::Executed);
    assert_eq!(intent.tx_hash, Some(receipt.tx_hash));
    assert_eq!(f.ledger.transaction(receipt.tx_hash).unwrap(), Some(intent.intent_id));

    // The ticket now carries the remainder pointer, readable by the owner.
    let ticket = f.ledger.ticket(d.vault, d.ticket).unwrap();
    assert_eq!(ticket.pointer, new_pointer);
    let session = SessionKey::new(&f.owner, 10, f.clock.as_ref()).unwrap();
    assert_eq!(f.gateway.decrypt(&ticket.pointer, &session).await.unwrap(), 500_000_000);

    let outputs = f.ledger.outputs_for(Address::repeat_byte(0x51)).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].token_type, b());

    // The replaced pointer is retired: the enclave can no longer obtain its shares.
    assert!(f.ledger.check_approval(&old_pointer, f.enclave.address()).is_err());
    assert!(f.ledger.check_approval(&old_pointer, f.owner.address()).is_ok());
    assert!(f.ledger.check_approval(&new_pointer.id(), f.enclave.address()).is_ok());
}

#[test]
fn finalize_is_idempotent() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();

    let signed = sign(&f.finalizer, finalize_tx(&f, &d, intent, d.nullifier));
    f.ledger.finalize_swap(&signed).unwrap();
    let reserves_a = f.ledger.reserves(&a()).unwrap();
    let reserves_b = f.ledger.reserves(&b()).unwrap();

    assert_eq!(
        f.ledger.finalize_swap(&signed),
        Err(LedgerError::AlreadyFinalized(intent))
    );
    assert_eq!(f.ledger.reserves(&a()).unwrap(), reserves_a);
    assert_eq!(f.ledger.reserves(&b()).unwrap(), reserves_b);
    assert_eq!(f.ledger.outputs_for(Address::repeat_byte(0x51)).unwrap().len(), 1);
}

#[test]
fn second_finalize_with_different_arguments_changes_nothing() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();

    let receipt = f
        .ledger
        .finalize_swap(&sign(&f.finalizer, finalize_tx(&f, &d, intent, d.nullifier)))
        .unwrap();
    let reserves_a = f.ledger.reserves(&a()).unwrap();
    let reserves_b = f.ledger.reserves(&b()).unwrap();
    let finalizer_b = f.ledger.account_balance(f.finalizer.address(), &b()).unwrap();
    let ticket_pointer = f.ledger.ticket(d.vault, d.ticket).unwrap().pointer;

    let mut other = finalize_tx(&f, &d, intent, d.nullifier);
    other.from_amount = 250_000_000;
    other.to_amount = 240_000_000;
    other.output_recipient = Address::repeat_byte(0x52);
    other.output_pointer = f
        .gateway
        .seal(&240_000_000u64, address_namespace(Address::repeat_byte(0x52)))
        .unwrap();
    assert_eq!(
        f.ledger.finalize_swap(&sign(&f.finalizer, other)),
        Err(LedgerError::AlreadyFinalized(intent))
    );

    assert_eq!(f.ledger.reserves(&a()).unwrap(), reserves_a);
    assert_eq!(f.ledger.reserves(&b()).unwrap(), reserves_b);
    assert_eq!(
        f.ledger.account_balance(f.finalizer.address(), &b()).unwrap(),
        finalizer_b
    );
    assert_eq!(f.ledger.ticket(d.vault, d.ticket).unwrap().pointer, ticket_pointer);
    assert!(f.ledger.outputs_for(Address::repeat_byte(0x52)).unwrap().is_empty());
    assert_eq!(f.ledger.intent(intent).unwrap().tx_hash, Some(receipt.tx_hash));
}

#[test]
fn unwrap_beyond_reserves_leaves_ticket_intact() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let before = f.ledger.ticket(d.vault, d.ticket).unwrap();
    let recipient = Address::repeat_byte(0x77);

    assert_eq!(
        f.ledger
            .unwrap(f.owner.address(), d.vault, d.ticket, 1_500_000_000, recipient, None),
        Err(LedgerError::InsufficientReserves {
            token: a(),
            needed: 1_500_000_000,
            available: 1_000_000_000,
        })
    );

    let after = f.ledger.ticket(d.vault, d.ticket).unwrap();
    assert_eq!(after.pointer, before.pointer);
    assert_eq!(after.nullifier_commitment, before.nullifier_commitment);
    assert_eq!(f.ledger.reserves(&a()).unwrap(), 1_000_000_000);
    assert_eq!(f.ledger.account_balance(recipient, &a()).unwrap(), 0);
    assert!(f
        .ledger
        .check_approval(&before.pointer.id(), f.enclave.address())
        .is_ok());
}

#[test]
fn reused_nullifier_is_rejected() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let first = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), first).unwrap();
    f.ledger
        .finalize_swap(&sign(&f.finalizer, finalize_tx(&f, &d, first, d.nullifier)))
        .unwrap();

    let second = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), second).unwrap();
    let before = f.ledger.reserves(&a()).unwrap();
    assert_eq!(
        f.ledger
            .finalize_swap(&sign(&f.finalizer, finalize_tx(&f, &d, second, d.nullifier))),
        Err(LedgerError::NullifierReplay)
    );
    assert_eq!(f.ledger.reserves(&a()).unwrap(), before);
    assert_eq!(f.ledger.intent(second).unwrap().state, IntentState::Processing);
}

#[test]
fn nullifier_must_match_ticket_commitment() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();

    let forged = sign(&f.finalizer, finalize_tx(&f, &d, intent, Nullifier::random()));
    assert_eq!(f.ledger.finalize_swap(&forged), Err(LedgerError::NullifierMismatch));
}

#[test]
fn only_finalizer_signature_is_accepted() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();

    let tx = finalize_tx(&f, &d, intent, d.nullifier);
    for impostor in [&f.enclave, &f.owner] {
        assert!(matches!(
            f.ledger.finalize_swap(&sign(impostor, tx.clone())),
            Err(LedgerError::UnauthorizedAuthority(_))
        ));
    }
    assert!(matches!(
        f.ledger.claim_intent(f.owner.address(), intent),
        Err(LedgerError::UnauthorizedAuthority(_))
    ));
}

#[test]
fn past_deadline_intent_expires() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW - 1);

    assert_eq!(
        f.ledger.claim_intent(f.enclave.address(), intent),
        Err(LedgerError::DeadlineExpired(intent))
    );
    f.ledger.expire_intent(f.enclave.address(), intent).unwrap();
    assert_eq!(f.ledger.intent(intent).unwrap().state, IntentState::Expired);
    assert!(!f.ledger.is_nullifier_spent(&d.nullifier).unwrap());

    let live = queue_intent(&f, &d, NOW + 10);
    assert_eq!(
        f.ledger.expire_intent(f.enclave.address(), live),
        Err(LedgerError::DeadlineNotReached(live))
    );
}

#[test]
fn finalize_after_deadline_is_rejected() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 5);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();
    f.clock.advance_secs(6);

    let signed = sign(&f.finalizer, finalize_tx(&f, &d, intent, d.nullifier));
    assert_eq!(f.ledger.finalize_swap(&signed), Err(LedgerError::DeadlineExpired(intent)));
}

#[test]
fn conservation_across_deposit_swap_and_unwrap() {
    let f = fixture();
    let holders = [f.owner.address(), f.finalizer.address(), Address::repeat_byte(0x77)];
    let start_a = total(&f, &a(), &holders);
    let start_b = total(&f, &b(), &holders);

    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();
    f.ledger
        .finalize_swap(&sign(&f.finalizer, finalize_tx(&f, &d, intent, d.nullifier)))
        .unwrap();
    f.ledger
        .unwrap(
            f.owner.address(),
            d.vault,
            d.ticket,
            500_000_000,
            Address::repeat_byte(0x77),
            None,
        )
        .unwrap();

    assert_eq!(total(&f, &a(), &holders), start_a);
    assert_eq!(total(&f, &b(), &holders), start_b);
    assert_eq!(f.ledger.reserves(&a()).unwrap(), 0);
    assert_eq!(
        f.ledger.account_balance(Address::repeat_byte(0x77), &a()).unwrap(),
        500_000_000
    );
    assert!(matches!(
        f.ledger.ticket(d.vault, d.ticket),
        Err(LedgerError::TicketNotFound { .. })
    ));
}

#[test]
fn deposit_rules() {
    let f = fixture();
    let vault = f.ledger.open_vault(f.owner.address()).unwrap();
    let pointer = f.gateway.seal(&10u64, vault.0).unwrap();
    let commitment = Nullifier::random().commitment();

    assert!(matches!(
        f.ledger
            .deposit(Address::repeat_byte(9), vault, &a(), 10, pointer.clone(), commitment),
        Err(LedgerError::NotVaultOwner(_))
    ));
    assert_eq!(
        f.ledger
            .deposit(f.owner.address(), vault, &a(), 0, pointer.clone(), commitment),
        Err(LedgerError::InvalidAmount)
    );
    let foreign = f.gateway.seal(&10u64, B256::repeat_byte(1)).unwrap();
    assert!(matches!(
        f.ledger.deposit(f.owner.address(), vault, &a(), 10, foreign, commitment),
        Err(LedgerError::NamespaceMismatch { .. })
    ));
    assert!(matches!(
        f.ledger
            .deposit(f.owner.address(), vault, &a(), 5_000_000_000, pointer, commitment),
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(f.ledger.reserves(&a()).unwrap(), 0);
}

#[test]
fn pause_blocks_mutations_and_requires_cap() {
    let f = fixture();
    let d = deposit(&f, 1_000_000);
    f.ledger.pause(&f.cap).unwrap();
    assert!(f.ledger.is_paused().unwrap());

    assert_eq!(f.ledger.open_vault(f.owner.address()), Err(LedgerError::Paused));
    assert_eq!(
        f.ledger
            .unwrap(f.owner.address(), d.vault, d.ticket, 1, f.owner.address(), None),
        Err(LedgerError::Paused)
    );
    // Queries still work.
    assert_eq!(f.ledger.reserves(&a()).unwrap(), 1_000_000);

    let (_other, foreign_cap) = BalanceLedger::new(f.ledger.authority().unwrap(), f.clock.clone());
    assert_eq!(f.ledger.unpause(&foreign_cap), Err(LedgerError::InvalidCapability));
    f.ledger.unpause(&f.cap).unwrap();
    assert!(f.ledger.open_vault(f.owner.address()).is_ok());
}

#[test]
fn update_authority_rotates_finalizer() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();

    let rotated = PrivateKeySigner::random();
    f.ledger
        .update_authority(
            &f.cap,
            TeeAuthority {
                finalizer: rotated.address(),
                enclave: f.enclave.address(),
            },
        )
        .unwrap();
    f.ledger
        .credit_account(&f.cap, rotated.address(), &b(), 480_000_000)
        .unwrap();

    let tx = finalize_tx(&f, &d, intent, d.nullifier);
    assert!(matches!(
        f.ledger.finalize_swap(&sign(&f.finalizer, tx.clone())),
        Err(LedgerError::UnauthorizedAuthority(_))
    ));
    assert!(f.ledger.finalize_swap(&sign(&rotated, tx)).is_ok());
}

#[tokio::test]
async fn stealth_output_is_claimed_into_a_vault() {
    let f = fixture();
    let d = deposit(&f, 1_000_000_000);
    let intent = queue_intent(&f, &d, NOW + 600);
    f.ledger.claim_intent(f.enclave.address(), intent).unwrap();

    let stealth = PrivateKeySigner::random();
    let mut tx = finalize_tx(&f, &d, intent, d.nullifier);
    tx.output_recipient = stealth.address();
    tx.output_pointer = f
        .gateway
        .seal(&480_000_000u64, address_namespace(stealth.address()))
        .unwrap();
    let receipt = f.ledger.finalize_swap(&sign(&f.finalizer, tx)).unwrap();

    let output = f.ledger.output(receipt.output_id).unwrap();
    let session = SessionKey::new(&stealth, 10, f.clock.as_ref()).unwrap();
    let amount = f.gateway.decrypt(&output.pointer, &session).await.unwrap();
    assert_eq!(amount, 480_000_000);

    let reencrypted = f.gateway.seal(&amount, d.vault.0).unwrap();
    let note = Nullifier::random();
    let digest = claim_digest(receipt.output_id, d.vault, f.owner.address());

    let wrong_key = sign_prehash(&f.owner, &digest).unwrap();
    assert!(matches!(
        f.ledger.claim_output(
            f.owner.address(),
            receipt.output_id,
            d.vault,
            reencrypted.clone(),
            note.commitment(),
            &wrong_key,
        ),
        Err(LedgerError::InvalidSignature(_))
    ));

    let signature = sign_prehash(&stealth, &digest).unwrap();
    let ticket = f
        .ledger
        .claim_output(
            f.owner.address(),
            receipt.output_id,
            d.vault,
            reencrypted,
            note.commitment(),
            &signature,
        )
        .unwrap();
    assert_eq!(f.ledger.ticket(d.vault, ticket).unwrap().token_type, b());
    assert!(f.ledger.outputs_for(stealth.address()).unwrap().is_empty());
    assert_eq!(f.ledger.reserves(&b()).unwrap(), 480_000_000);
    assert!(matches!(
        f.ledger.claim_output(
            f.owner.address(),
            receipt.output_id,
            d.vault,
            f.gateway.seal(&amount, d.vault.0).unwrap(),
            note.commitment(),
            &signature,
        ),
        Err(LedgerError::OutputAlreadyClaimed(_))
    ));
}
