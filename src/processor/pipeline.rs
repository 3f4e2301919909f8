// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use tracing::{debug, info};

use super::{IntentProcessor, ProcessError};
use crate::blockchain::{ChainError, LedgerClient};
use crate::crypto::{address_namespace, SessionKey, DEFAULT_SESSION_TTL_MIN};
use crate::gateway::{KeyServer, GatewayError};
use crate::ledger::{FinalizeSwap, LedgerError, Remainder, SignedFinalize, SwapIntent, SwapPayload};
use crate::signer::SigningDelegate;
use crate::venue::{minimum_output, SwapVenue, VenueError};

impl<L, K, V, S> IntentProcessor<L, K, V, S>
where
    L: LedgerClient,
    K: KeyServer,
    V: SwapVenue,
    S: SigningDelegate,
{
    /// Everything between claim and submission. Nothing here mutates the
    /// ledger; the venue trade is the only external side effect.
    pub(super) async fn prepare(&self, intent: &SwapIntent) -> Result<SignedFinalize, ProcessError> {
        let intent_id = intent.intent_id;
        let session = SessionKey::new(
            &self.enclave,
            DEFAULT_SESSION_TTL_MIN,
            self.gateway.clock().as_ref(),
        )
        .map_err(GatewayError::from)?;

        let payload: SwapPayload = self.gateway.decrypt(&intent.payload, &session).await?;
        check_payload(intent, &payload)?;

        if self.ledger.is_nullifier_spent(&payload.nullifier).await? {
            return Err(ProcessError::NullifierReplay);
        }

        let ticket = match self.ledger.ticket(payload.vault_id, payload.ticket_id).await {
            Ok(ticket) => ticket,
            Err(ChainError::Rejected(e @ (LedgerError::TicketNotFound { .. } | LedgerError::VaultNotFound(_)))) => {
                return Err(ProcessError::InvalidPayload(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if ticket.token_type != payload.token_in {
            return Err(ProcessError::InvalidPayload(format!(
                "ticket holds {}, payload sells {}",
                ticket.token_type, payload.token_in
            )));
        }
        if ticket.nullifier_commitment != payload.nullifier.commitment() {
            return Err(ProcessError::InvalidPayload(
                "nullifier does not open the ticket".to_string(),
            ));
        }

        let balance: u64 = self.gateway.decrypt(&ticket.pointer, &session).await?;
        if payload.input_amount == 0 || payload.input_amount > balance {
            return Err(ProcessError::InvalidPayload(format!(
                "input {} outside ticket balance",
                payload.input_amount
            )));
        }
        let remainder_amount = balance - payload.input_amount;
        if remainder_amount > 0
            && payload.remainder_stealth.is_none()
            && payload.remainder_commitment.is_none()
        {
            return Err(ProcessError::InvalidPayload(
                "remainder has no destination".to_string(),
            ));
        }

        let quote = self
            .venue_retry
            .run(
                "venue_quote",
                || async {
                    tokio::time::timeout(
                        self.venue_timeout,
                        self.venue
                            .quote(&payload.token_in, &payload.token_out, payload.input_amount),
                    )
                    .await
                    .unwrap_or(Err(VenueError::Timeout))
                },
                VenueError::is_transient,
            )
            .await?;
        let min_out = payload
            .min_output_amount
            .max(minimum_output(quote.expected_out, payload.slippage_bps));
        debug!(
            intent_id = %intent_id,
            expected_out = quote.expected_out,
            min_out,
            "Venue quote"
        );

        // A timed-out execution may have traded, so only a refusal is retried.
        let execution = self
            .venue_retry
            .run(
                "venue_execute",
                || async {
                    tokio::time::timeout(
                        self.venue_timeout,
                        self.venue.build_and_submit_swap(
                            &payload.token_in,
                            &payload.token_out,
                            payload.input_amount,
                            min_out,
                        ),
                    )
                    .await
                    .unwrap_or(Err(VenueError::Timeout))
                },
                |e| matches!(e, VenueError::Unavailable(_)),
            )
            .await?;
        if execution.amount_out < min_out {
            return Err(ProcessError::SlippageExceeded {
                minimum: min_out,
                actual: execution.amount_out,
            });
        }
        info!(
            intent_id = %intent_id,
            venue_tx = %execution.venue_tx,
            amount_out = execution.amount_out,
            "Venue swap executed"
        );

        let remainder = if remainder_amount == 0 {
            Remainder::None
        } else if let Some(recipient) = payload.remainder_stealth {
            Remainder::Stealth {
                recipient,
                pointer: self.gateway.seal(&remainder_amount, address_namespace(recipient))?,
            }
        } else if let Some(commitment) = payload.remainder_commitment {
            Remainder::InPlace {
                pointer: self.gateway.seal(&remainder_amount, payload.vault_id.0)?,
                commitment,
            }
        } else {
            return Err(ProcessError::InvalidPayload(
                "remainder has no destination".to_string(),
            ));
        };
        let output_pointer = self
            .gateway
            .seal(&execution.amount_out, address_namespace(payload.output_stealth))?;

        let tx = FinalizeSwap {
            intent_id,
            nullifier: payload.nullifier,
            vault_id: payload.vault_id,
            ticket_id: payload.ticket_id,
            from_amount: payload.input_amount,
            to_amount: execution.amount_out,
            remainder,
            output_pointer,
            output_recipient: payload.output_stealth,
        };
        Ok(self.signer.sign_finalize(&tx).await?)
    }
}

/// The decrypted payload must agree with the public intent fields and be
/// bound to the vault whose namespace sealed it.
fn check_payload(intent: &SwapIntent, payload: &SwapPayload) -> Result<(), ProcessError> {
    if payload.token_in != intent.token_in || payload.token_out != intent.token_out {
        return Err(ProcessError::InvalidPayload(
            "payload tokens differ from the intent".to_string(),
        ));
    }
    if intent.payload.namespace() != payload.vault_id.0 {
        return Err(ProcessError::InvalidPayload(
            "payload sealed outside its vault namespace".to_string(),
        ));
    }
    if payload.remainder_stealth.is_some() && payload.remainder_commitment.is_some() {
        return Err(ProcessError::InvalidPayload(
            "remainder has two destinations".to_string(),
        ));
    }
    Ok(())
}
