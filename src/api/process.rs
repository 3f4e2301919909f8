// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TEE processing endpoint.
//!
//! Runs the same pipeline as the poll loop for one intent. The in-flight
//! set keeps the two from working on the same intent at once.

use axum::{extract::State, Json};
use tracing::info;

use crate::{
    blockchain::{ChainError, LedgerClient},
    error::ApiError,
    ledger::LedgerError,
    models::{ProcessIntentRequest, ProcessIntentResponse},
    processor::{IntentOutcome, ProcessError},
    state::AppState,
};

/// Process a queued swap intent now.
///
/// `encrypted_data` and `key_id` must equal the ciphertext and identifier
/// stored on the intent.
#[utoipa::path(
    post,
    path = "/v1/intents/process",
    tag = "Intents",
    request_body = ProcessIntentRequest,
    responses(
        (status = 200, description = "Intent executed or awaiting confirmation", body = ProcessIntentResponse),
        (status = 400, description = "Ciphertext does not match the intent"),
        (status = 404, description = "Intent not found"),
        (status = 409, description = "Intent already being processed"),
        (status = 422, description = "Intent failed or expired")
    )
)]
pub async fn process_intent(
    State(state): State<AppState>,
    Json(request): Json<ProcessIntentRequest>,
) -> Result<Json<ProcessIntentResponse>, ApiError> {
    let intent = state
        .processor
        .ledger()
        .intent(request.intent_id)
        .await
        .map_err(|e| match e {
            ChainError::Rejected(LedgerError::IntentNotFound(id)) => {
                ApiError::not_found(format!("Intent {id} not found"))
            }
            other => ApiError::service_unavailable(other.to_string()),
        })?;

    if intent.payload.to_base64() != request.encrypted_data.trim() {
        return Err(ApiError::bad_request("encrypted_data does not match the intent"));
    }
    let key_id = request.key_id.trim().trim_start_matches("0x").to_ascii_lowercase();
    if intent.payload.id().to_hex() != key_id {
        return Err(ApiError::bad_request("key_id does not match the intent"));
    }

    info!(intent_id = %request.intent_id, "Processing intent on request");
    match state.processor.process_intent(request.intent_id).await {
        IntentOutcome::Executed { tx_hash, .. } => Ok(Json(ProcessIntentResponse {
            executed: true,
            tx_hash: Some(tx_hash.to_string()),
        })),
        IntentOutcome::Unconfirmed { tx_hash } => Ok(Json(ProcessIntentResponse {
            executed: false,
            tx_hash: Some(tx_hash.to_string()),
        })),
        IntentOutcome::Expired => Err(ApiError::unprocessable(ProcessError::DeadlineExpired.to_string())),
        IntentOutcome::Failed(e) => Err(ApiError::unprocessable(e.to_string())),
        IntentOutcome::Untouched(e) => Err(ApiError::conflict(e.to_string())),
    }
}
