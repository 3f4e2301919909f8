// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    blockchain::{ChainError, LedgerClient},
    error::ApiError,
    ledger::{IntentId, LedgerError},
    models::IntentStatusResponse,
    state::AppState,
};

/// Public status of a swap intent.
#[utoipa::path(
    get,
    path = "/v1/intents/{intent_id}",
    tag = "Intents",
    params(("intent_id" = u64, Path, description = "Queue position of the intent")),
    responses(
        (status = 200, description = "Intent status", body = IntentStatusResponse),
        (status = 404, description = "Intent not found")
    )
)]
pub async fn get_intent(
    State(state): State<AppState>,
    Path(intent_id): Path<u64>,
) -> Result<Json<IntentStatusResponse>, ApiError> {
    let intent = state
        .processor
        .ledger()
        .intent(IntentId(intent_id))
        .await
        .map_err(|e| match e {
            ChainError::Rejected(LedgerError::IntentNotFound(id)) => {
                ApiError::not_found(format!("Intent {id} not found"))
            }
            other => ApiError::service_unavailable(other.to_string()),
        })?;
    Ok(Json(intent.into()))
}
