// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    blockchain::LedgerClient, error::ApiError, ledger::Nullifier,
    models::NullifierStatusResponse, state::AppState,
};

/// Whether a deposit-note nullifier has been consumed by a finalized swap.
#[utoipa::path(
    get,
    path = "/v1/nullifiers/{nullifier}",
    tag = "Nullifiers",
    params(("nullifier" = String, Path, description = "0x-prefixed 32-byte hex")),
    responses(
        (status = 200, description = "Spent status", body = NullifierStatusResponse),
        (status = 400, description = "Malformed nullifier")
    )
)]
pub async fn get_nullifier(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<NullifierStatusResponse>, ApiError> {
    let nullifier: Nullifier = raw
        .parse()
        .map_err(|_| ApiError::bad_request("nullifier must be 32 bytes of hex"))?;
    let is_spent = state
        .processor
        .ledger()
        .is_nullifier_spent(&nullifier)
        .await
        .map_err(|e| ApiError::service_unavailable(e.to_string()))?;

    Ok(Json(NullifierStatusResponse {
        nullifier: nullifier.to_string(),
        is_spent,
    }))
}
