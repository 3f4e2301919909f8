// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP side of the signing delegate, served by the `tx-signer` binary.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{SignRequest, SignResponse};
use crate::crypto::session::sign_prehash;
use crate::error::ApiError;
use crate::ledger::FinalizeSwap;

pub struct SignerService {
    signer: PrivateKeySigner,
    /// `None` serves any caller.
    allowed_callers: Option<HashSet<Address>>,
}

impl SignerService {
    pub fn new(signer: PrivateKeySigner, allowed_callers: Option<HashSet<Address>>) -> Self {
        Self {
            signer,
            allowed_callers,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn is_allowed(&self, caller: Address) -> bool {
        self.allowed_callers
            .as_ref()
            .map(|allowed| allowed.contains(&caller))
            .unwrap_or(true)
    }
}

pub fn router(service: Arc<SignerService>) -> Router {
    Router::new()
        .route("/sign", post(sign))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn health() -> &'static str {
    "OK"
}

async fn sign(
    State(service): State<Arc<SignerService>>,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    if !service.is_allowed(request.caller) {
        warn!(caller = %request.caller, "Signing request from unlisted caller");
        return Err(ApiError::forbidden("caller not allowed"));
    }

    let bytes = STANDARD
        .decode(request.payload_b64.trim())
        .map_err(|e| ApiError::bad_request(format!("payload_b64: {e}")))?;
    // Only finalize transactions are ever signed.
    let tx = FinalizeSwap::decode(&bytes)
        .map_err(|e| ApiError::bad_request(format!("not a finalize transaction: {e}")))?;

    let signature = sign_prehash(&service.signer, &tx.digest())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    info!(caller = %request.caller, intent_id = %tx.intent_id, "Finalize transaction signed");
    Ok(Json(SignResponse {
        signature,
        signer: service.address(),
    }))
}
