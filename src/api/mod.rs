// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    ledger::IntentState,
    models::{
        IntentStatusResponse, NullifierStatusResponse, ProcessIntentRequest,
        ProcessIntentResponse,
    },
    state::AppState,
};

pub mod health;
pub mod intents;
pub mod nullifiers;
pub mod process;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/intents/process", post(process::process_intent))
        .route("/intents/{intent_id}", get(intents::get_intent))
        .route("/nullifiers/{nullifier}", get(nullifiers::get_nullifier));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        process::process_intent,
        intents::get_intent,
        nullifiers::get_nullifier
    ),
    components(
        schemas(
            ProcessIntentRequest,
            ProcessIntentResponse,
            IntentStatusResponse,
            NullifierStatusResponse,
            IntentState,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Intents", description = "Swap intent processing and status"),
        (name = "Nullifiers", description = "Deposit-note spend status")
    )
)]
struct ApiDoc;
