// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing delegate process. Holds the finalizer key and signs ledger
//! finalizations for the processor over loopback HTTP.

use std::process;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sealed_swap_server::{
    blockchain::signing::load_signer,
    config::{LogFormat, SignerServiceConfig},
    signer::{service_router, SignerService},
};

#[tokio::main]
async fn main() {
    let config = SignerServiceConfig::from_env();
    let format = config.as_ref().map(|c| c.log_format).unwrap_or(LogFormat::Pretty);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }

    let config = config.unwrap_or_else(|e| {
        error!(error = %e, "Invalid configuration");
        process::exit(1);
    });

    let signer = load_signer(config.key_path.as_deref(), config.private_key.as_deref())
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to load finalizer key");
            process::exit(1);
        });

    let allowed = config
        .allowed_callers
        .map(|callers| callers.into_iter().collect());
    let service = Arc::new(SignerService::new(signer, allowed));
    let finalizer = service.address();

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, addr = %config.bind, "Failed to bind");
            process::exit(1);
        });
    info!(addr = %config.bind, finalizer = %finalizer, "Signing delegate listening");

    if let Err(e) = axum::serve(listener, service_router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
    {
        error!(error = %e, "Signing delegate failed");
        process::exit(1);
    }
}
