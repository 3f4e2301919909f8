// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sealed_swap_server::{
    api::router,
    blockchain::{signing::signer_from_hex, LocalLedgerClient},
    clock::{Clock, SystemClock},
    config::{LogFormat, ServerConfig, SignerTarget},
    gateway::{ApprovalPolicy, Custodian, EncryptionGateway, HttpKeyServer, LocalKeyServer},
    ledger::{BalanceLedger, TeeAuthority},
    processor::IntentProcessor,
    signer::{Delegate, HttpSigningDelegate, LocalSigningDelegate},
    state::AppState,
    storage::{EncryptedStorage, StoragePaths, SubmissionJournal},
    venue::SimulatedVenue,
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn fatal(context: &str, err: impl std::fmt::Display) -> ! {
    error!(error = %err, "{context}");
    process::exit(1)
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            fatal("Invalid configuration", e)
        }
    };
    init_tracing(config.log_format);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let enclave = match &config.enclave_key_hex {
        Some(hex) => signer_from_hex(hex).unwrap_or_else(|e| fatal("Invalid enclave key", e)),
        None => {
            warn!("ENCLAVE_KEY_HEX not set, generating an ephemeral enclave identity");
            PrivateKeySigner::random()
        }
    };

    // Delegate first: the ledger's authority needs the finalizer address.
    let (delegate, finalizer) = match &config.signer {
        SignerTarget::Remote { url, finalizer } => {
            let delegate =
                HttpSigningDelegate::new(url.as_str(), enclave.address(), config.signer_timeout)
                    .unwrap_or_else(|e| fatal("Signing delegate rejected", e));
            (Delegate::Http(delegate), *finalizer)
        }
        SignerTarget::InProcess => {
            warn!("SIGNER_URL not set, holding the finalizer key in-process (development only)");
            let delegate = LocalSigningDelegate::new(PrivateKeySigner::random());
            let address = delegate.address();
            (Delegate::Local(delegate), address)
        }
    };

    let (ledger, cap) = BalanceLedger::new(
        TeeAuthority {
            finalizer,
            enclave: enclave.address(),
        },
        clock.clone(),
    );
    let ledger = Arc::new(ledger);
    for (token, amount) in &config.finalizer_liquidity {
        if let Err(e) = ledger.credit_account(&cap, finalizer, token, *amount) {
            fatal("Could not fund finalizer", e);
        }
    }

    let custodians: Vec<Custodian> = if config.key_servers.is_empty() {
        warn!("KEY_SERVER_URLS not set, running three in-process custodians (development only)");
        let policy: Arc<dyn ApprovalPolicy> = ledger.clone();
        (1..=3)
            .map(|i| {
                Custodian::Local(LocalKeyServer::random(
                    format!("dev-custodian-{i}"),
                    policy.clone(),
                    clock.clone(),
                ))
            })
            .collect()
    } else {
        config
            .key_servers
            .iter()
            .enumerate()
            .map(|(i, endpoint)| {
                HttpKeyServer::new(
                    format!("custodian-{}", i + 1),
                    endpoint.url.as_str(),
                    endpoint.public_key,
                    config.key_server_timeout,
                )
                .map(Custodian::Remote)
                .unwrap_or_else(|e| fatal("Key server client failed", e))
            })
            .collect()
    };
    let gateway = EncryptionGateway::new(custodians, config.threshold, clock.clone())
        .unwrap_or_else(|e| fatal("Encryption gateway rejected", e))
        .with_fetch_timeout(config.key_server_timeout);

    let venue = match &config.venue_rates {
        Some(rates) => SimulatedVenue::new(rates.clone()),
        None => SimulatedVenue::with_default_rates(),
    };

    let paths = StoragePaths::new(&config.data_dir);
    let mut storage = EncryptedStorage::new(paths.clone());
    if let Err(e) = storage.initialize() {
        fatal("Encrypted storage unavailable", e);
    }
    let storage = Arc::new(storage);
    let journal = SubmissionJournal::open(&paths.journal_db())
        .unwrap_or_else(|e| fatal("Submission journal unavailable", e));

    let processor = Arc::new(
        IntentProcessor::new(
            LocalLedgerClient::new(ledger.clone(), enclave.address()),
            Arc::new(gateway),
            venue,
            delegate,
            enclave,
            journal,
        )
        .with_poll_interval(config.poll_interval)
        .with_venue_timeout(config.venue_timeout)
        .with_audit(storage.clone()),
    );

    let shutdown = CancellationToken::new();
    let poller = tokio::spawn(processor.clone().run(shutdown.clone()));

    let app = router(AppState::new(processor).with_storage(storage));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .unwrap_or_else(|e| fatal("Failed to bind", e));

    info!(
        addr = %config.bind,
        finalizer = %finalizer,
        threshold = config.threshold,
        "Sealed swap processor listening (docs at /docs)"
    );

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await;

    shutdown.cancel();
    if let Err(e) = poller.await {
        error!(error = %e, "Intent processor task failed");
    }
    if let Err(e) = served {
        fatal("Server error", e);
    }
    info!("Sealed swap processor stopped");
}
