// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use alloy::primitives::Address;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use tracing::{error, info};
use url::{Host, Url};

use super::{SignRequest, SignResponse, SignerError, SignerResult, SigningDelegate};
use crate::ledger::{FinalizeSwap, SignedFinalize};
use crate::retry::RetryPolicy;

/// True for `localhost`, 127.0.0.0/8 and `::1`.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Outcome of one HTTP attempt, before retry classification.
enum Attempt {
    Signed(SignResponse),
    Failed(SignerError),
}

pub struct HttpSigningDelegate {
    client: Client,
    sign_url: Url,
    caller: Address,
    retry: RetryPolicy,
}

impl HttpSigningDelegate {
    /// Refuses any base URL that is not a loopback address.
    pub fn new(base_url: &str, caller: Address, timeout: Duration) -> SignerResult<Self> {
        let base = Url::parse(base_url).map_err(|e| SignerError::NotLoopback(format!("{base_url}: {e}")))?;
        if !is_loopback(&base) {
            return Err(SignerError::NotLoopback(base_url.to_string()));
        }
        let sign_url = base
            .join("sign")
            .map_err(|e| SignerError::NotLoopback(format!("{base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignerError::Unreachable(e.to_string()))?;

        info!(url = %sign_url, "Signing delegate client configured");
        Ok(Self {
            client,
            sign_url,
            caller,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn attempt(&self, request: &SignRequest) -> Result<Attempt, SignerError> {
        let response = self
            .client
            .post(self.sign_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SignerError::Timeout
                } else {
                    SignerError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            // From here on the delegate may have signed: never retry.
            return Ok(match response.json::<SignResponse>().await {
                Ok(body) => Attempt::Signed(body),
                Err(e) => Attempt::Failed(SignerError::AmbiguousSignature(e.to_string())),
            });
        }
        if status == StatusCode::FORBIDDEN {
            return Err(SignerError::Forbidden);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SignerError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl SigningDelegate for HttpSigningDelegate {
    async fn sign_finalize(&self, tx: &FinalizeSwap) -> SignerResult<SignedFinalize> {
        let request = SignRequest {
            caller: self.caller,
            payload_b64: STANDARD.encode(tx.encode()),
        };

        let attempt = self
            .retry
            .run("sign_finalize", || self.attempt(&request), SignerError::is_transient)
            .await?;

        let response = match attempt {
            Attempt::Signed(response) => response,
            Attempt::Failed(e) => {
                error!(intent_id = %tx.intent_id, error = %e, "Delegate response unreadable after success status");
                return Err(e);
            }
        };

        let signed = SignedFinalize {
            tx: tx.clone(),
            signature: response.signature,
        };
        if signed.verify_signer(response.signer).is_err() {
            return Err(SignerError::AmbiguousSignature(
                "signature does not match reported signer".to_string(),
            ));
        }
        Ok(signed)
    }
}
