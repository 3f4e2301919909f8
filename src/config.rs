// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and their parsing. Configuration is
//! loaded once at startup; an invalid value is an error, a missing optional
//! value falls back to its default.
//!
//! ## Processor (`sealed-swap-server`)
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` / `PORT` | Processing endpoint bind | `127.0.0.1` / `8080` |
//! | `DATA_DIR` | Encrypted storage root and journal | `/data` |
//! | `POLL_INTERVAL_SECS` | Processor tick | `5` |
//! | `KEY_SERVER_URLS` | Comma-separated custodian base URLs | in-process dev custodians |
//! | `KEY_SERVER_PUBKEYS` | Hex SEC1 public keys, same order as the URLs | required with URLs |
//! | `DECRYPTION_THRESHOLD` | Share quorum | `2` |
//! | `KEY_SERVER_TIMEOUT_MS` | Per-custodian fetch timeout | `10000` |
//! | `SIGNER_URL` | Signing delegate base URL (loopback only) | in-process delegate |
//! | `FINALIZER_ADDRESS` | Address of the delegate's key | required with `SIGNER_URL` |
//! | `SIGNER_TIMEOUT_MS` | Delegate request timeout | `5000` |
//! | `ENCLAVE_KEY_HEX` | Decryption identity of the enclave | random per boot |
//! | `VENUE_TIMEOUT_MS` | Per-call venue timeout (quote or execute) | `10000` |
//! | `VENUE_RATES` | Simulated venue table `IN:OUT:NUM/DEN,...` | `A:B:960/1000,B:A:1040/1000` |
//! | `FINALIZER_LIQUIDITY` | Finalizer token float `TOKEN:AMOUNT,...` | `A:1000000000000,B:1000000000000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Signing delegate (`tx-signer`)
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SIGNER_BIND` | Listen address, must be loopback | `127.0.0.1:4000` |
//! | `SIGNER_KEY_PATH` | PEM file of the finalizer key | - |
//! | `SIGNER_PRIVATE_KEY` | Hex finalizer key, used when no PEM path is set | - |
//! | `SIGNER_ALLOWED_CALLERS` | Comma-separated caller addresses | any caller |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use k256::PublicKey;
use url::Url;

use crate::crypto::envelope::decode_public_key;
use crate::gateway::{DEFAULT_FETCH_TIMEOUT, DEFAULT_THRESHOLD};
use crate::ledger::{Amount, TokenType};
use crate::processor::{DEFAULT_POLL_INTERVAL, DEFAULT_VENUE_TIMEOUT};
use crate::storage::paths::DATA_ROOT;
use crate::venue::{parse_rates, RateEntry};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the encrypted data directory path.
///
/// The directory is the enclave's encrypted mount. Notes, stealth keys,
/// audit logs and the submission journal live here.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const POLL_INTERVAL_ENV: &str = "POLL_INTERVAL_SECS";
pub const KEY_SERVER_URLS_ENV: &str = "KEY_SERVER_URLS";
pub const KEY_SERVER_PUBKEYS_ENV: &str = "KEY_SERVER_PUBKEYS";
pub const THRESHOLD_ENV: &str = "DECRYPTION_THRESHOLD";
pub const KEY_SERVER_TIMEOUT_ENV: &str = "KEY_SERVER_TIMEOUT_MS";
pub const SIGNER_URL_ENV: &str = "SIGNER_URL";
pub const FINALIZER_ADDRESS_ENV: &str = "FINALIZER_ADDRESS";
pub const SIGNER_TIMEOUT_ENV: &str = "SIGNER_TIMEOUT_MS";
pub const ENCLAVE_KEY_ENV: &str = "ENCLAVE_KEY_HEX";
pub const VENUE_TIMEOUT_ENV: &str = "VENUE_TIMEOUT_MS";
pub const VENUE_RATES_ENV: &str = "VENUE_RATES";
pub const FINALIZER_LIQUIDITY_ENV: &str = "FINALIZER_LIQUIDITY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const SIGNER_BIND_ENV: &str = "SIGNER_BIND";
pub const SIGNER_KEY_PATH_ENV: &str = "SIGNER_KEY_PATH";
pub const SIGNER_PRIVATE_KEY_ENV: &str = "SIGNER_PRIVATE_KEY";
pub const SIGNER_ALLOWED_CALLERS_ENV: &str = "SIGNER_ALLOWED_CALLERS";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SIGNER_BIND: &str = "127.0.0.1:4000";
const DEFAULT_SIGNER_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_FINALIZER_LIQUIDITY: Amount = 1_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is required: {reason}")]
    Missing { var: &'static str, reason: String },

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyServerEndpoint {
    pub url: Url,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerTarget {
    /// Key held in this process; development only.
    InProcess,
    Remote { url: Url, finalizer: Address },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    /// Empty means in-process development custodians.
    pub key_servers: Vec<KeyServerEndpoint>,
    pub threshold: u8,
    pub key_server_timeout: Duration,
    pub signer: SignerTarget,
    pub signer_timeout: Duration,
    pub enclave_key_hex: Option<String>,
    pub venue_timeout: Duration,
    pub venue_rates: Option<Vec<RateEntry>>,
    pub finalizer_liquidity: Vec<(TokenType, Amount)>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let bind: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(HOST_ENV, e.to_string()))?;

        let poll_interval = match get(POLL_INTERVAL_ENV) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| invalid(POLL_INTERVAL_ENV, raw.clone()))?;
                if secs == 0 {
                    return Err(invalid(POLL_INTERVAL_ENV, "must be at least 1"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        let key_servers = parse_key_servers(get(KEY_SERVER_URLS_ENV), get(KEY_SERVER_PUBKEYS_ENV))?;
        let threshold = match get(THRESHOLD_ENV) {
            Some(raw) => raw.parse::<u8>().map_err(|_| invalid(THRESHOLD_ENV, raw.clone()))?,
            None => DEFAULT_THRESHOLD,
        };
        if threshold == 0 || (!key_servers.is_empty() && usize::from(threshold) > key_servers.len()) {
            return Err(invalid(
                THRESHOLD_ENV,
                format!("{threshold} with {} custodians", key_servers.len()),
            ));
        }

        let signer = match get(SIGNER_URL_ENV) {
            Some(raw) => {
                let url = Url::parse(&raw).map_err(|e| invalid(SIGNER_URL_ENV, e.to_string()))?;
                let finalizer = get(FINALIZER_ADDRESS_ENV)
                    .ok_or(ConfigError::Missing {
                        var: FINALIZER_ADDRESS_ENV,
                        reason: "needed with SIGNER_URL".to_string(),
                    })?
                    .parse::<Address>()
                    .map_err(|e| invalid(FINALIZER_ADDRESS_ENV, e.to_string()))?;
                SignerTarget::Remote { url, finalizer }
            }
            None => SignerTarget::InProcess,
        };

        let venue_rates = get(VENUE_RATES_ENV)
            .map(|raw| parse_rates(&raw).map_err(|e| invalid(VENUE_RATES_ENV, e)))
            .transpose()?;

        let finalizer_liquidity = match get(FINALIZER_LIQUIDITY_ENV) {
            Some(raw) => parse_liquidity(&raw)?,
            None => vec![
                (TokenType::new("A"), DEFAULT_FINALIZER_LIQUIDITY),
                (TokenType::new("B"), DEFAULT_FINALIZER_LIQUIDITY),
            ],
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, other)),
        };

        Ok(Self {
            bind,
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DATA_ROOT)),
            poll_interval,
            key_servers,
            threshold,
            key_server_timeout: millis(get(KEY_SERVER_TIMEOUT_ENV), KEY_SERVER_TIMEOUT_ENV, DEFAULT_FETCH_TIMEOUT)?,
            signer,
            signer_timeout: millis(get(SIGNER_TIMEOUT_ENV), SIGNER_TIMEOUT_ENV, DEFAULT_SIGNER_TIMEOUT)?,
            enclave_key_hex: get(ENCLAVE_KEY_ENV),
            venue_timeout: millis(get(VENUE_TIMEOUT_ENV), VENUE_TIMEOUT_ENV, DEFAULT_VENUE_TIMEOUT)?,
            venue_rates,
            finalizer_liquidity,
            log_format,
        })
    }
}

/// Settings of the `tx-signer` binary.
#[derive(Debug, Clone)]
pub struct SignerServiceConfig {
    pub bind: SocketAddr,
    pub key_path: Option<PathBuf>,
    pub private_key: Option<String>,
    pub allowed_callers: Option<Vec<Address>>,
    pub log_format: LogFormat,
}

impl SignerServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind: SocketAddr = get(SIGNER_BIND_ENV)
            .unwrap_or_else(|| DEFAULT_SIGNER_BIND.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(SIGNER_BIND_ENV, e.to_string()))?;
        if !bind.ip().is_loopback() {
            return Err(invalid(SIGNER_BIND_ENV, format!("{bind} is not a loopback address")));
        }

        let key_path = get(SIGNER_KEY_PATH_ENV).map(PathBuf::from);
        let private_key = get(SIGNER_PRIVATE_KEY_ENV);
        if key_path.is_none() && private_key.is_none() {
            return Err(ConfigError::Missing {
                var: SIGNER_KEY_PATH_ENV,
                reason: format!("or {SIGNER_PRIVATE_KEY_ENV}"),
            });
        }

        let allowed_callers = get(SIGNER_ALLOWED_CALLERS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.parse::<Address>().map_err(|e| invalid(SIGNER_ALLOWED_CALLERS_ENV, e.to_string())))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind,
            key_path,
            private_key,
            allowed_callers,
            log_format,
        })
    }
}

fn millis(raw: Option<String>, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid(var, raw)),
        None => Ok(default),
    }
}

fn parse_key_servers(
    urls: Option<String>,
    pubkeys: Option<String>,
) -> Result<Vec<KeyServerEndpoint>, ConfigError> {
    let Some(urls) = urls else {
        return Ok(Vec::new());
    };
    let pubkeys = pubkeys.ok_or(ConfigError::Missing {
        var: KEY_SERVER_PUBKEYS_ENV,
        reason: "needed with KEY_SERVER_URLS".to_string(),
    })?;

    let urls: Vec<&str> = urls.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let keys: Vec<&str> = pubkeys.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if urls.len() != keys.len() {
        return Err(invalid(
            KEY_SERVER_PUBKEYS_ENV,
            format!("{} keys for {} URLs", keys.len(), urls.len()),
        ));
    }

    urls.into_iter()
        .zip(keys)
        .map(|(url, key)| {
            let url = Url::parse(url).map_err(|e| invalid(KEY_SERVER_URLS_ENV, e.to_string()))?;
            let bytes = alloy::hex::decode(key.trim_start_matches("0x"))
                .map_err(|e| invalid(KEY_SERVER_PUBKEYS_ENV, e.to_string()))?;
            let public_key =
                decode_public_key(&bytes).map_err(|e| invalid(KEY_SERVER_PUBKEYS_ENV, e.to_string()))?;
            Ok(KeyServerEndpoint { url, public_key })
        })
        .collect()
}

fn parse_liquidity(raw: &str) -> Result<Vec<(TokenType, Amount)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (token, amount) = entry
                .split_once(':')
                .ok_or_else(|| invalid(FINALIZER_LIQUIDITY_ENV, entry))?;
            let amount: Amount = amount
                .parse()
                .map_err(|_| invalid(FINALIZER_LIQUIDITY_ENV, entry))?;
            Ok((TokenType::new(token), amount))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::crypto::envelope::encode_public_key;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.venue_timeout, Duration::from_secs(10));
        assert!(config.key_servers.is_empty());
        assert_eq!(config.threshold, 2);
        assert_eq!(config.signer, SignerTarget::InProcess);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.finalizer_liquidity.len(), 2);
    }

    #[test]
    fn remote_custodians_and_signer_parse() {
        let keys: Vec<String> = (0..3)
            .map(|_| {
                let secret = k256::SecretKey::random(&mut rand::thread_rng());
                alloy::hex::encode(encode_public_key(&secret.public_key()))
            })
            .collect();
        let config = ServerConfig::from_lookup(lookup(&[
            (KEY_SERVER_URLS_ENV, "http://ks1:9000, http://ks2:9000,http://ks3:9000"),
            (KEY_SERVER_PUBKEYS_ENV, &keys.join(",")),
            (THRESHOLD_ENV, "2"),
            (SIGNER_URL_ENV, "http://127.0.0.1:4000"),
            (FINALIZER_ADDRESS_ENV, "0x0000000000000000000000000000000000000001"),
            (VENUE_RATES_ENV, "A:B:1/2"),
            (VENUE_TIMEOUT_ENV, "2500"),
            (LOG_FORMAT_ENV, "json"),
        ]))
        .unwrap();
        assert_eq!(config.venue_timeout, Duration::from_millis(2500));

        assert_eq!(config.key_servers.len(), 3);
        assert_eq!(config.key_servers[1].url.as_str(), "http://ks2:9000/");
        assert!(matches!(config.signer, SignerTarget::Remote { .. }));
        assert_eq!(config.venue_rates.unwrap().len(), 1);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(PORT_ENV, "eighty")])),
            Err(ConfigError::Invalid { var: PORT_ENV, .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(KEY_SERVER_URLS_ENV, "http://ks1")])),
            Err(ConfigError::Missing { var: KEY_SERVER_PUBKEYS_ENV, .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(SIGNER_URL_ENV, "http://127.0.0.1:4000")])),
            Err(ConfigError::Missing { var: FINALIZER_ADDRESS_ENV, .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(THRESHOLD_ENV, "0")])),
            Err(ConfigError::Invalid { var: THRESHOLD_ENV, .. })
        ));
        assert!(ServerConfig::from_lookup(lookup(&[(FINALIZER_LIQUIDITY_ENV, "A=5")])).is_err());
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(VENUE_TIMEOUT_ENV, "soon")])),
            Err(ConfigError::Invalid { var: VENUE_TIMEOUT_ENV, .. })
        ));
    }

    #[test]
    fn signer_service_requires_loopback_and_key() {
        assert!(matches!(
            SignerServiceConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing { .. })
        ));
        assert!(matches!(
            SignerServiceConfig::from_lookup(lookup(&[
                (SIGNER_BIND_ENV, "0.0.0.0:4000"),
                (SIGNER_PRIVATE_KEY_ENV, "00"),
            ])),
            Err(ConfigError::Invalid { var: SIGNER_BIND_ENV, .. })
        ));

        let config = SignerServiceConfig::from_lookup(lookup(&[
            (SIGNER_PRIVATE_KEY_ENV, "0x01"),
            (SIGNER_ALLOWED_CALLERS_ENV, "0x0000000000000000000000000000000000000002"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.allowed_callers.unwrap().len(), 1);
    }
}
