// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Finalizer key loading for the signing delegate.
//!
//! Keys are accepted as PEM (SEC1 or PKCS#8) or as raw hex.

use std::path::Path;

use alloy::signers::local::PrivateKeySigner;
use k256::SecretKey;

#[derive(Debug, thiserror::Error)]
pub enum SignerKeyError {
    #[error("failed to read key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("no signer key configured")]
    Missing,
}

/// Convert a PEM-encoded secp256k1 private key to hex (no `0x` prefix).
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, SignerKeyError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| SignerKeyError::InvalidKey(format!("Invalid UTF-8: {e}")))?;
    let pem = pem::parse(pem_str)
        .map_err(|e| SignerKeyError::InvalidKey(format!("Invalid PEM: {e}")))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| SignerKeyError::InvalidKey(format!("Invalid key format: {e}")))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

pub fn signer_from_hex(hex_key: &str) -> Result<PrivateKeySigner, SignerKeyError> {
    hex_key
        .trim()
        .trim_start_matches("0x")
        .parse::<PrivateKeySigner>()
        .map_err(|e| SignerKeyError::InvalidKey(e.to_string()))
}

pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, SignerKeyError> {
    signer_from_hex(&pem_to_hex(pem_bytes)?)
}

/// Load the finalizer key from a PEM file, falling back to a hex string.
pub fn load_signer(
    key_path: Option<&Path>,
    hex_key: Option<&str>,
) -> Result<PrivateKeySigner, SignerKeyError> {
    if let Some(path) = key_path {
        let bytes = std::fs::read(path)?;
        return signer_from_pem(&bytes);
    }
    match hex_key {
        Some(hex) => signer_from_hex(hex),
        None => Err(SignerKeyError::Missing),
    }
}
