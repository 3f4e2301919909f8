// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ECIES envelopes for key shares.
//!
//! Scheme:
//! 1. Generate an ephemeral secp256k1 keypair
//! 2. ECDH with the recipient public key
//! 3. HKDF-SHA256 over the shared secret to a 32-byte key
//! 4. ChaCha20-Poly1305 with a random nonce and caller-supplied AAD
//!
//! The AAD binds an envelope to the identifier and share index it was made
//! for, so a custodian cannot be tricked into unwrapping a share lifted from
//! another ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use k256::{ecdh::EphemeralSecret, elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Domain separator for HKDF key derivation.
const HKDF_INFO: &[u8] = b"sealed-swap-share-envelope-v1";

pub const NONCE_BYTES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid nonce length")]
    InvalidNonce,
    #[error("key derivation failed")]
    KeyDerivationFailed,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed (wrong key, wrong context or corrupted data)")]
    DecryptionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "super::hex_serde::bytes")]
    pub ephemeral_pubkey: Vec<u8>,
    #[serde(with = "super::hex_serde::bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "super::hex_serde::bytes")]
    pub ciphertext: Vec<u8>,
}

/// Compressed SEC1 encoding of a public key.
pub fn encode_public_key(key: &PublicKey) -> Vec<u8> {
    key.to_encoded_point(true).as_bytes().to_vec()
}

pub fn decode_public_key(bytes: &[u8]) -> Result<PublicKey, EnvelopeError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| EnvelopeError::InvalidPublicKey)
}

fn derive_key(shared: &[u8]) -> Result<[u8; 32], EnvelopeError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared);
    let mut key = [0u8; 32];
    hkdf.expand(HKDF_INFO, &mut key)
        .map_err(|_| EnvelopeError::KeyDerivationFailed)?;
    Ok(key)
}

/// Symmetric AEAD seal with a fresh random nonce.
pub fn aead_seal(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; NONCE_BYTES], Vec<u8>), EnvelopeError> {
    let mut nonce = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher =
        ChaCha20Poly1305::new_from_slice(key).map_err(|_| EnvelopeError::EncryptionFailed)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| EnvelopeError::EncryptionFailed)?;
    Ok((nonce, ciphertext))
}

pub fn aead_open(
    key: &[u8; 32],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EnvelopeError> {
    if nonce.len() != NONCE_BYTES {
        return Err(EnvelopeError::InvalidNonce);
    }
    let cipher =
        ChaCha20Poly1305::new_from_slice(key).map_err(|_| EnvelopeError::DecryptionFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| EnvelopeError::DecryptionFailed)
}

/// Encrypt `plaintext` to `recipient`.
pub fn seal(recipient: &PublicKey, plaintext: &[u8], aad: &[u8]) -> Result<SealedBox, EnvelopeError> {
    let ephemeral = EphemeralSecret::random(&mut rand::thread_rng());
    let shared = ephemeral.diffie_hellman(recipient);
    let key = derive_key(shared.raw_secret_bytes().as_slice())?;
    let (nonce, ciphertext) = aead_seal(&key, plaintext, aad)?;

    Ok(SealedBox {
        ephemeral_pubkey: encode_public_key(&ephemeral.public_key()),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypt an envelope addressed to `secret`.
pub fn open(secret: &SecretKey, sealed: &SealedBox, aad: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let ephemeral = decode_public_key(&sealed.ephemeral_pubkey)?;
    let shared = k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
    let key = derive_key(shared.raw_secret_bytes().as_slice())?;
    aead_open(&key, &sealed.nonce, &sealed.ciphertext, aad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (SecretKey, PublicKey) {
        let secret = SecretKey::random(&mut rand::thread_rng());
        let public = secret.public_key();
        (secret, public)
    }

    #[test]
    fn seal_and_open() {
        let (sk, pk) = keypair();
        let sealed = seal(&pk, b"share bytes", b"ctx").unwrap();
        assert_eq!(sealed.ephemeral_pubkey.len(), 33);
        assert_eq!(open(&sk, &sealed, b"ctx").unwrap(), b"share bytes");
    }

    #[test]
    fn wrong_key_fails() {
        let (_, pk) = keypair();
        let (other_sk, _) = keypair();
        let sealed = seal(&pk, b"data", b"ctx").unwrap();
        assert_eq!(
            open(&other_sk, &sealed, b"ctx"),
            Err(EnvelopeError::DecryptionFailed)
        );
    }

    #[test]
    fn wrong_context_fails() {
        let (sk, pk) = keypair();
        let sealed = seal(&pk, b"data", b"ctx-a").unwrap();
        assert_eq!(
            open(&sk, &sealed, b"ctx-b"),
            Err(EnvelopeError::DecryptionFailed)
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (sk, pk) = keypair();
        let mut sealed = seal(&pk, b"data", b"").unwrap();
        sealed.ciphertext[0] ^= 1;
        assert!(open(&sk, &sealed, b"").is_err());

        sealed.ephemeral_pubkey = vec![1, 2, 3];
        assert_eq!(open(&sk, &sealed, b""), Err(EnvelopeError::InvalidPublicKey));
    }

    #[test]
    fn public_key_encoding_round_trip() {
        let (_, pk) = keypair();
        let encoded = encode_public_key(&pk);
        assert_eq!(decode_public_key(&encoded).unwrap(), pk);
    }
}
