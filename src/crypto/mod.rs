// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cryptographic building blocks for the threshold encryption gateway.
//!
//! - `identifier` - `namespace ‖ nonce` encryption identifiers
//! - `shamir` - secret sharing over GF(256)
//! - `envelope` - ECIES share wrapping (k256 ECDH + HKDF + ChaCha20-Poly1305)
//! - `session` - session certificates authorising share requests
//! - `hex_serde` - serde adapters for hex-encoded fields

pub mod envelope;
pub mod hex_serde;
pub mod identifier;
pub mod session;
pub mod shamir;

pub use envelope::{EnvelopeError, SealedBox};
pub use identifier::{address_namespace, EncryptionId, IdentifierError, ID_LEN, NAMESPACE_LEN, NONCE_LEN};
pub use session::{SessionCertificate, SessionError, SessionKey, DEFAULT_SESSION_TTL_MIN};
pub use shamir::{Share, ShamirError};
