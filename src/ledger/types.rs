// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger record types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy::primitives::{keccak256, Address, B256};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gateway::Encrypted;

/// Hidden token amount in the smallest indivisible unit.
pub type Amount = u64;

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(#[serde(with = "crate::crypto::hex_serde::string")] pub B256);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = <B256 as FromStr>::Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

hash_id!(
    /// Vault identifier; also the encryption namespace of the vault's pointers.
    VaultId
);

hash_id!(
    /// One-time secret revealed inside a swap payload.
    Nullifier
);

impl Nullifier {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(B256::from(bytes))
    }

    /// Public commitment stored on the ticket the nullifier unlocks.
    pub fn commitment(&self) -> B256 {
        keccak256(self.0)
    }
}

macro_rules! seq_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

seq_id!(
    /// Ticket id, monotonically increasing and never reused within a vault.
    TicketId
);
seq_id!(
    /// Position of an intent in the queue.
    IntentId
);
seq_id!(OutputId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TokenType(pub String);

impl TokenType {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub token_type: TokenType,
    pub pointer: Encrypted<Amount>,
    /// `keccak256(nullifier)` of the deposit note entitled to this ticket.
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub nullifier_commitment: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub owner: Address,
    pub next_ticket_id: u64,
    pub tickets: BTreeMap<TicketId, Ticket>,
}

impl Vault {
    pub(super) fn new(id: VaultId, owner: Address) -> Self {
        Self {
            id,
            owner,
            next_ticket_id: 0,
            tickets: BTreeMap::new(),
        }
    }

    pub(super) fn mint(
        &mut self,
        token_type: TokenType,
        pointer: Encrypted<Amount>,
        nullifier_commitment: B256,
    ) -> TicketId {
        let ticket_id = TicketId(self.next_ticket_id);
        self.next_ticket_id += 1;
        self.tickets.insert(
            ticket_id,
            Ticket {
                ticket_id,
                token_type,
                pointer,
                nullifier_commitment,
            },
        );
        ticket_id
    }
}

/// A swap output or remainder addressed to a stealth address, waiting to be
/// claimed into a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealthOutput {
    pub output_id: OutputId,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub recipient: Address,
    pub token_type: TokenType,
    pub pointer: Encrypted<Amount>,
    pub source_intent: IntentId,
    pub claimed: bool,
}

/// The registered TEE identities.
///
/// `finalizer` signs finalize transactions and its key lives in the signing
/// delegate. `enclave` is the processor's decryption and queue-management
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeeAuthority {
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub finalizer: Address,
    #[serde(with = "crate::crypto::hex_serde::string")]
    pub enclave: Address,
}

impl TeeAuthority {
    pub fn is_authority(&self, caller: Address) -> bool {
        caller == self.finalizer || caller == self.enclave
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullifier_commitment_is_keccak() {
        let n = Nullifier(B256::repeat_byte(1));
        assert_eq!(n.commitment(), keccak256(B256::repeat_byte(1)));
        assert_ne!(Nullifier::random(), Nullifier::random());
    }

    #[test]
    fn ids_serialize_compactly() {
        assert_eq!(serde_json::to_string(&TicketId(4)).unwrap(), "4");
        assert_eq!(serde_json::to_string(&TokenType::new("USDC")).unwrap(), "\"USDC\"");
        let vault = VaultId(B256::repeat_byte(0xaa));
        let json = serde_json::to_string(&vault).unwrap();
        assert_eq!(serde_json::from_str::<VaultId>(&json).unwrap(), vault);
        assert_eq!(vault.to_string().parse::<VaultId>().unwrap(), vault);
    }

    #[test]
    fn authority_membership() {
        let auth = TeeAuthority {
            finalizer: Address::repeat_byte(1),
            enclave: Address::repeat_byte(2),
        };
        assert!(auth.is_authority(Address::repeat_byte(1)));
        assert!(auth.is_authority(Address::repeat_byte(2)));
        assert!(!auth.is_authority(Address::repeat_byte(3)));
    }
}
