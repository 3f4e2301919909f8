// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shamir secret sharing over GF(2^8).
//!
//! Each byte of the secret is the constant term of an independent random
//! polynomial of degree `threshold - 1`; share `i` holds the evaluations at
//! `x = i` (indices start at 1). Any `threshold` shares reconstruct the
//! secret by Lagrange interpolation at zero.

use std::collections::HashSet;

use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShamirError {
    #[error("threshold must be between 1 and {shares}, got {threshold}")]
    InvalidThreshold { threshold: u8, shares: u8 },

    #[error("at least one share is required")]
    NoShares,

    #[error("share index {0} is invalid or repeated")]
    BadIndex(u8),

    #[error("shares have inconsistent lengths")]
    LengthMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub index: u8,
    #[serde(with = "super::hex_serde::bytes")]
    pub value: Vec<u8>,
}

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse as `a^254`. Undefined for zero, which callers never pass.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

fn eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, c| gf_mul(acc, x) ^ c)
}

/// Split `secret` into `shares` shares, any `threshold` of which recover it.
pub fn split(secret: &[u8], threshold: u8, shares: u8) -> Result<Vec<Share>, ShamirError> {
    if threshold == 0 || threshold > shares {
        return Err(ShamirError::InvalidThreshold { threshold, shares });
    }

    let mut rng = rand::thread_rng();
    let mut out: Vec<Share> = (1..=shares)
        .map(|index| Share {
            index,
            value: Vec::with_capacity(secret.len()),
        })
        .collect();

    let mut coefficients = vec![0u8; threshold as usize];
    for &byte in secret {
        coefficients[0] = byte;
        rng.fill_bytes(&mut coefficients[1..]);
        for share in out.iter_mut() {
            share.value.push(eval(&coefficients, share.index));
        }
    }
    Ok(out)
}

/// Recover the secret from a set of distinct shares.
///
/// The result is only meaningful when at least `threshold` shares are given;
/// callers authenticate the recovered value (AEAD) before trusting it.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>, ShamirError> {
    let first = shares.first().ok_or(ShamirError::NoShares)?;
    let len = first.value.len();

    let mut seen = HashSet::new();
    for share in shares {
        if share.index == 0 || !seen.insert(share.index) {
            return Err(ShamirError::BadIndex(share.index));
        }
        if share.value.len() != len {
            return Err(ShamirError::LengthMismatch);
        }
    }

    let mut secret = vec![0u8; len];
    for (i, share_i) in shares.iter().enumerate() {
        let mut basis = 1u8;
        for (j, share_j) in shares.iter().enumerate() {
            if i != j {
                let denominator = share_j.index ^ share_i.index;
                basis = gf_mul(basis, gf_mul(share_j.index, gf_inv(denominator)));
            }
        }
        for (out, y) in secret.iter_mut().zip(&share_i.value) {
            *out ^= gf_mul(*y, basis);
        }
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse of {a}");
        }
    }

    #[test]
    fn any_two_of_three_recover() {
        let secret = [7u8; 32];
        let shares = split(&secret, 2, 3).unwrap();
        assert_eq!(shares.len(), 3);

        for (a, b) in [(0, 1), (0, 2), (1, 2), (2, 0)] {
            let subset = vec![shares[a].clone(), shares[b].clone()];
            assert_eq!(combine(&subset).unwrap(), secret.to_vec());
        }
        assert_eq!(combine(&shares).unwrap(), secret.to_vec());
    }

    #[test]
    fn single_share_does_not_reveal_secret() {
        let secret: Vec<u8> = (0..32).collect();
        let shares = split(&secret, 2, 3).unwrap();
        assert_ne!(combine(&shares[..1]).unwrap(), secret);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            split(b"x", 0, 3),
            Err(ShamirError::InvalidThreshold {
                threshold: 0,
                shares: 3
            })
        );
        assert!(split(b"x", 4, 3).is_err());
        assert_eq!(combine(&[]), Err(ShamirError::NoShares));
    }

    #[test]
    fn rejects_duplicate_or_mismatched_shares() {
        let shares = split(b"secret", 2, 3).unwrap();
        let dup = vec![shares[0].clone(), shares[0].clone()];
        assert_eq!(combine(&dup), Err(ShamirError::BadIndex(shares[0].index)));

        let mut short = shares[1].clone();
        short.value.pop();
        assert_eq!(
            combine(&[shares[0].clone(), short]),
            Err(ShamirError::LengthMismatch)
        );
    }
}
