// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration token generation and fingerprinting.
//!
//! Tokens are never stored; only a one-way SHA-256 fingerprint is persisted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a fresh opaque registration token with >=128 bits of entropy.
///
/// 32 random bytes (256 bits), base64url-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One-way fingerprint of a token string, as stored by the Repository.
pub fn fingerprint(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
