// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_tokens_are_unique() {
    let a = generate_token();
    let b = generate_token();
    assert_ne!(a, b);
}

#[test]
fn generated_token_has_sufficient_entropy() {
    // 32 random bytes, base64url-no-pad encoded: >= 42 characters.
    let token = generate_token();
    assert!(token.len() >= 42, "token too short: {} chars", token.len());
}

#[test]
fn fingerprint_is_deterministic() {
    let token = "a-fixed-token-value";
    assert_eq!(fingerprint(token), fingerprint(token));
}

#[test]
fn fingerprint_differs_for_different_tokens() {
    assert_ne!(fingerprint("token-a"), fingerprint("token-b"));
}

#[test]
fn fingerprint_never_contains_the_raw_token() {
    let token = "super-secret-raw-token";
    assert!(!fingerprint(token).contains(token));
}
