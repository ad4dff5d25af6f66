//! CSRF protection
//!
//! The token lives inside the session claims; forms echo it back in a hidden
//! `_csrf` field and AJAX calls in the `X-CSRF-Token` header.

use rand::Rng;
use sha2::{Digest, Sha256};

pub fn generate_csrf_token() -> String {
    let token: [u8; 32] = rand::rng().random();
    hex::encode(token)
}

/// Compares digests of both values so the comparison does not short-circuit on
/// the first differing byte of the secret.
pub fn validate_csrf_token(token: &str, expected: &str) -> bool {
    if token.is_empty() || expected.is_empty() {
        return false;
    }

    let a = Sha256::digest(token.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
