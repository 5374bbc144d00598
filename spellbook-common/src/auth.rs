//! Admin token verification
//!
//! The configuration never holds the admin token itself, only its SHA-256
//! digest (lower-case hex). Pure functions only; HTTP extraction lives in the
//! server crate.

use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 digest of a token
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// True when `token` hashes to `expected_digest`
///
/// An empty token never matches.
pub fn verify_token(token: &str, expected_digest: &str) -> bool {
    if token.is_empty() {
        return false;
    }

    let actual = token_digest(token);
    let expected = expected_digest.trim().to_ascii_lowercase();

    // Constant-time comparison
    actual.len() == expected.len()
        && actual
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}
