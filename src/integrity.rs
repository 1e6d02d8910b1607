use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::IntegrityError;

pub const HASH_PREFIX: &str = "sha256:";

/// Compute the content hash of a serialized snapshot: SHA-256 over the UTF-8
/// bytes, prefixed and base64url-encoded without padding.
pub fn hash(serialized: &str) -> String {
    let digest = Sha256::digest(serialized.as_bytes());
    format!("{}{}", HASH_PREFIX, URL_SAFE_NO_PAD.encode(digest))
}

/// Constant-time string comparison. Mismatched lengths return early (length
/// is not secret); the byte comparison itself never short-circuits. Used for
/// both cache integrity checks and refresh-token comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Verify a serialized snapshot against its recorded hash.
pub fn verify(serialized: &str, recorded: &str) -> Result<(), IntegrityError> {
    let computed = hash(serialized);
    if constant_time_eq(&computed, recorded) {
        Ok(())
    } else {
        Err(IntegrityError {
            recorded: recorded.to_string(),
            computed,
        })
    }
}
