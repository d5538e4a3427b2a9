//! Random identifiers for conversations, messages and requests

use rand::rngs::OsRng;
use rand::{thread_rng, RngCore};
use uuid::Builder;

/// Generate a UUID-v4 in canonical hyphenated form.
///
/// Entropy comes from the OS generator. If that source is unavailable the
/// thread-local PRNG fills in, so uniqueness is best-effort only.
pub fn new_id() -> String {
    let mut bytes = [0u8; 16];
    if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
        tracing::debug!(error = %e, "OS entropy unavailable, falling back to thread rng");
        thread_rng().fill_bytes(&mut bytes);
    }
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}

#[cfg(test)]
pub(crate) fn is_uuid_v4(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_digit() || (b'a'..=b'f').contains(b),
    });
    shape_ok && bytes[14] == b'4' && matches!(bytes[19], b'8' | b'9' | b'a' | b'b')
}
