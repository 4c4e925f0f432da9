//! Query fingerprints with Blake3 hashing
//!
//! A fingerprint is derived from the string form of every query parameter,
//! object name first. Long parameter lists are not hashed at all: once the
//! accumulated key passes `MAX_CACHE_KEY_LEN` characters the query is
//! uncacheable.

use std::fmt::{self, Write};

/// Maximum accumulated key length, in characters
pub const MAX_CACHE_KEY_LEN: usize = 500;

/// Cache key of a query, or `None` when the query is uncacheable
pub fn compute(params: &[&dyn fmt::Display]) -> Option<u32> {
    if params.is_empty() {
        return None;
    }

    let mut key = String::new();
    let mut chars = 0usize;
    let mut part = String::new();
    for param in params {
        part.clear();
        // Writing into a String cannot fail
        let _ = write!(part, "{}", param);
        chars += part.chars().count();
        if chars > MAX_CACHE_KEY_LEN {
            return None;
        }
        key.push_str(&part);
    }

    Some(hash(&key))
}

/// First four bytes (little endian) of the Blake3 digest
fn hash(key: &str) -> u32 {
    let digest = blake3::hash(key.as_bytes());
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
