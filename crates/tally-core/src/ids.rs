//! ID generation for reviews.
//!
//! Uses short, human-readable slugs: rv-xxxxxxxx

use anyhow::{anyhow, Result};

/// Prefix for review IDs
const REVIEW_PREFIX: &str = "rv";

/// Length of the random suffix (in base36 chars)
const SUFFIX_LEN: usize = 8;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a base36 suffix from OS randomness.
fn base36_suffix(len: usize) -> Result<String> {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).map_err(|e| anyhow!("Failed to read OS randomness: {e}"))?;

    let mut n = u64::from_le_bytes(bytes);
    let mut result = String::with_capacity(len);
    while result.len() < len {
        // n % 36 always fits in a usize index
        #[allow(clippy::cast_possible_truncation)]
        result.push(char::from(BASE36[(n % 36) as usize]));
        n /= 36;
    }

    Ok(result)
}

/// Generate a new review ID (e.g., "rv-1d3f9a0k")
pub fn new_review_id() -> Result<String> {
    Ok(format!("{}-{}", REVIEW_PREFIX, base36_suffix(SUFFIX_LEN)?))
}

/// Check if a string looks like a review ID
#[must_use]
pub fn is_review_id(s: &str) -> bool {
    s.strip_prefix("rv-").is_some_and(|suffix| {
        suffix.len() == SUFFIX_LEN && suffix.bytes().all(|b| BASE36.contains(&b))
    })
}
