//! Deterministic cache keys for third-party API requests.

use sha2::{Digest, Sha256};

/// Compute the cache key for an (endpoint, parameters) pair.
///
/// Parameters are sorted by name before hashing so call sites need not agree
/// on ordering. The endpoint is kept as a readable prefix so tag-based
/// invalidation can match on it.
pub fn cache_key(endpoint: &str, params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    for (name, value) in &sorted {
        hasher.update(b"\x1f");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }

    format!("{}:{}", endpoint, hex::encode(&hasher.finalize()[..16]))
}
