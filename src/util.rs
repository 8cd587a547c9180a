//! Shared utility functions for the Cardmint application.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Hash an API key for database lookups.
/// Uses SHA-256 with application salt, returns lowercase hex string.
pub fn hash_api_key(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"cardmint-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new account API key (128 bits of entropy).
/// Only the hash is stored; the key itself is shown once.
pub fn generate_api_key() -> String {
    format!("cmk_{}", Uuid::new_v4().as_simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));

        headers.insert("Authorization", HeaderValue::from_static("abc123"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn api_key_hash_is_stable_and_distinct() {
        let key = generate_api_key();
        assert!(key.starts_with("cmk_"));
        assert_eq!(hash_api_key(&key), hash_api_key(&key));
        assert_ne!(hash_api_key(&key), hash_api_key("cmk_other"));
    }
}
