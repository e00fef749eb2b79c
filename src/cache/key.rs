//! Deterministic cache key generation (§4.7). Reuses the crate's existing
//! `sha2`/`hex` pair (already pulled in for other hashing needs in the wider
//! pack) to hash arbitrary query params to a stable 64-hex-char key.

use sha2::{Digest, Sha256};

pub struct CacheKeyGenerator;

impl CacheKeyGenerator {
    pub fn database_query(name: &str) -> String {
        format!("db:query:{}", name)
    }

    pub fn note_metadata(id: &str) -> String {
        format!("note:metadata:{}", id)
    }

    pub fn note_status(id: &str) -> String {
        format!("note:status:{}", id)
    }

    /// Key space `parse_ingredient_line` caches under (§4.9's
    /// `clearIngredientCache` option invalidates exactly this prefix).
    pub fn ingredient_parse(reference: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(reference.as_bytes());
        format!("parse_ingredient_line:{}", hex::encode(hasher.finalize()))
    }

    /// Hashes arbitrary, order-sensitive query params to a stable 64-hex-char
    /// key so parameterized queries get deterministic cache keys.
    pub fn parameterized(name: &str, params: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(params.to_string().as_bytes());
        format!("db:query:{}:{}", name, hex::encode(hasher.finalize()))
    }
}
