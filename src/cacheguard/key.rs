//! Canonical cache keys: function id + a deterministic serialization of the
//! argument tuple, hashed with `sha2` (already a teacher dependency, used
//! there for request signing; here for content addressing).

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash `fn_id` plus a canonical JSON encoding of `args` into a hex cache
/// key. `args` must serialize deterministically (no HashMap with
/// non-sorted keys) for the key to be stable across calls.
pub fn cache_key<T: Serialize>(fn_id: &str, args: &T) -> String {
    let canonical =
        serde_json::to_string(args).unwrap_or_else(|_| "<unserializable>".to_string());
    let mut hasher = Sha256::new();
    hasher.update(fn_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Content hash used for the five-minute embedding cache keyed by text
/// content rather than call-site arguments (§4.2.1).
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_args_produce_same_key() {
        let a = cache_key("get_bars", &("600519", "2020-01-02", "2020-01-10"));
        let b = cache_key("get_bars", &("600519", "2020-01-02", "2020-01-10"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_fn_id_changes_key() {
        let a = cache_key("get_bars", &"600519");
        let b = cache_key("get_quote", &"600519");
        assert_ne!(a, b);
    }
}
