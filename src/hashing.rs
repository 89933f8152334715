//! Hashing - SHA-256 digests for storage keys
//!
//! Layout names are user text; the file they live in must be derived
//! deterministically and must not collide when two names fold to the same
//! safe characters.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Longest folded-name prefix kept in a storage key.
pub const MAX_KEY_PREFIX: usize = 64;

/// `<name with [^A-Za-z0-9.-] folded to '_', at most 64 chars>-<8 hex of sha256(name)>`
pub fn layout_storage_key(name: &str) -> String {
    let folded: String = name
        .chars()
        .take(MAX_KEY_PREFIX)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = sha256_hex(name.as_bytes());
    format!("{folded}-{}", &digest[..8])
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_storage_key_deterministic() {
        assert_eq!(layout_storage_key("Wedding 4-up"), layout_storage_key("Wedding 4-up"));
        assert!(layout_storage_key("Wedding 4-up").starts_with("Wedding_4-up-"));
    }

    #[test]
    fn test_folded_names_do_not_collide() {
        assert_ne!(layout_storage_key("a b"), layout_storage_key("a_b"));
        assert_ne!(layout_storage_key("a/b"), layout_storage_key("a?b"));
    }

    #[test]
    fn test_long_names_stay_within_file_name_limit() {
        let long = "Wedding ".repeat(40);
        let key = layout_storage_key(&long);
        assert_eq!(key.len(), MAX_KEY_PREFIX + 1 + 8);
        // same prefix, different tail
        assert_ne!(key, layout_storage_key(&format!("{long}!")));
    }

    #[test]
    fn test_storage_key_has_no_separators() {
        let key = layout_storage_key("../../etc/passwd");
        assert!(!key.contains('/'));
        assert!(!key.contains('\\'));
    }
}
