// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Content hashing.
//!
//! SHA-256 over UTF-8 bytes, and a deterministic directory-hash combinator.
//! These two primitives are load-bearing: the server independently
//! recomputes the same digests, so nothing here may inject separators,
//! length prefixes, or any other framing.

use sha2::{Digest, Sha256};

/// Computes the lowercase-hex SHA-256 digest of a string, encoded as UTF-8.
#[must_use]
pub fn hash_bytes(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// A child entry passed to [`hash_directory`], already hashed and named.
#[derive(Debug, Clone, Copy)]
pub struct ChildHash<'a> {
    /// The child's own hash, lowercase hex.
    pub hash: &'a str,
    /// The child's path.
    pub path: &'a str,
}

/// Computes a directory's hash as `SHA-256(concat(child.hash ++ child.path))`
/// over the children in the order given.
///
/// Callers are responsible for sorting children before calling this — the
/// function does not sort, and does not insert separators between children
/// or between a child's hash and its path.
#[must_use]
pub fn hash_directory(children: &[ChildHash<'_>]) -> String {
    let mut hasher = Sha256::new();
    for child in children {
        hasher.update(child.hash.as_bytes());
        hasher.update(child.path.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// The hash of an empty directory — `SHA-256("")`.
#[must_use]
pub fn empty_directory_hash() -> String {
    hash_directory(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_empty() {
        assert_eq!(
            hash_bytes(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_bytes_hello() {
        assert_eq!(
            hash_bytes("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hash_bytes_deterministic() {
        let a = hash_bytes("the quick brown fox");
        let b = hash_bytes("the quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_directory_empty() {
        assert_eq!(hash_directory(&[]), hash_bytes(""));
    }

    #[test]
    fn test_hash_directory_order_matters() {
        let a_hash = hash_bytes("A");
        let b_hash = hash_bytes("B");
        let forward = hash_directory(&[
            ChildHash { hash: &a_hash, path: "x.ts" },
            ChildHash { hash: &b_hash, path: "y.ts" },
        ]);
        let backward = hash_directory(&[
            ChildHash { hash: &b_hash, path: "y.ts" },
            ChildHash { hash: &a_hash, path: "x.ts" },
        ]);
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_hash_directory_no_framing() {
        // Must equal a raw concatenation hash — no separators, no length prefixes.
        let manual = {
            let mut hasher = Sha256::new();
            hasher.update(b"hp");
            hex::encode(hasher.finalize())
        };
        assert_eq!(
            hash_directory(&[ChildHash { hash: "h", path: "p" }]),
            manual
        );
    }

    #[test]
    fn test_empty_directory_hash_matches_spec_vector() {
        assert_eq!(
            empty_directory_hash(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
