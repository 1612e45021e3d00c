// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Project identity derivation.
//!
//! A [`ProjectIdentity`] maps a `(user, absolute folder path, folder name)`
//! triple to a stable, server-recognizable hash. It is never stored
//! client-side — it is recomputed on every workspace-open and sent to the
//! server to look up (or create) a matching project row.

use crate::hash::hash_bytes;

/// The stable identifier derived from a user, an absolute folder path, and
/// a folder's display name.
///
/// Renaming or moving the folder mints a fresh identity by design — this
/// is not a content hash, it is a location hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectIdentity(String);

impl ProjectIdentity {
    /// Derives the identity for `(user_id, folder_path, folder_name)`.
    ///
    /// `folder_path` is normalized before hashing: lower-cased, and all
    /// backslashes mapped to forward slashes. This makes the identity
    /// invariant under case changes and path-separator style.
    #[must_use]
    pub fn compute(user_id: &str, folder_path: &str, folder_name: &str) -> Self {
        let normalized_path = normalize_path(folder_path);
        let preimage = format!("{user_id}:{normalized_path}:{folder_name}");
        Self(hash_bytes(&preimage))
    }

    /// Returns the lowercase-hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize_path(path: &str) -> String {
    path.to_lowercase().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deterministic() {
        let a = ProjectIdentity::compute("user-1", "/Users/alice/code/app", "app");
        let b = ProjectIdentity::compute("user-1", "/Users/alice/code/app", "app");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_invariant_under_case() {
        let a = ProjectIdentity::compute("user-1", "/Users/Alice/Code/App", "app");
        let b = ProjectIdentity::compute("user-1", "/users/alice/code/app", "app");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_invariant_under_separator_style() {
        let a = ProjectIdentity::compute("user-1", "C:\\Users\\alice\\app", "app");
        let b = ProjectIdentity::compute("user-1", "C:/Users/alice/app", "app");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_differs_on_rename() {
        let original = ProjectIdentity::compute("user-1", "/Users/alice/code/app", "app");
        let renamed = ProjectIdentity::compute("user-1", "/Users/alice/code/app2", "app2");
        assert_ne!(original, renamed);
    }

    #[test]
    fn test_identity_differs_by_user() {
        let a = ProjectIdentity::compute("user-1", "/Users/alice/code/app", "app");
        let b = ProjectIdentity::compute("user-2", "/Users/alice/code/app", "app");
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_is_64_char_hex() {
        let id = ProjectIdentity::compute("user-1", "/Users/alice/code/app", "app");
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
