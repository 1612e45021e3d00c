// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Merkle tree data model and builder.
//!
//! [`MerkleNode`] is the recursive, content-addressed tree shared with the
//! server — its hashing rules must match the server's independent
//! implementation bit-for-bit, so nothing here may deviate from the
//! hashing contract in [`crate::hash`].

use crate::error::Result;
use crate::hash::{hash_bytes, hash_directory, ChildHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The synthetic root path literal.
pub const ROOT_PATH: &str = "root";

/// The kind of a Merkle tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    /// A file leaf.
    File,
    /// A directory (internal node).
    Directory,
}

/// A recursive node in the content-addressed tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleNode {
    /// Lowercase hex SHA-256 digest.
    pub hash: String,
    /// File or Directory.
    pub node_type: NodeType,
    /// Path relative to the synthetic `root`; top-level children have no
    /// `root/` prefix.
    pub path: String,
    /// UTF-8 byte length of content for files, zero for directories.
    pub size: u64,
    /// Seconds since epoch.
    pub modified_at: i64,
    /// Seconds since epoch.
    pub created_at: i64,
    /// True iff `node_type == File`.
    pub is_leaf: bool,
    /// Present iff directory; sorted ascending by `path` (UTF-16 code-unit
    /// order, which coincides with byte order for the ASCII paths this
    /// system allows).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MerkleNode>>,
}

/// A flat file as read off disk, the input to [`build_tree`].
#[derive(Debug, Clone)]
pub struct FileInput {
    /// Forward-slash-separated path relative to the workspace root.
    pub path: String,
    /// UTF-8 file content.
    pub content: String,
    /// Explicit size override; defaults to the UTF-8 byte length of `content`.
    pub size: Option<u64>,
    /// Milliseconds since epoch; defaults to `clock.now_millis()`.
    pub last_modified: Option<i64>,
}

/// Source of the current time, injected so tree building is pure and
/// testable with a fixed clock.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the epoch.
    fn now_millis(&self) -> i64;
}

/// A [`Clock`] backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A [`Clock`] that always returns a fixed instant — for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

enum RawEntry {
    File {
        content: String,
        size: Option<u64>,
        last_modified: Option<i64>,
    },
    Directory(BTreeMap<String, RawEntry>),
}

/// Builds a hashed Merkle tree from a flat file list.
///
/// Two phases: nesting (split each path on `/` and place it in a
/// name-to-entry mapping, directories created on demand, later files
/// silently overwriting earlier ones at the same path) followed by a
/// post-order hashing traversal.
///
/// The empty input yields a single directory node with path `root`, hash
/// `SHA-256("")`, and empty children.
pub fn build_tree(files: &[FileInput], clock: &dyn Clock) -> Result<MerkleNode> {
    let mut root: BTreeMap<String, RawEntry> = BTreeMap::new();

    for file in files {
        nest_file(&mut root, &file.path, file);
    }

    let children = hash_children(&root, ROOT_PATH, clock)?;
    let hash = hash_directory(
        &children
            .iter()
            .map(|c| ChildHash { hash: &c.hash, path: &c.path })
            .collect::<Vec<_>>(),
    );

    debug!(files = files.len(), hash = %hash, "built merkle tree");

    Ok(MerkleNode {
        hash,
        node_type: NodeType::Directory,
        path: ROOT_PATH.to_string(),
        size: 0,
        modified_at: clock.now_millis() / 1000,
        created_at: clock.now_millis() / 1000,
        is_leaf: false,
        children: Some(children),
    })
}

fn nest_file(root: &mut BTreeMap<String, RawEntry>, path: &str, file: &FileInput) {
    let segments: Vec<&str> = path.split('/').collect();
    let mut current = root;

    for (i, segment) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        if is_last {
            current.insert(
                (*segment).to_string(),
                RawEntry::File {
                    content: file.content.clone(),
                    size: file.size,
                    last_modified: file.last_modified,
                },
            );
        } else {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| RawEntry::Directory(BTreeMap::new()));
            current = match entry {
                RawEntry::Directory(map) => map,
                // A file previously occupied this path segment; last write
                // wins, so it is silently replaced with a directory.
                RawEntry::File { .. } => {
                    *entry = RawEntry::Directory(BTreeMap::new());
                    match entry {
                        RawEntry::Directory(map) => map,
                        RawEntry::File { .. } => unreachable!(),
                    }
                }
            };
        }
    }
}

fn hash_children(
    entries: &BTreeMap<String, RawEntry>,
    parent_path: &str,
    clock: &dyn Clock,
) -> Result<Vec<MerkleNode>> {
    let mut children = Vec::with_capacity(entries.len());

    for (name, entry) in entries {
        let path = if parent_path == ROOT_PATH {
            name.clone()
        } else {
            format!("{parent_path}/{name}")
        };

        let node = match entry {
            RawEntry::File {
                content,
                size,
                last_modified,
            } => {
                let hash = hash_bytes(content);
                let size = size.unwrap_or(content.len() as u64);
                let seconds = last_modified.unwrap_or_else(|| clock.now_millis()) / 1000;
                MerkleNode {
                    hash,
                    node_type: NodeType::File,
                    path,
                    size,
                    modified_at: seconds,
                    created_at: seconds,
                    is_leaf: true,
                    children: None,
                }
            }
            RawEntry::Directory(map) => {
                let nested = hash_children(map, &path, clock)?;
                let hash = hash_directory(
                    &nested
                        .iter()
                        .map(|c| ChildHash { hash: &c.hash, path: &c.path })
                        .collect::<Vec<_>>(),
                );
                let seconds = clock.now_millis() / 1000;
                MerkleNode {
                    hash,
                    node_type: NodeType::Directory,
                    path,
                    size: 0,
                    modified_at: seconds,
                    created_at: seconds,
                    is_leaf: false,
                    children: Some(nested),
                }
            }
        };
        children.push(node);
    }

    children.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(children)
}

impl MerkleNode {
    /// Finds a descendant node by its full relative path, depth-first.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&MerkleNode> {
        if self.path == path {
            return Some(self);
        }
        self.children
            .as_ref()?
            .iter()
            .find_map(|child| child.find(path))
    }

    /// Collects every leaf (file) node under this subtree, in tree order.
    pub fn leaves(&self) -> Vec<&MerkleNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a MerkleNode>) {
        if self.is_leaf {
            out.push(self);
            return;
        }
        if let Some(children) = &self.children {
            for child in children {
                child.collect_leaves(out);
            }
        }
    }
}
