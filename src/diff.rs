// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Tree differ.
//!
//! Compares an old tree (or its absence) against a new one and produces a
//! minimal set of per-file adds/modifies/deletes. Ordering of the emitted
//! change list is not guaranteed and callers must not depend on it.

use crate::tree::MerkleNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single file-level change between two trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "camelCase")]
pub enum Change {
    /// A file present only in the new tree.
    Added {
        /// The file's path.
        path: String,
        /// The new content's hash.
        new_hash: String,
    },
    /// A file present in both trees with differing content.
    Modified {
        /// The file's path.
        path: String,
        /// The previous content's hash.
        old_hash: String,
        /// The new content's hash.
        new_hash: String,
    },
    /// A file present only in the old tree.
    Deleted {
        /// The file's path.
        path: String,
        /// The content's hash before deletion.
        old_hash: String,
    },
}

impl Change {
    /// The path this change applies to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Change::Added { path, .. } => path,
            Change::Modified { path, .. } => path,
            Change::Deleted { path, .. } => path,
        }
    }

    /// True for `Added` and `Modified` — the set of files the server needs
    /// content for.
    #[must_use]
    pub fn needs_content(&self) -> bool {
        matches!(self, Change::Added { .. } | Change::Modified { .. })
    }
}

/// Per-category counts of a [`DiffResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    /// Count of `Added` changes.
    pub added: usize,
    /// Count of `Modified` changes.
    pub modified: usize,
    /// Count of `Deleted` changes.
    pub deleted: usize,
    /// Total change count.
    pub total: usize,
}

/// The outcome of [`compare`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Every file-level change found, in unspecified order.
    pub changes: Vec<Change>,
    /// Per-category counts.
    pub summary: DiffSummary,
    /// The subset of `changes` with `changeType ∈ {Added, Modified}`.
    pub files_to_process: Vec<Change>,
    /// The paths of every `Deleted` change.
    pub deleted_files: Vec<String>,
}

/// Compares `old` (or its absence) against `new`, producing the minimal
/// set of per-file changes.
#[must_use]
pub fn compare(old: Option<&MerkleNode>, new: &MerkleNode) -> DiffResult {
    let mut changes = Vec::new();

    match old {
        None => collect_added(new, &mut changes),
        Some(old) => {
            if old.hash != new.hash {
                diff_nodes(old, new, &mut changes);
            }
        }
    }

    finalize(changes)
}

fn diff_nodes(old: &MerkleNode, new: &MerkleNode, changes: &mut Vec<Change>) {
    use crate::tree::NodeType;

    match (old.node_type, new.node_type) {
        (NodeType::File, NodeType::File) => {
            changes.push(Change::Modified {
                path: new.path.clone(),
                old_hash: old.hash.clone(),
                new_hash: new.hash.clone(),
            });
        }
        (NodeType::Directory, NodeType::Directory) => {
            let old_children = by_path(old);
            let new_children = by_path(new);

            for (path, old_child) in &old_children {
                if !new_children.contains_key(path) {
                    collect_deleted(old_child, changes);
                }
            }
            for (path, new_child) in &new_children {
                match old_children.get(path) {
                    None => collect_added(new_child, changes),
                    Some(old_child) => {
                        if old_child.hash != new_child.hash {
                            diff_nodes(old_child, new_child, changes);
                        }
                    }
                }
            }
        }
        // Type flip (file <-> directory): the old subtree is fully
        // deleted, the new subtree is fully added.
        _ => {
            collect_deleted(old, changes);
            collect_added(new, changes);
        }
    }
}

fn by_path(node: &MerkleNode) -> BTreeMap<&str, &MerkleNode> {
    node.children
        .as_ref()
        .map(|children| children.iter().map(|c| (c.path.as_str(), c)).collect())
        .unwrap_or_default()
}

fn collect_added(node: &MerkleNode, changes: &mut Vec<Change>) {
    if node.is_leaf {
        changes.push(Change::Added {
            path: node.path.clone(),
            new_hash: node.hash.clone(),
        });
        return;
    }
    if let Some(children) = &node.children {
        for child in children {
            collect_added(child, changes);
        }
    }
}

fn collect_deleted(node: &MerkleNode, changes: &mut Vec<Change>) {
    if node.is_leaf {
        changes.push(Change::Deleted {
            path: node.path.clone(),
            old_hash: node.hash.clone(),
        });
        return;
    }
    if let Some(children) = &node.children {
        for child in children {
            collect_deleted(child, changes);
        }
    }
}

fn finalize(changes: Vec<Change>) -> DiffResult {
    let mut summary = DiffSummary::default();
    let mut files_to_process = Vec::new();
    let mut deleted_files = Vec::new();

    for change in &changes {
        match change {
            Change::Added { .. } => {
                summary.added += 1;
                files_to_process.push(change.clone());
            }
            Change::Modified { .. } => {
                summary.modified += 1;
                files_to_process.push(change.clone());
            }
            Change::Deleted { path, .. } => {
                summary.deleted += 1;
                deleted_files.push(path.clone());
            }
        }
    }
    summary.total = changes.len();

    DiffResult {
        changes,
        summary,
        files_to_process,
        deleted_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{build_tree, FileInput, FixedClock};

    fn file(path: &str, content: &str) -> FileInput {
        FileInput {
            path: path.to_string(),
            content: content.to_string(),
            size: None,
            last_modified: None,
        }
    }

    fn tree(files: &[FileInput]) -> MerkleNode {
        build_tree(files, &FixedClock(0)).unwrap()
    }

    #[test]
    fn test_all_files_added_when_old_tree_absent() {
        let files = [file("a.txt", "1"), file("b/c.txt", "2")];
        let new = tree(&files);
        let result = compare(None, &new);
        assert_eq!(result.summary.added, 2);
        assert_eq!(result.summary.total, 2);
        let paths: Vec<&str> = result.changes.iter().map(Change::path).collect();
        assert!(paths.contains(&"a.txt"));
        assert!(paths.contains(&"b/c.txt"));
    }

    #[test]
    fn test_identical_trees_produce_no_changes() {
        let t = tree(&[file("a.txt", "1"), file("b.txt", "2")]);
        let result = compare(Some(&t), &t);
        assert!(result.changes.is_empty());
        assert_eq!(result.summary.total, 0);
    }

    #[test]
    fn test_rename_is_delete_plus_add_with_equal_hash() {
        let old = tree(&[file("old/foo.ts", "same content")]);
        let new = tree(&[file("new/foo.ts", "same content")]);
        let result = compare(Some(&old), &new);

        assert_eq!(result.summary.added, 1);
        assert_eq!(result.summary.deleted, 1);
        assert_eq!(result.summary.modified, 0);

        let added_hash = result
            .changes
            .iter()
            .find_map(|c| match c {
                Change::Added { path, new_hash } if path == "new/foo.ts" => {
                    Some(new_hash.clone())
                }
                _ => None,
            })
            .unwrap();
        let deleted_hash = result
            .changes
            .iter()
            .find_map(|c| match c {
                Change::Deleted { path, old_hash } if path == "old/foo.ts" => {
                    Some(old_hash.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(added_hash, deleted_hash);
    }

    #[test]
    fn test_add_single_file() {
        let old = tree(&[file("a.txt", "1"), file("b.txt", "2")]);
        let new = tree(&[file("a.txt", "1"), file("b.txt", "2"), file("c.md", "3")]);
        let result = compare(Some(&old), &new);
        assert_eq!(result.summary.added, 1);
        assert_eq!(result.summary.total, 1);
        assert_eq!(result.changes[0].path(), "c.md");
    }

    #[test]
    fn test_modify_single_file() {
        let old = tree(&[file("a.txt", "1")]);
        let new = tree(&[file("a.txt", "2")]);
        let result = compare(Some(&old), &new);
        assert_eq!(result.summary.modified, 1);
        assert!(matches!(result.changes[0], Change::Modified { .. }));
    }

    #[test]
    fn test_delete_single_file() {
        let old = tree(&[file("a.txt", "1"), file("b.txt", "2")]);
        let new = tree(&[file("a.txt", "1")]);
        let result = compare(Some(&old), &new);
        assert_eq!(result.summary.deleted, 1);
        assert_eq!(result.deleted_files, vec!["b.txt".to_string()]);
        assert!(result.files_to_process.is_empty());
    }

    #[test]
    fn test_file_to_directory_type_flip() {
        let old = tree(&[file("thing", "content")]);
        let new = tree(&[file("thing/nested.txt", "content")]);
        let result = compare(Some(&old), &new);
        assert_eq!(result.summary.deleted, 1);
        assert_eq!(result.summary.added, 1);
    }

    #[test]
    fn test_files_to_process_excludes_deletes() {
        let old = tree(&[file("a.txt", "1"), file("b.txt", "2")]);
        let new = tree(&[file("a.txt", "1-changed"), file("c.txt", "3")]);
        let result = compare(Some(&old), &new);
        assert_eq!(result.files_to_process.len(), 2);
        assert!(result
            .files_to_process
            .iter()
            .all(Change::needs_content));
    }
}
