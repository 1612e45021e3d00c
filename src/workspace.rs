// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Host workspace/file-service contracts, and a filesystem-backed
//! implementation so the crate is runnable and testable standalone,
//! without a real editor host.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// A single child entry returned by [`FileService::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedChild {
    /// The child's URI (see [`FileService`]).
    pub resource: String,
}

/// The result of resolving a URI through the host's file service.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// True if the URI names a regular file.
    pub is_file: bool,
    /// True if the URI names a directory.
    pub is_directory: bool,
    /// File size in bytes, when known and applicable.
    pub size: Option<u64>,
    /// Directory entries, when `is_directory`.
    pub children: Option<Vec<ResolvedChild>>,
}

/// The minimal file-service surface consumed by the collector and builder.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Resolves a URI to its metadata and, for directories, its children.
    async fn resolve(&self, uri: &str) -> Result<ResolvedNode>;

    /// Reads a file's content as UTF-8.
    async fn read(&self, uri: &str) -> Result<String>;
}

/// The minimal workspace surface consumed by the orchestrator.
pub trait Workspace: Send + Sync {
    /// The workspace's root URIs, in host-defined order.
    fn roots(&self) -> Vec<String>;

    /// Subscribes to workspace-root change notifications.
    fn subscribe_changed(&self) -> broadcast::Receiver<()>;
}

/// A [`Workspace`] and [`FileService`] backed by the real filesystem,
/// rooted at a single directory — used by the CLI harness and by tests.
pub struct LocalFsWorkspace {
    root: PathBuf,
    changed_tx: broadcast::Sender<()>,
}

impl LocalFsWorkspace {
    /// Creates a workspace whose single root is `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (changed_tx, _rx) = broadcast::channel(16);
        Self {
            root: root.into(),
            changed_tx,
        }
    }

    /// Notifies subscribers that the workspace root changed.
    pub fn notify_changed(&self) {
        let _ = self.changed_tx.send(());
    }

    /// The URI scheme this implementation uses for local paths.
    #[must_use]
    pub fn root_uri(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

impl Workspace for LocalFsWorkspace {
    fn roots(&self) -> Vec<String> {
        vec![self.root_uri()]
    }

    fn subscribe_changed(&self) -> broadcast::Receiver<()> {
        self.changed_tx.subscribe()
    }
}

fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

/// A [`FileService`] backed by `tokio::fs`, resolving `file://` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFsFileService;

#[async_trait]
impl FileService for LocalFsFileService {
    async fn resolve(&self, uri: &str) -> Result<ResolvedNode> {
        let path = uri_to_path(uri);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| SyncError::file_system(path.clone(), e))?;

        if metadata.is_dir() {
            let mut children = Vec::new();
            let mut entries = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| SyncError::file_system(path.clone(), e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| SyncError::file_system(path.clone(), e))?
            {
                children.push(ResolvedChild {
                    resource: format!("file://{}", entry.path().display()),
                });
            }
            Ok(ResolvedNode {
                is_file: false,
                is_directory: true,
                size: None,
                children: Some(children),
            })
        } else {
            Ok(ResolvedNode {
                is_file: true,
                is_directory: false,
                size: Some(metadata.len()),
                children: None,
            })
        }
    }

    async fn read(&self, uri: &str) -> Result<String> {
        let path = uri_to_path(uri);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SyncError::file_system(path, e))
    }
}

/// Returns the URI's base name (the last path segment).
#[must_use]
pub fn base_name(uri: &str) -> String {
    Path::new(uri)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
