// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Error handling for the sync core.
//!
//! This module provides a comprehensive error type covering transport
//! failures, file-system errors, and contract violations encountered while
//! hashing, building trees, diffing, syncing, and chatting.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sync core operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Comprehensive error type for all sync core operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A non-2xx or unreachable HTTP response.
    #[error("request to '{endpoint}' failed: {reason}")]
    Transport {
        /// The endpoint that was called.
        endpoint: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server responded with a status code outside 2xx.
    #[error("server returned {status} for '{endpoint}': {body}")]
    ServerStatus {
        /// The endpoint that was called.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
        /// The response body, if any was readable.
        body: String,
    },

    /// A required field was missing from a server response.
    #[error("missing required field '{field}' in response from '{endpoint}'")]
    ContractViolation {
        /// The endpoint whose response was malformed.
        endpoint: String,
        /// The name of the missing or malformed field.
        field: String,
    },

    /// Error occurred during a file-system operation.
    #[error("file system error for path '{path}': {source}")]
    FileSystem {
        /// The file path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Error occurred during hash computation.
    #[error("hash computation error: {reason}")]
    HashComputation {
        /// The reason for the hash computation failure.
        reason: String,
    },

    /// Error occurred while building or diffing a Merkle tree.
    #[error("tree error: {reason}")]
    Tree {
        /// The reason for the tree failure.
        reason: String,
    },

    /// No workspace root is open.
    #[error("no workspace root is open")]
    NoWorkspaceRoot,

    /// A transport operation was attempted before `initialize` set the
    /// backend URL and auth token.
    #[error("orchestrator not initialized: call initialize() first")]
    NotInitialized,

    /// An operation was attempted for a project that is not the active one.
    #[error("no active project")]
    NoActiveProject,

    /// Chat was requested while the active project's ingestion is not completed.
    #[error("chat is unavailable: project '{project_id}' has ingestion status '{status}'")]
    ChatUnavailable {
        /// The project that was targeted.
        project_id: String,
        /// The ingestion status observed.
        status: String,
    },

    /// JSON (de)serialization failure not tied to a specific HTTP endpoint.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    /// Creates a new transport error.
    pub fn transport(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new server-status error.
    pub fn server_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::ServerStatus {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a new contract-violation error.
    pub fn contract_violation(endpoint: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ContractViolation {
            endpoint: endpoint.into(),
            field: field.into(),
        }
    }

    /// Creates a new file-system error.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a new hash-computation error.
    pub fn hash_computation(reason: impl Into<String>) -> Self {
        Self::HashComputation {
            reason: reason.into(),
        }
    }

    /// Creates a new tree error.
    pub fn tree(reason: impl Into<String>) -> Self {
        Self::Tree {
            reason: reason.into(),
        }
    }

    /// Creates a new chat-unavailable error.
    pub fn chat_unavailable(project_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ChatUnavailable {
            project_id: project_id.into(),
            status: status.into(),
        }
    }

    /// Returns true if this error represents a transport-level failure
    /// (as opposed to a file-system or internal logic error).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::ServerStatus { .. } | Self::ContractViolation { .. }
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialization { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let transport = SyncError::transport("/api/check", "connection refused");
        assert!(matches!(transport, SyncError::Transport { .. }));
        assert!(transport.is_transport());

        let fs_error = SyncError::file_system(
            "/tmp/test",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(matches!(fs_error, SyncError::FileSystem { .. }));
        assert!(!fs_error.is_transport());
    }

    #[test]
    fn test_error_display() {
        let error = SyncError::contract_violation("/api/local-projects/check", "project");
        let message = error.to_string();
        assert!(message.contains("missing required field 'project'"));
        assert!(message.contains("/api/local-projects/check"));
    }

    #[test]
    fn test_chat_unavailable_display() {
        let error = SyncError::chat_unavailable("proj-1", "processing");
        assert!(error.to_string().contains("proj-1"));
        assert!(error.to_string().contains("processing"));
    }
}
