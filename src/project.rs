// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Project data model.

use serde::{Deserialize, Serialize};

/// The server's view of an ingestion's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    /// Created but not yet started.
    Pending,
    /// Actively ingesting.
    Processing,
    /// Finished successfully; chat is available.
    Completed,
    /// Terminated with an error; re-enterable via retry.
    Failed,
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Processing => "processing",
            IngestionStatus::Completed => "completed",
            IngestionStatus::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Remote-assigned, locally-cached information about a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalProjectInfo {
    /// Server-assigned opaque identifier.
    pub project_id: String,
    /// `ProjectIdentity::as_str()` at creation time.
    pub local_hash: String,
    /// Display name of the folder.
    pub folder_name: String,
    /// Display path of the folder.
    pub folder_path: String,
    /// Current lifecycle status.
    pub ingestion_status: IngestionStatus,
    /// Total files expected.
    pub total_files: u64,
    /// Files processed so far.
    pub processed_files: u64,
    /// Total chunks produced so far.
    pub total_chunks: u64,
    /// The failure reason, when `ingestion_status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_status_display() {
        assert_eq!(IngestionStatus::Processing.to_string(), "processing");
    }

    #[test]
    fn test_round_trip_serialization() {
        let info = LocalProjectInfo {
            project_id: "p1".to_string(),
            local_hash: "h1".to_string(),
            folder_name: "app".to_string(),
            folder_path: "/a/app".to_string(),
            ingestion_status: IngestionStatus::Completed,
            total_files: 10,
            processed_files: 10,
            total_chunks: 42,
            error: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        let parsed: LocalProjectInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, parsed);
    }
}
