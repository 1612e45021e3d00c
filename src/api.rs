// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Wire DTOs for the HTTP API consumed by the sync orchestrator and chat gateway.
//!
//! Kept separate from the domain types in [`crate::project`],
//! [`crate::tree`], and [`crate::diff`] so a change to the wire format
//! never has to ripple through the orchestrator's internal state shapes.

use crate::diff::{Change, DiffSummary};
use crate::project::{IngestionStatus, LocalProjectInfo};
use crate::tree::MerkleNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `POST /api/local-projects/check` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckProjectRequest<'a> {
    pub folder_path: &'a str,
    pub folder_name: &'a str,
}

/// `POST /api/local-projects/check` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckProjectResponse {
    pub exists: bool,
    #[serde(default)]
    pub project: Option<LocalProjectInfo>,
}

/// `POST /api/local-projects/create` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest<'a> {
    pub folder_path: &'a str,
    pub folder_name: &'a str,
}

/// `POST /api/local-projects/create` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectResponse {
    pub project_id: String,
    pub local_hash: String,
}

/// `GET /api/local-projects/:id/status` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectStatusResponse {
    pub project: LocalProjectInfo,
}

/// `POST /api/local-ingest/:id/init` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitIngestionRequest<'a> {
    pub total_files: u64,
    pub merkle_tree: &'a MerkleNode,
}

/// `POST /api/local-ingest/:id/init` response.
#[derive(Debug, Clone, Deserialize)]
pub struct InitIngestionResponse {
    pub ok: bool,
}

/// A single file within a `POST /api/local-ingest/:id/files` batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
    pub size: u64,
    pub last_modified: i64,
}

/// `POST /api/local-ingest/:id/files` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatchRequest<'a> {
    pub files: Vec<BatchFile<'a>>,
    pub batch_index: usize,
    pub total_batches: usize,
}

/// `POST /api/local-ingest/:id/files` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatchResponse {
    pub total_processed: u64,
    pub total_chunks: u64,
    pub is_complete: bool,
}

/// `GET /api/local-ingest/:id/progress` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub status: IngestionStatus,
    pub progress: crate::events::IngestionProgress,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/local-ingest/:id/merkle` response, and the body of `PUT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTreeEnvelope {
    pub merkle_tree: MerkleNode,
}

/// `PUT /api/local-ingest/:id/merkle` response.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMerkleResponse {
    pub ok: bool,
}

/// `POST /api/projects/:id/merkle-sync` phase-1 request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleSyncPhase1Request<'a> {
    pub merkle_tree: &'a MerkleNode,
}

/// `POST /api/projects/:id/merkle-sync` phase-1 response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleSyncPhase1Response {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub summary: DiffSummary,
    pub needs_files: Vec<String>,
}

/// One file's content, keyed by path, in a phase-2 request.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTwoFile<'a> {
    pub content: &'a str,
}

/// `POST /api/projects/:id/merkle-sync` phase-2 request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleSyncPhase2Request<'a> {
    pub merkle_tree: &'a MerkleNode,
    pub files: BTreeMap<&'a str, PhaseTwoFile<'a>>,
}

/// `POST /api/projects/:id/merkle-sync` phase-2 response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleSyncPhase2Response {
    pub files_processed: u64,
    pub files_deleted: u64,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub summary: DiffSummary,
}
