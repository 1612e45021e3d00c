// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Event types for the orchestrator and chat gateway.
//!
//! Progress and availability are modeled as observable event streams with
//! single-writer/multi-reader semantics, backed by
//! [`tokio::sync::broadcast`]; one-shot operations stay request/response.

use crate::project::LocalProjectInfo;
use serde::{Deserialize, Serialize};

/// A progress sample, as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionProgress {
    /// Total files expected.
    pub total: u64,
    /// Files processed so far, per the server's `totalProcessed`/`processed`
    /// field — never a client-side counter.
    pub processed: u64,
    /// Chunks produced so far.
    pub chunks: u64,
    /// Percent complete, as reported by the server.
    pub percent: f64,
}

/// Events fired by the sync orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    /// The active project changed, or was cleared (`None`).
    ProjectChanged(Option<LocalProjectInfo>),
    /// A progress sample for `project_id`.
    IngestionProgress {
        /// The project the progress applies to.
        project_id: String,
        /// The sample itself.
        progress: IngestionProgress,
    },
    /// Ingestion for `project_id` finished successfully.
    IngestionComplete {
        /// The project that completed.
        project_id: String,
    },
    /// Ingestion for `project_id` failed.
    IngestionError {
        /// The project that failed.
        project_id: String,
        /// A human-readable description of the failure.
        error: String,
    },
}

/// Fired by the chat gateway whenever availability flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityChanged {
    /// Whether chat is now available.
    pub is_available: bool,
}

/// One Server-Sent Event from `/api/custom-chat/send-stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// The stream has begun.
    #[serde(rename_all = "camelCase")]
    Start {
        /// The session this stream belongs to.
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// An incremental or final reply fragment.
    Response {
        /// The reply text (a fragment, or the whole reply for single-shot
        /// events — the server's framing, passed through opaquely).
        content: String,
    },
    /// The stream finished.
    #[serde(rename_all = "camelCase")]
    Complete {
        /// The session this stream belongs to.
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// A transport or parse error terminated the stream.
    Error {
        /// A human-readable description of the failure.
        message: String,
    },
}
