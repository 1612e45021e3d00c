// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Client-side Merkle-based incremental ingestion and sync core for an
//! AI-assisted code editor.
//!
//! This crate computes a stable project identity for a local folder,
//! builds a content-addressed Merkle tree of its source files, diffs that
//! tree against a previous snapshot, and drives a two-phase sync protocol
//! (full ingestion, or incremental merkle-sync) against a backend. A chat
//! gateway exposes a session API whose availability tracks the active
//! project's ingestion status.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod chat;
pub mod collector;
pub mod diff;
pub mod error;
pub mod events;
pub mod hash;
pub mod http;
pub mod identity;
pub mod models;
pub mod orchestrator;
pub mod project;
pub mod tree;
pub mod workspace;

pub use chat::{ChatGateway, ChatMessage, ChatSession, Edit, Role};
pub use diff::{Change, DiffResult, DiffSummary};
pub use error::{Result, SyncError};
pub use events::{AvailabilityChanged, IngestionProgress, OrchestratorEvent};
pub use hash::hash_bytes;
pub use identity::ProjectIdentity;
pub use orchestrator::{MerkleSyncOutcome, SyncOrchestrator};
pub use project::{IngestionStatus, LocalProjectInfo};
pub use tree::{MerkleNode, NodeType};
pub use workspace::{FileService, LocalFsFileService, LocalFsWorkspace, Workspace};
