// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! The sync orchestrator: drives project discovery, full ingestion, and
//! incremental merkle-sync against the backend, and exposes the resulting
//! state as a broadcast event stream.

use crate::api::{
    BatchFile, CheckProjectRequest, CheckProjectResponse, CreateProjectRequest,
    CreateProjectResponse, InitIngestionRequest, InitIngestionResponse, MerkleSyncPhase1Request,
    MerkleSyncPhase1Response, MerkleSyncPhase2Request, MerkleSyncPhase2Response,
    MerkleTreeEnvelope, PhaseTwoFile, ProgressResponse, ProjectStatusResponse,
    UpdateMerkleResponse, UploadBatchRequest, UploadBatchResponse,
};
use crate::collector;
use crate::diff::{Change, DiffSummary};
use crate::error::{Result, SyncError};
use crate::events::{IngestionProgress, OrchestratorEvent};
use crate::identity::ProjectIdentity;
use crate::http::{Config, HttpClient};
use crate::project::{IngestionStatus, LocalProjectInfo};
use crate::tree::{build_tree, Clock, MerkleNode};
use crate::workspace::{base_name, FileService, Workspace};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

const BATCH_SIZE: usize = 20;
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The outcome of a standalone merkle-sync call.
#[derive(Debug, Clone, PartialEq)]
pub struct MerkleSyncOutcome {
    /// The changes the server reported (phase-1 view, or phase-2 if present).
    pub changes: Vec<Change>,
    /// The tallied diff summary.
    pub summary: DiffSummary,
    /// Files the server says it processed, when phase 2 ran.
    pub files_processed: Option<u64>,
    /// Files the server says it deleted, when phase 2 ran.
    pub files_deleted: Option<u64>,
}

/// Coordinates project discovery, ingestion, and merkle-sync for a single
/// workspace against one backend.
pub struct SyncOrchestrator {
    workspace: Arc<dyn Workspace>,
    file_service: Arc<dyn FileService>,
    user_id: String,
    clock: Arc<dyn Clock>,
    http: RwLock<Option<HttpClient>>,
    active_project: RwLock<Option<LocalProjectInfo>>,
    current_merkle_tree: RwLock<Option<MerkleNode>>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator for `workspace`, reading files through
    /// `file_service` and identifying the user as `user_id`.
    #[must_use]
    pub fn new(
        workspace: Arc<dyn Workspace>,
        file_service: Arc<dyn FileService>,
        user_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            workspace,
            file_service,
            user_id: user_id.into(),
            clock,
            http: RwLock::new(None),
            active_project: RwLock::new(None),
            current_merkle_tree: RwLock::new(None),
            events,
        }
    }

    /// Subscribes to orchestrator events. Every subscriber receives every
    /// event sent after it subscribes; none are replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// The currently active project, if one has been adopted.
    pub async fn active_project(&self) -> Option<LocalProjectInfo> {
        self.active_project.read().await.clone()
    }

    /// The merkle tree computed during the most recent ingestion or sync.
    pub async fn current_merkle_tree(&self) -> Option<MerkleNode> {
        self.current_merkle_tree.read().await.clone()
    }

    /// Points the orchestrator at a backend and immediately checks the
    /// workspace's first root for an existing or new project.
    pub async fn initialize(
        &self,
        backend_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<()> {
        self.connect(backend_url, auth_token).await;
        self.check_and_ingest_workspace().await
    }

    /// Sets the backend URL and auth token without touching the workspace.
    /// Used by callers that only need request/response operations
    /// (status, retry, merkle fetch) against a known project id.
    pub async fn connect(&self, backend_url: impl Into<String>, auth_token: impl Into<String>) {
        let config = Config {
            backend_url: backend_url.into(),
            auth_token: auth_token.into(),
        };
        *self.http.write().await = Some(HttpClient::new(config));
    }

    /// Looks at the workspace's roots and adopts (or clears) the active
    /// project accordingly.
    pub async fn check_and_ingest_workspace(&self) -> Result<()> {
        match self.workspace.roots().into_iter().next() {
            None => {
                self.set_active_project(None).await;
                self.emit(OrchestratorEvent::ProjectChanged(None));
                Ok(())
            }
            Some(root) => self.ingest_folder(&root).await,
        }
    }

    /// Checks the server for `uri`'s project, then drives it through
    /// creation, full ingestion, merkle-sync, or polling as appropriate.
    #[instrument(skip(self))]
    pub async fn ingest_folder(&self, uri: &str) -> Result<()> {
        let client = self.http_client().await?;
        let (folder_name, folder_path) = derive_name_and_path(uri);
        let identity = ProjectIdentity::compute(&self.user_id, &folder_path, &folder_name);

        let check_req = CheckProjectRequest {
            folder_path: &folder_path,
            folder_name: &folder_name,
        };
        let check_resp: CheckProjectResponse = self
            .post_or_emit_error(&client, "/api/local-projects/check", &check_req, identity.as_str())
            .await?;

        if !check_resp.exists {
            let create_req = CreateProjectRequest {
                folder_path: &folder_path,
                folder_name: &folder_name,
            };
            let create_resp: CreateProjectResponse = self
                .post_or_emit_error(
                    &client,
                    "/api/local-projects/create",
                    &create_req,
                    identity.as_str(),
                )
                .await?;

            let mut project = LocalProjectInfo {
                project_id: create_resp.project_id,
                local_hash: create_resp.local_hash,
                folder_name,
                folder_path,
                ingestion_status: IngestionStatus::Pending,
                total_files: 0,
                processed_files: 0,
                total_chunks: 0,
                error: None,
            };
            self.adopt(project.clone()).await;
            self.run_full_ingestion(&client, &mut project, uri).await?;
            return Ok(());
        }

        let project = check_resp
            .project
            .ok_or_else(|| SyncError::contract_violation("/api/local-projects/check", "project"))?;
        self.adopt(project.clone()).await;

        match project.ingestion_status {
            IngestionStatus::Completed => {
                self.run_merkle_sync(&client, &project.project_id, uri)
                    .await?;
                Ok(())
            }
            IngestionStatus::Processing => self.run_polling(&client, &project.project_id).await,
            IngestionStatus::Failed => {
                debug!(project_id = %project.project_id, "ingestion previously failed; awaiting retry");
                Ok(())
            }
            IngestionStatus::Pending => {
                let mut project = project;
                self.run_full_ingestion(&client, &mut project, uri).await
            }
        }
    }

    /// Fetches the server's current view of `project_id`.
    pub async fn get_project_status(&self, project_id: &str) -> Result<LocalProjectInfo> {
        let client = self.http_client().await?;
        let path = format!("/api/local-projects/{project_id}/status");
        let resp: ProjectStatusResponse = client.get(&path).await?;
        Ok(resp.project)
    }

    /// Asks the server to retry a failed ingestion, then re-checks the
    /// workspace. Treats any 2xx as success, regardless of body shape.
    pub async fn retry_ingestion(&self, project_id: &str) -> Result<()> {
        let client = self.http_client().await?;
        let path = format!("/api/local-ingest/{project_id}/retry");
        client.post_status(&path).await?;
        self.check_and_ingest_workspace().await
    }

    /// Fetches the server's stored merkle tree for `project_id`.
    pub async fn get_merkle_tree(&self, project_id: &str) -> Result<MerkleNode> {
        let client = self.http_client().await?;
        let path = format!("/api/local-ingest/{project_id}/merkle");
        let resp: MerkleTreeEnvelope = client.get(&path).await?;
        Ok(resp.merkle_tree)
    }

    /// Pushes a merkle tree to the server as the new baseline for `project_id`.
    pub async fn update_merkle_tree(&self, project_id: &str, tree: &MerkleNode) -> Result<()> {
        let client = self.http_client().await?;
        let path = format!("/api/local-ingest/{project_id}/merkle");
        let body = MerkleTreeEnvelope {
            merkle_tree: tree.clone(),
        };
        let _: UpdateMerkleResponse = client.put(&path, &body).await?;
        *self.current_merkle_tree.write().await = Some(tree.clone());
        Ok(())
    }

    /// Runs a standalone two-phase merkle-sync against `project_id` for the
    /// folder at `uri`, independent of the project-discovery flow.
    pub async fn sync_with_merkle(&self, project_id: &str, uri: &str) -> Result<MerkleSyncOutcome> {
        let client = self.http_client().await?;
        self.run_merkle_sync(&client, project_id, uri).await
    }

    pub async fn http_client(&self) -> Result<HttpClient> {
        self.http
            .read()
            .await
            .clone()
            .ok_or(SyncError::NotInitialized)
    }

    async fn adopt(&self, project: LocalProjectInfo) {
        self.set_active_project(Some(project.clone())).await;
        self.emit(OrchestratorEvent::ProjectChanged(Some(project)));
    }

    async fn set_active_project(&self, project: Option<LocalProjectInfo>) {
        *self.active_project.write().await = project;
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.events.send(event);
    }

    async fn post_or_emit_error<B, T>(
        &self,
        client: &HttpClient,
        path: &str,
        body: &B,
        project_id: &str,
    ) -> Result<T>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        client.post(path, body).await.map_err(|e| {
            self.emit(OrchestratorEvent::IngestionError {
                project_id: project_id.to_string(),
                error: e.to_string(),
            });
            e
        })
    }

    /// Posts a single ingestion batch.
    #[instrument(skip(self, client, path, batch), fields(project_id = %project_id, batch_index = index, total_batches))]
    async fn upload_batch(
        &self,
        client: &HttpClient,
        path: &str,
        project_id: &str,
        batch: &[crate::tree::FileInput],
        index: usize,
        total_batches: usize,
    ) -> Result<UploadBatchResponse> {
        let batch_files: Vec<BatchFile> = batch
            .iter()
            .map(|f| BatchFile {
                path: &f.path,
                content: &f.content,
                size: f.size.unwrap_or(f.content.len() as u64),
                last_modified: f.last_modified.unwrap_or_else(|| self.clock.now_millis()),
            })
            .collect();
        let req = UploadBatchRequest {
            files: batch_files,
            batch_index: index,
            total_batches,
        };
        self.post_or_emit_error(client, path, &req, project_id).await
    }

    /// Collects files, builds the tree, initializes ingestion, and uploads
    /// the collected files in fixed-size batches until the server reports
    /// completion.
    #[instrument(skip(self, client, project, uri), fields(project_id = %project.project_id))]
    async fn run_full_ingestion(
        &self,
        client: &HttpClient,
        project: &mut LocalProjectInfo,
        uri: &str,
    ) -> Result<()> {
        let files = collector::collect_files(self.file_service.as_ref(), uri).await;
        let tree = build_tree(&files, self.clock.as_ref())?;
        let total_files = files.len() as u64;

        let init_path = format!("/api/local-ingest/{}/init", project.project_id);
        let init_req = InitIngestionRequest {
            total_files,
            merkle_tree: &tree,
        };
        let _: InitIngestionResponse = self
            .post_or_emit_error(client, &init_path, &init_req, &project.project_id)
            .await?;

        project.ingestion_status = IngestionStatus::Processing;
        project.total_files = total_files;
        self.set_active_project(Some(project.clone())).await;

        let batches: Vec<&[crate::tree::FileInput]> = files.chunks(BATCH_SIZE).collect();
        let total_batches = batches.len();

        if total_batches == 0 {
            project.ingestion_status = IngestionStatus::Completed;
            self.set_active_project(Some(project.clone())).await;
            self.emit(OrchestratorEvent::IngestionComplete {
                project_id: project.project_id.clone(),
            });
            *self.current_merkle_tree.write().await = Some(tree);
            return Ok(());
        }

        let files_path = format!("/api/local-ingest/{}/files", project.project_id);
        for (index, batch) in batches.into_iter().enumerate() {
            let resp = self
                .upload_batch(client, &files_path, &project.project_id, batch, index, total_batches)
                .await?;

            project.processed_files = resp.total_processed;
            project.total_chunks = resp.total_chunks;
            self.set_active_project(Some(project.clone())).await;

            let percent = if total_files > 0 {
                (resp.total_processed as f64 / total_files as f64) * 100.0
            } else {
                100.0
            };
            self.emit(OrchestratorEvent::IngestionProgress {
                project_id: project.project_id.clone(),
                progress: IngestionProgress {
                    total: total_files,
                    processed: resp.total_processed,
                    chunks: resp.total_chunks,
                    percent,
                },
            });

            if resp.is_complete {
                project.ingestion_status = IngestionStatus::Completed;
                self.set_active_project(Some(project.clone())).await;
                self.emit(OrchestratorEvent::IngestionComplete {
                    project_id: project.project_id.clone(),
                });
                break;
            }
        }

        *self.current_merkle_tree.write().await = Some(tree);
        Ok(())
    }

    /// Fetches one progress sample. `Err(())` means the poll failed and
    /// polling should stop silently.
    #[instrument(skip(self, client), fields(project_id = %project_id))]
    async fn poll_once(&self, client: &HttpClient, project_id: &str) -> std::result::Result<ProgressResponse, ()> {
        let path = format!("/api/local-ingest/{project_id}/progress");
        client.get(&path).await.map_err(|e| {
            warn!(project_id, error = %e, "progress poll failed; stopping");
        })
    }

    /// Polls `/progress` every [`POLL_INTERVAL`] until the server reports a
    /// terminal status. A transport failure ends polling silently rather
    /// than retrying indefinitely.
    #[instrument(skip(self, client), fields(project_id = %project_id))]
    async fn run_polling(&self, client: &HttpClient, project_id: &str) -> Result<()> {
        loop {
            let resp = match self.poll_once(client, project_id).await {
                Ok(r) => r,
                Err(()) => return Ok(()),
            };

            self.emit(OrchestratorEvent::IngestionProgress {
                project_id: project_id.to_string(),
                progress: resp.progress,
            });

            if resp.status != IngestionStatus::Processing {
                if let Some(mut project) = self.active_project().await {
                    project.ingestion_status = resp.status;
                    project.processed_files = resp.progress.processed;
                    project.total_files = resp.progress.total;
                    project.total_chunks = resp.progress.chunks;
                    project.error = resp.error.clone();
                    self.set_active_project(Some(project)).await;
                }
                match resp.status {
                    IngestionStatus::Completed => {
                        self.emit(OrchestratorEvent::IngestionComplete {
                            project_id: project_id.to_string(),
                        });
                    }
                    IngestionStatus::Failed => {
                        self.emit(OrchestratorEvent::IngestionError {
                            project_id: project_id.to_string(),
                            error: resp.error.unwrap_or_default(),
                        });
                    }
                    IngestionStatus::Pending | IngestionStatus::Processing => {}
                }
                return Ok(());
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Runs the two-phase merkle-sync protocol: sends the current tree,
    /// and if the server asks for content, follows up with only the
    /// requested files.
    #[instrument(skip(self, client, uri), fields(project_id = %project_id))]
    async fn run_merkle_sync(
        &self,
        client: &HttpClient,
        project_id: &str,
        uri: &str,
    ) -> Result<MerkleSyncOutcome> {
        let files = collector::collect_files(self.file_service.as_ref(), uri).await;
        let tree = build_tree(&files, self.clock.as_ref())?;
        let content_by_path: HashMap<&str, &str> = files
            .iter()
            .map(|f| (f.path.as_str(), f.content.as_str()))
            .collect();

        let sync_path = format!("/api/projects/{project_id}/merkle-sync");
        let phase1_req = MerkleSyncPhase1Request {
            merkle_tree: &tree,
        };
        let phase1: MerkleSyncPhase1Response = self
            .post_or_emit_error(client, &sync_path, &phase1_req, project_id)
            .await?;

        if phase1.needs_files.is_empty() {
            *self.current_merkle_tree.write().await = Some(tree);
            self.emit(OrchestratorEvent::IngestionComplete {
                project_id: project_id.to_string(),
            });
            return Ok(MerkleSyncOutcome {
                changes: phase1.changes,
                summary: phase1.summary,
                files_processed: None,
                files_deleted: None,
            });
        }

        let mut phase2_files: BTreeMap<&str, PhaseTwoFile> = BTreeMap::new();
        for path in &phase1.needs_files {
            if let Some(content) = content_by_path.get(path.as_str()) {
                phase2_files.insert(path.as_str(), PhaseTwoFile { content });
            } else {
                warn!(project_id, path, "server requested unreadable file; skipping");
            }
        }

        let phase2_req = MerkleSyncPhase2Request {
            merkle_tree: &tree,
            files: phase2_files,
        };
        let phase2: MerkleSyncPhase2Response = self
            .post_or_emit_error(client, &sync_path, &phase2_req, project_id)
            .await?;

        *self.current_merkle_tree.write().await = Some(tree);
        info!(
            project_id,
            processed = phase2.files_processed,
            deleted = phase2.files_deleted,
            "merkle-sync complete"
        );
        self.emit(OrchestratorEvent::IngestionComplete {
            project_id: project_id.to_string(),
        });

        Ok(MerkleSyncOutcome {
            changes: phase2.changes,
            summary: phase2.summary,
            files_processed: Some(phase2.files_processed),
            files_deleted: Some(phase2.files_deleted),
        })
    }
}

fn derive_name_and_path(uri: &str) -> (String, String) {
    let path = uri.strip_prefix("file://").unwrap_or(uri).to_string();
    let name = base_name(uri);
    (name, path)
}
