// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Chat session gateway: tracks whether chat is usable for the active
//! project and proxies message send/history/delete calls to the backend.
//!
//! Availability follows the orchestrator's event stream rather than being
//! polled: a project is chat-ready exactly when it is the active project
//! and its ingestion status is `completed`.

use crate::error::{Result, SyncError};
use crate::events::{AvailabilityChanged, OrchestratorEvent, StreamEvent};
use crate::models::ModelService;
use crate::orchestrator::SyncOrchestrator;
use crate::project::IngestionStatus;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

/// One exchange participant in a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

/// A code edit the assistant proposed or applied as part of a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    /// The file the edit applies to.
    pub path: String,
    /// The content before the edit.
    pub before: String,
    /// The content after the edit.
    pub after: String,
}

/// One message within a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned message id.
    pub id: String,
    /// Who sent it.
    pub role: Role,
    /// The message text.
    pub content: String,
    /// Milliseconds since epoch.
    pub created_at: i64,
    /// Edits the assistant attached to this message, if any.
    #[serde(default)]
    pub edits: Vec<Edit>,
}

/// A persisted chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Server-assigned session id.
    pub id: String,
    /// The project this session belongs to.
    pub project_id: String,
    /// A display title, usually derived from the first message.
    pub title: String,
    /// Milliseconds since epoch.
    pub created_at: i64,
    /// Milliseconds since epoch.
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    project_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    session_id: String,
    message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionsResponse {
    sessions: Vec<ChatSession>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionHistoryResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct DeleteSessionResponse {
    #[allow(dead_code)]
    ok: bool,
}

/// Tracks chat availability for the orchestrator's active project and
/// proxies chat operations to the backend.
pub struct ChatGateway {
    orchestrator: Arc<SyncOrchestrator>,
    model_service: Arc<dyn ModelService>,
    is_available: RwLock<bool>,
    current_project_id: RwLock<Option<String>>,
    availability_events: broadcast::Sender<AvailabilityChanged>,
}

impl ChatGateway {
    /// Builds a gateway bound to `orchestrator` and starts watching its
    /// event stream. Subscribing happens synchronously before the watcher
    /// task is spawned, so no event emitted after this call is missed.
    #[must_use]
    pub fn new(orchestrator: Arc<SyncOrchestrator>, model_service: Arc<dyn ModelService>) -> Arc<Self> {
        let (availability_events, _) = broadcast::channel(32);
        let gateway = Arc::new(Self {
            orchestrator: orchestrator.clone(),
            model_service,
            is_available: RwLock::new(false),
            current_project_id: RwLock::new(None),
            availability_events,
        });

        let mut events = orchestrator.subscribe();
        let watcher = gateway.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                watcher.handle_event(event).await;
            }
        });

        gateway
    }

    /// Subscribes to availability transitions. Fires only on a flip, never
    /// on every event that happens to leave availability unchanged.
    #[must_use]
    pub fn subscribe_availability(&self) -> broadcast::Receiver<AvailabilityChanged> {
        self.availability_events.subscribe()
    }

    /// Whether chat is currently usable.
    pub async fn is_available(&self) -> bool {
        *self.is_available.read().await
    }

    /// The project id chat would currently target, if any.
    pub async fn current_project_id(&self) -> Option<String> {
        self.current_project_id.read().await.clone()
    }

    async fn handle_event(&self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::ProjectChanged(project) => {
                let project_id = project.as_ref().map(|p| p.project_id.clone());
                *self.current_project_id.write().await = project_id;
                let available = project
                    .as_ref()
                    .is_some_and(|p| p.ingestion_status == IngestionStatus::Completed);
                self.set_availability(available).await;
            }
            OrchestratorEvent::IngestionComplete { project_id } => {
                if self.is_current_project(&project_id).await {
                    self.set_availability(true).await;
                }
            }
            OrchestratorEvent::IngestionError { project_id, .. } => {
                if self.is_current_project(&project_id).await {
                    self.set_availability(false).await;
                }
            }
            OrchestratorEvent::IngestionProgress { .. } => {}
        }
    }

    async fn is_current_project(&self, project_id: &str) -> bool {
        self.current_project_id.read().await.as_deref() == Some(project_id)
    }

    async fn set_availability(&self, available: bool) {
        let mut guard = self.is_available.write().await;
        if *guard != available {
            *guard = available;
            let _ = self
                .availability_events
                .send(AvailabilityChanged { is_available: available });
        }
    }

    async fn require_available(&self) -> Result<String> {
        let project_id = self
            .current_project_id
            .read()
            .await
            .clone()
            .ok_or(SyncError::NoActiveProject)?;
        if !*self.is_available.read().await {
            return Err(SyncError::chat_unavailable(project_id, "not completed"));
        }
        Ok(project_id)
    }

    async fn resolve_model(&self, model_id: Option<&str>) -> String {
        match model_id {
            Some(id) => id.to_string(),
            None => self.model_service.default_model_id().await,
        }
    }

    /// Sends `message` to the active project's chat, returning the session
    /// id (new or continued) and the assistant's reply.
    pub async fn send_message(
        &self,
        message: &str,
        model_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<(String, ChatMessage)> {
        let project_id = self.require_available().await?;
        let client = self.orchestrator.http_client().await?;
        let resolved_model = self.resolve_model(model_id).await;
        let req = SendMessageRequest {
            project_id: &project_id,
            message,
            model_id: Some(&resolved_model),
            session_id,
        };
        let resp: SendMessageResponse = client.post("/api/custom-chat/send", &req).await?;
        Ok((resp.session_id, resp.message))
    }

    /// Sends `message` to the active project's chat and streams the reply
    /// as Server-Sent Events.
    pub async fn send_message_stream(
        &self,
        message: &str,
        model_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<impl Stream<Item = StreamEvent> + Send> {
        let project_id = self.require_available().await?;
        let client = self.orchestrator.http_client().await?;
        let resolved_model = self.resolve_model(model_id).await;
        let req = SendMessageRequest {
            project_id: &project_id,
            message,
            model_id: Some(&resolved_model),
            session_id,
        };
        let response = client.post_stream("/api/custom-chat/send-stream", &req).await?;
        Ok(sse_event_stream(response))
    }

    /// Lists the chat sessions recorded for `project_id`.
    pub async fn get_sessions(&self, project_id: &str) -> Result<Vec<ChatSession>> {
        let client = self.orchestrator.http_client().await?;
        let path = format!("/api/custom-chat/sessions/{project_id}");
        let resp: SessionsResponse = client.get(&path).await?;
        Ok(resp.sessions)
    }

    /// Fetches the full message history for `session_id`.
    pub async fn get_session_history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let client = self.orchestrator.http_client().await?;
        let path = format!("/api/custom-chat/history/{session_id}");
        let resp: SessionHistoryResponse = client.get(&path).await?;
        Ok(resp.messages)
    }

    /// Deletes `session_id` and its history.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let client = self.orchestrator.http_client().await?;
        let path = format!("/api/custom-chat/sessions/{session_id}");
        let _: DeleteSessionResponse = client.delete(&path).await?;
        Ok(())
    }
}

struct StreamState {
    response: reqwest::Response,
    pending_bytes: Vec<u8>,
    text: String,
    done: bool,
}

fn sse_event_stream(response: reqwest::Response) -> impl Stream<Item = StreamEvent> + Send {
    let state = StreamState {
        response,
        pending_bytes: Vec::new(),
        text: String::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            if let Some(frame_end) = state.text.find("\n\n") {
                let frame = state.text[..frame_end].to_string();
                state.text.drain(..frame_end + 2);
                match parse_sse_frame(&frame) {
                    Some(event) => {
                        if matches!(event, StreamEvent::Complete { .. } | StreamEvent::Error { .. }) {
                            state.done = true;
                        }
                        return Some((event, state));
                    }
                    None => continue,
                }
            }

            match state.response.chunk().await {
                Ok(Some(bytes)) => append_chunk(&mut state, &bytes),
                Ok(None) => {
                    state.done = true;
                    let remainder = std::mem::take(&mut state.text);
                    if remainder.trim().is_empty() {
                        return None;
                    }
                    return parse_sse_frame(&remainder).map(|event| (event, state));
                }
                Err(error) => {
                    state.done = true;
                    return Some((StreamEvent::Error { message: error.to_string() }, state));
                }
            }
        }
    })
}

/// Appends raw bytes to `state`, decoding as much valid UTF-8 as is
/// available and holding the rest back across the chunk boundary until
/// enough bytes arrive to complete the sequence.
fn append_chunk(state: &mut StreamState, bytes: &[u8]) {
    state.pending_bytes.extend_from_slice(bytes);
    match std::str::from_utf8(&state.pending_bytes) {
        Ok(valid) => {
            state.text.push_str(valid);
            state.pending_bytes.clear();
        }
        Err(error) => {
            let valid_len = error.valid_up_to();
            if valid_len > 0 {
                let valid = std::str::from_utf8(&state.pending_bytes[..valid_len])
                    .expect("valid_up_to guarantees this slice is valid UTF-8");
                state.text.push_str(valid);
                state.pending_bytes.drain(..valid_len);
            }
        }
    }
}

fn parse_sse_frame(frame: &str) -> Option<StreamEvent> {
    let data: String = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamEvent>(&data) {
        Ok(event) => Some(event),
        Err(error) => {
            warn!(%error, "unparseable stream event, surfacing as error event");
            Some(StreamEvent::Error {
                message: format!("unparseable stream event: {data}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaticModelService;
    use crate::project::LocalProjectInfo;
    use crate::tree::FixedClock;
    use crate::workspace::{LocalFsFileService, LocalFsWorkspace};
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path as wm_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completed_project(id: &str) -> LocalProjectInfo {
        LocalProjectInfo {
            project_id: id.to_string(),
            local_hash: "hash".to_string(),
            folder_name: "app".to_string(),
            folder_path: "/tmp/app".to_string(),
            ingestion_status: IngestionStatus::Completed,
            total_files: 1,
            processed_files: 1,
            total_chunks: 1,
            error: None,
        }
    }

    fn processing_project(id: &str) -> LocalProjectInfo {
        let mut project = completed_project(id);
        project.ingestion_status = IngestionStatus::Processing;
        project
    }

    fn test_orchestrator(dir: &std::path::Path) -> Arc<SyncOrchestrator> {
        Arc::new(SyncOrchestrator::new(
            Arc::new(LocalFsWorkspace::new(dir)),
            Arc::new(LocalFsFileService),
            "user-1",
            Arc::new(FixedClock(0)),
        ))
    }

    async fn wait_until(gateway: &ChatGateway, available: bool) {
        for _ in 0..100 {
            if gateway.is_available().await == available {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("gateway never reached availability={available}");
    }

    #[tokio::test]
    async fn test_availability_follows_completed_project() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let gateway = ChatGateway::new(orchestrator, Arc::new(StaticModelService));

        gateway
            .handle_event(OrchestratorEvent::ProjectChanged(Some(completed_project("p1"))))
            .await;

        assert!(gateway.is_available().await);
        assert_eq!(gateway.current_project_id().await, Some("p1".to_string()));
    }

    #[tokio::test]
    async fn test_availability_false_while_processing() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let gateway = ChatGateway::new(orchestrator, Arc::new(StaticModelService));

        gateway
            .handle_event(OrchestratorEvent::ProjectChanged(Some(processing_project("p1"))))
            .await;

        assert!(!gateway.is_available().await);
    }

    #[tokio::test]
    async fn test_availability_change_fires_only_on_flip() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let gateway = ChatGateway::new(orchestrator, Arc::new(StaticModelService));
        let mut rx = gateway.subscribe_availability();

        gateway
            .handle_event(OrchestratorEvent::ProjectChanged(Some(completed_project("p1"))))
            .await;
        let event = rx.recv().await.unwrap();
        assert!(event.is_available);

        gateway
            .handle_event(OrchestratorEvent::IngestionComplete { project_id: "p1".to_string() })
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_without_active_project_errors() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let gateway = ChatGateway::new(orchestrator, Arc::new(StaticModelService));

        let err = gateway.send_message("hi", None, None).await.unwrap_err();
        assert!(matches!(err, SyncError::NoActiveProject));
    }

    #[tokio::test]
    async fn test_send_message_errors_while_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let gateway = ChatGateway::new(orchestrator, Arc::new(StaticModelService));

        gateway
            .handle_event(OrchestratorEvent::ProjectChanged(Some(processing_project("p1"))))
            .await;

        let err = gateway.send_message("hi", None, None).await.unwrap_err();
        assert!(matches!(err, SyncError::ChatUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_send_message_succeeds_once_project_completes() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(wm_path("/api/local-projects/check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "exists": true,
                "project": {
                    "projectId": "proj-1",
                    "localHash": "hash-1",
                    "folderName": "app",
                    "folderPath": dir.path().to_string_lossy(),
                    "ingestionStatus": "completed",
                    "totalFiles": 0,
                    "processedFiles": 0,
                    "totalChunks": 0
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(wm_path("/api/projects/proj-1/merkle-sync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "needsFiles": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(wm_path("/api/custom-chat/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sessionId": "sess-1",
                "message": { "id": "m1", "role": "assistant", "content": "hello", "createdAt": 0, "edits": [] }
            })))
            .mount(&server)
            .await;

        let orchestrator = test_orchestrator(dir.path());
        let gateway = ChatGateway::new(orchestrator.clone(), Arc::new(StaticModelService));
        orchestrator.initialize(server.uri(), "test-token").await.unwrap();

        wait_until(&gateway, true).await;

        let (session_id, message) = gateway.send_message("hi", None, None).await.unwrap();
        assert_eq!(session_id, "sess-1");
        assert_eq!(message.content, "hello");
        assert_eq!(message.role, Role::Assistant);
    }

    #[test]
    fn test_parse_sse_frame_decodes_typed_events() {
        let event = parse_sse_frame("data: {\"type\":\"response\",\"content\":\"hi\"}").unwrap();
        assert_eq!(event, StreamEvent::Response { content: "hi".to_string() });
    }

    #[test]
    fn test_parse_sse_frame_ignores_blank_frames() {
        assert!(parse_sse_frame("").is_none());
        assert!(parse_sse_frame("\n").is_none());
    }

    #[tokio::test]
    async fn test_sse_event_stream_parses_split_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wm_path("/stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(
                        "data: {\"type\":\"start\"}\n\ndata: {\"type\":\"response\",\"content\":\"hi\"}\n\ndata: {\"type\":\"complete\"}\n\n",
                        "text/event-stream",
                    ),
            )
            .mount(&server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/stream", server.uri()))
            .send()
            .await
            .unwrap();

        let events: Vec<StreamEvent> = sse_event_stream(response).collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Start { session_id: None },
                StreamEvent::Response { content: "hi".to_string() },
                StreamEvent::Complete { session_id: None },
            ]
        );
    }
}
