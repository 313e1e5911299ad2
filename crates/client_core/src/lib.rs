pub mod gateway;

pub use gateway::{
    GatewayError, HttpGatewayOptions, HttpTransformGateway, TransformGateway,
};

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::domain::{ResultArtifact, SelectedFile, SessionStatus, TransformMode};

#[derive(Debug, Default)]
struct SessionState {
    mode: TransformMode,
    selected_file: Option<SelectedFile>,
    status: SessionStatus,
    error_detail: Option<String>,
    result: Option<ResultArtifact>,
}

impl SessionState {
    fn clear_outcome(&mut self) {
        self.status = SessionStatus::Idle;
        self.error_detail = None;
        self.result = None;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            status: self.status,
            selected_file: self.selected_file.as_ref().map(|file| FileSummary {
                name: file.name.clone(),
                size_bytes: file.size_bytes(),
            }),
            error_detail: self.error_detail.clone(),
            result: self.result.as_ref().map(|artifact| ArtifactSummary {
                filename: artifact.filename.clone(),
                content_type: artifact.content_type.clone(),
                size_bytes: artifact.size_bytes(),
            }),
        }
    }
}

/// Cheap, cloneable view of session state pushed to subscribers after every
/// accepted mutation. Artifact bytes stay inside the session; callers fetch
/// them through [`TransformSession::retrieve_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub mode: TransformMode,
    pub status: SessionStatus,
    pub selected_file: Option<FileSummary>,
    pub error_detail: Option<String>,
    pub result: Option<ArtifactSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub name: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// One user-facing transform session: current mode, staged file, and the
/// outcome of the latest run. All mutations funnel through the methods here,
/// and each one holds the state lock while it decides whether to act, so a
/// run already in flight can never be doubled or have its inputs swapped.
pub struct TransformSession {
    session_id: Uuid,
    gateway: Arc<dyn TransformGateway>,
    inner: Mutex<SessionState>,
    state_changes: broadcast::Sender<SessionSnapshot>,
}

impl TransformSession {
    pub fn new(gateway: Arc<dyn TransformGateway>) -> Arc<Self> {
        let (state_changes, _) = broadcast::channel(64);
        Arc::new(Self {
            session_id: Uuid::new_v4(),
            gateway,
            inner: Mutex::new(SessionState::default()),
            state_changes,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.state_changes.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Switch transform direction. Forfeits the staged file and any previous
    /// outcome. Ignored while a run is in flight.
    pub async fn set_mode(&self, mode: TransformMode) {
        let snapshot = {
            let mut state = self.inner.lock().await;
            if state.status == SessionStatus::Processing {
                debug!(
                    session = %self.session_id,
                    "session: mode change ignored while processing"
                );
                return;
            }
            state.mode = mode;
            state.selected_file = None;
            state.clear_outcome();
            info!(
                session = %self.session_id,
                ?mode,
                "session: mode set, selection and outcome cleared"
            );
            state.snapshot()
        };
        let _ = self.state_changes.send(snapshot);
    }

    /// Stage a file for the next run. `None` models a cancelled picker and
    /// leaves everything untouched. Ignored while a run is in flight.
    pub async fn select_file(&self, file: Option<SelectedFile>) {
        let Some(file) = file else {
            debug!(
                session = %self.session_id,
                "session: file selection cancelled, state unchanged"
            );
            return;
        };
        let snapshot = {
            let mut state = self.inner.lock().await;
            if state.status == SessionStatus::Processing {
                debug!(
                    session = %self.session_id,
                    "session: file selection ignored while processing"
                );
                return;
            }
            info!(
                session = %self.session_id,
                file = %file.name,
                bytes = file.size_bytes(),
                "session: file selected"
            );
            state.selected_file = Some(file);
            state.clear_outcome();
            state.snapshot()
        };
        let _ = self.state_changes.send(snapshot);
    }

    /// Run the staged file through the gateway in the current mode. A no-op
    /// when nothing is staged or a run is already in flight; otherwise the
    /// session lands in `Success` with an artifact or `Error` with a
    /// display-ready message, and is immediately usable again either way.
    pub async fn process(&self) {
        let (mode, file, snapshot) = {
            let mut state = self.inner.lock().await;
            if state.status == SessionStatus::Processing {
                debug!(
                    session = %self.session_id,
                    "session: process ignored, a run is already in flight"
                );
                return;
            }
            let Some(file) = state.selected_file.clone() else {
                debug!(
                    session = %self.session_id,
                    "session: process ignored, no file selected"
                );
                return;
            };
            state.status = SessionStatus::Processing;
            state.error_detail = None;
            state.result = None;
            (state.mode, file, state.snapshot())
        };
        let _ = self.state_changes.send(snapshot);

        info!(
            session = %self.session_id,
            ?mode,
            file = %file.name,
            "session: processing started"
        );
        let outcome = self.run_transform(mode, &file).await;

        let snapshot = {
            let mut state = self.inner.lock().await;
            match outcome {
                Ok(artifact) => {
                    info!(
                        session = %self.session_id,
                        artifact = %artifact.filename,
                        bytes = artifact.size_bytes(),
                        "session: processing succeeded"
                    );
                    state.status = SessionStatus::Success;
                    state.error_detail = None;
                    state.result = Some(artifact);
                }
                Err(err) => {
                    let detail = err.display_message();
                    warn!(
                        session = %self.session_id,
                        error = %detail,
                        "session: processing failed"
                    );
                    state.status = SessionStatus::Error;
                    state.result = None;
                    state.error_detail = Some(detail);
                }
            }
            state.snapshot()
        };
        let _ = self.state_changes.send(snapshot);
    }

    async fn run_transform(
        &self,
        mode: TransformMode,
        file: &SelectedFile,
    ) -> Result<ResultArtifact, GatewayError> {
        let bytes = match mode {
            TransformMode::Decode => {
                let decoded = self.gateway.decode_to_structured(file).await?;
                serde_json::to_vec_pretty(&decoded).map_err(|err| GatewayError::Transport {
                    message: format!("failed to render decoded output: {err}"),
                })?
            }
            TransformMode::Encode => self.gateway.encode_to_binary(file).await?,
        };
        Ok(ResultArtifact {
            filename: mode.artifact_filename().to_owned(),
            content_type: mode.artifact_content_type().to_owned(),
            bytes,
        })
    }

    /// Full artifact of the latest successful run. Does not consume it:
    /// repeated calls return the same bytes until the next reset.
    pub async fn retrieve_result(&self) -> Option<ResultArtifact> {
        let state = self.inner.lock().await;
        if state.status != SessionStatus::Success {
            return None;
        }
        state.result.clone()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
