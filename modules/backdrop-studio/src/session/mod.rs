mod state;

pub use state::{Phase, PendingEdit, SessionSnapshot, SessionState, SkipReason, Ticket};

use std::path::Path;
use std::sync::Arc;

use backdrop_common::{BackdropError, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::encoder::Encoder;
use crate::pipeline::EditPipeline;

/// Handle to one interactive session. Clones share the same state.
///
/// The state lock is never held across the image service call:
/// [`Session::begin_generate`] flips to LOADING under the lock, and
/// [`Session::complete`] runs the pipeline before re-locking to apply the
/// result.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
    pipeline: EditPipeline,
    encoder: Encoder,
}

impl Session {
    pub fn new(pipeline: EditPipeline, encoder: Encoder, instruction: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            state: Arc::new(Mutex::new(SessionState::new(id, instruction))),
            pipeline,
            encoder,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Select an image already held in memory. Invalid input is rejected
    /// without touching the session.
    pub async fn select_image_bytes(
        &self,
        declared_mime: &str,
        bytes: &[u8],
    ) -> Result<SessionSnapshot> {
        let image = self.encoder.encode_bytes(declared_mime, bytes)?;
        let mut state = self.state.lock().await;
        state.select_image(image);
        info!(session_id = %self.id, mime_type = declared_mime, bytes = bytes.len(), "Image selected");
        Ok(state.snapshot())
    }

    /// Select an image from disk. A read overtaken by a newer selection is
    /// dropped.
    pub async fn select_image_file(
        &self,
        path: impl AsRef<Path>,
        declared_mime: &str,
    ) -> Result<SessionSnapshot> {
        self.encoder.validate_mime(declared_mime)?;
        let ticket = self.state.lock().await.begin_image_load();

        let loaded = self.encoder.encode_file(path, declared_mime).await;

        let mut state = self.state.lock().await;
        match loaded {
            Ok(image) => {
                let bytes = image.byte_len();
                if state.image_loaded(ticket, image) {
                    info!(session_id = %self.id, mime_type = declared_mime, bytes, "Image selected");
                } else {
                    debug!(session_id = %self.id, "Discarding superseded image load");
                }
                Ok(state.snapshot())
            }
            Err(e) => {
                if matches!(e, BackdropError::Io(_)) {
                    state.image_load_failed(ticket, e.clone());
                }
                Err(e)
            }
        }
    }

    pub async fn set_instruction(&self, instruction: impl Into<String>) -> SessionSnapshot {
        let mut state = self.state.lock().await;
        state.set_instruction(instruction);
        state.snapshot()
    }

    /// Enter LOADING and return the edit to run, or the reason nothing happened.
    pub async fn begin_generate(&self) -> std::result::Result<PendingEdit, SkipReason> {
        let pending = self.state.lock().await.begin_generate();
        match &pending {
            Ok(_) => info!(session_id = %self.id, "Generation started"),
            Err(reason) => debug!(session_id = %self.id, %reason, "Generate skipped"),
        }
        pending
    }

    /// Run the pipeline for a pending edit and apply its result if it is still
    /// current. Returns whether the result was applied.
    pub async fn complete(&self, pending: PendingEdit) -> bool {
        let result = self.pipeline.submit(&pending.request).await;
        let succeeded = result.is_ok();

        let applied = self.state.lock().await.complete(pending.ticket, result);
        if applied {
            info!(session_id = %self.id, succeeded, "Generation finished");
        } else {
            debug!(session_id = %self.id, "Discarding superseded generation result");
        }
        applied
    }

    /// `begin_generate` followed by `complete`, for callers that wait.
    pub async fn generate(&self) -> std::result::Result<SessionSnapshot, SkipReason> {
        let pending = self.begin_generate().await?;
        self.complete(pending).await;
        Ok(self.snapshot().await)
    }

    pub async fn reset(&self) -> SessionSnapshot {
        let mut state = self.state.lock().await;
        state.reset();
        info!(session_id = %self.id, "Session reset");
        state.snapshot()
    }
}
