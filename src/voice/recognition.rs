//! Recognition backend routing
//!
//! Chooses the recognizer at session start — cloud when configured, else
//! the platform facility — and exposes a uniform start/stop/toggle surface.
//! Backend events are pumped into the turn segmenter through one task per
//! session; backend switching requires a fresh session.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::voice::backend::{BackendKind, RecognizerBackend, RecognizerEvent};
use crate::voice::segmenter::{SessionHandle, TurnSegmenter};
use crate::{Error, Result};

struct ActiveSession {
    backend: Arc<dyn RecognizerBackend>,
    handle: SessionHandle,
    pump: JoinHandle<()>,
}

/// Routes recognition sessions to the chosen backend
pub struct RecognitionRouter {
    cloud: Option<Arc<dyn RecognizerBackend>>,
    platform: Option<Arc<dyn RecognizerBackend>>,
    segmenter: TurnSegmenter,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl RecognitionRouter {
    /// Create a router over the registered backends
    #[must_use]
    pub fn new(
        cloud: Option<Arc<dyn RecognizerBackend>>,
        platform: Option<Arc<dyn RecognizerBackend>>,
        segmenter: TurnSegmenter,
    ) -> Self {
        Self {
            cloud,
            platform,
            segmenter,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// The backend a new session would use, if any
    #[must_use]
    pub fn selected_backend(&self) -> Option<BackendKind> {
        self.choose().ok().map(|b| b.kind())
    }

    fn choose(&self) -> Result<Arc<dyn RecognizerBackend>> {
        if let Some(cloud) = &self.cloud
            && cloud.is_available()
        {
            return Ok(Arc::clone(cloud));
        }
        if let Some(platform) = &self.platform
            && platform.is_available()
        {
            return Ok(Arc::clone(platform));
        }
        Err(Error::Unsupported(
            "no recognition backend is configured or available".to_string(),
        ))
    }

    /// Start a recognition session.
    ///
    /// An already-active session is terminated first; sessions replace
    /// serially, never overlap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] when no backend can take a session,
    /// or the backend's own error when the session fails to start.
    pub async fn start(&self) -> Result<()> {
        let mut active = self.active.lock().await;

        if let Some(old) = active.take() {
            tracing::debug!("terminating previous recognition session");
            old.backend.stop().await;
            old.handle.deactivate();
            old.pump.abort();
        }

        let backend = self.choose()?;
        tracing::info!(backend = %backend.kind(), "starting recognition session");

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RecognizerEvent>();
        let handle = SessionHandle::new();
        self.segmenter.begin_session(handle.clone());

        if let Err(e) = backend.start(event_tx).await {
            self.segmenter.on_error(e.code());
            return Err(e);
        }

        let segmenter = self.segmenter.clone();
        let session = handle.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    RecognizerEvent::Segment(segment) => {
                        if segment.is_final {
                            segmenter.on_final(&segment.text);
                        } else {
                            segmenter.on_interim(&segment.text);
                        }
                    }
                    RecognizerEvent::Pause => segmenter.on_pause(),
                    RecognizerEvent::Ended => {
                        segmenter.on_session_end();
                        break;
                    }
                    RecognizerEvent::Error(code) => {
                        session.deactivate();
                        segmenter.on_error(&code);
                    }
                }
            }
        });

        *active = Some(ActiveSession {
            backend,
            handle,
            pump,
        });
        Ok(())
    }

    /// Stop the current session; no-op when nothing is active.
    ///
    /// Flushes the segmenter synchronously (manual stop is never slower
    /// than silence detection), then terminates the backend session.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            let _ = self.segmenter.stop();
            session.backend.stop().await;
            tracing::debug!("recognition session stopped");
        }
    }

    /// Toggle listening; returns the new state.
    ///
    /// # Errors
    ///
    /// Returns error if starting a session fails.
    pub async fn toggle(&self) -> Result<bool> {
        let listening = {
            self.active
                .lock()
                .await
                .as_ref()
                .is_some_and(|s| s.handle.is_active())
        };

        if listening {
            self.stop().await;
            Ok(false)
        } else {
            self.start().await?;
            Ok(true)
        }
    }

    /// Whether a session is currently live
    pub async fn is_listening(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.handle.is_active())
    }
}
