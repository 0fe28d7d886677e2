//! Synthesis backend routing
//!
//! Cloud-first speech synthesis with a single fallback to the platform
//! backend, and last-caller-wins supersession: a new speak request cancels
//! whatever is in flight before it starts. There is no queue. A superseded
//! request resolves cleanly; only unrecoverable synthesis failure is an
//! error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::persona::PersonaGender;
use crate::voice::backend::SynthesizerBackend;
use crate::voice::resolver::{VoiceHint, VoiceResolver};
use crate::{Error, Result};

struct InFlight {
    request_id: u64,
    cancel: CancellationToken,
}

/// Routes speak requests to the cloud or platform synthesizer
pub struct SynthesisRouter {
    cloud: Option<Arc<dyn SynthesizerBackend>>,
    platform: Option<Arc<dyn SynthesizerBackend>>,
    resolver: VoiceResolver,
    in_flight: Mutex<Option<InFlight>>,
    next_request_id: AtomicU64,
}

impl SynthesisRouter {
    /// Create a router over the registered backends
    #[must_use]
    pub fn new(
        cloud: Option<Arc<dyn SynthesizerBackend>>,
        platform: Option<Arc<dyn SynthesizerBackend>>,
        resolver: VoiceResolver,
    ) -> Self {
        Self {
            cloud,
            platform,
            resolver,
            in_flight: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Speak `text`, superseding any in-flight request.
    ///
    /// Tries the cloud backend first when configured; any cloud failure is
    /// logged and recovered by falling through to the platform backend
    /// exactly once. Resolves `Ok` when playback completes or the request
    /// is superseded by a newer one.
    ///
    /// # Errors
    ///
    /// Returns error when the platform path fails too, or when no backend
    /// can synthesize at all.
    pub async fn speak(
        &self,
        text: &str,
        hint: &VoiceHint,
        gender: PersonaGender,
    ) -> Result<()> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        {
            let mut guard = self.in_flight.lock().expect("in-flight lock");
            if let Some(previous) = guard.take() {
                tracing::debug!(superseded = previous.request_id, "cancelling in-flight speech");
                previous.cancel.cancel();
            }
            *guard = Some(InFlight {
                request_id,
                cancel: cancel.clone(),
            });
        }

        // Stop both engines before starting: the superseded request may be
        // playing on either backend, including one we are not about to use.
        self.stop_backends().await;

        let result = self.speak_inner(text, hint, gender, &cancel).await;

        {
            let mut guard = self.in_flight.lock().expect("in-flight lock");
            if guard.as_ref().is_some_and(|f| f.request_id == request_id) {
                *guard = None;
            }
        }

        if cancel.is_cancelled() {
            tracing::debug!(request_id, "speak request superseded");
            return Ok(());
        }
        result
    }

    async fn speak_inner(
        &self,
        text: &str,
        hint: &VoiceHint,
        gender: PersonaGender,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(cloud) = &self.cloud
            && cloud.is_available()
        {
            let voices = cloud.voices().await;
            let voice = self.resolver.resolve(hint, gender, &voices);
            match cloud.speak(text, voice.as_deref(), cancel.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // Recovered locally: fall through to the platform once.
                    tracing::warn!(error = %e, "cloud synthesis failed, trying platform");
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(());
        }

        let platform = self
            .platform
            .as_ref()
            .filter(|p| p.is_available())
            .ok_or_else(|| {
                Error::Unsupported("no synthesis backend available".to_string())
            })?;

        let voices = platform.voices().await;
        let voice = self.resolver.resolve(hint, gender, &voices);
        platform.speak(text, voice.as_deref(), cancel.clone()).await
    }

    /// Stop any in-flight speech; safe to call when nothing is playing.
    ///
    /// Both backends are stopped unconditionally — a backend switch may
    /// have happened mid-utterance, so believing one backend is "the"
    /// active one is not good enough.
    pub async fn stop_speaking(&self) {
        let in_flight = self.in_flight.lock().expect("in-flight lock").take();
        if let Some(in_flight) = in_flight {
            tracing::debug!(request_id = in_flight.request_id, "stopping speech");
            in_flight.cancel.cancel();
        }
        self.stop_backends().await;
    }

    async fn stop_backends(&self) {
        if let Some(cloud) = &self.cloud {
            cloud.stop().await;
        }
        if let Some(platform) = &self.platform {
            platform.stop().await;
        }
    }
}
