//! Voice service facade
//!
//! An explicitly constructed service instance owning the segmenter, both
//! backend routers, and the persona classification — the single object a
//! UI layer talks to. No ambient global state: everything the pipeline
//! needs is injected here at construction.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::catalog::VoiceProfileCatalog;
use crate::config::Config;
use crate::persona::{self, PersonaGender};
use crate::voice::backend::{BackendKind, RecognizerBackend, SynthesizerBackend};
use crate::voice::cloud::{CloudRecognizer, CloudSynthesizer};
use crate::voice::platform::{PlatformRecognizer, PlatformSynthesizer};
use crate::voice::recognition::RecognitionRouter;
use crate::voice::resolver::{VoiceHint, VoiceResolver};
use crate::voice::segmenter::{SegmenterEvent, TurnSegmenter};
use crate::voice::synthesis::SynthesisRouter;
use crate::Result;

/// The voice interaction pipeline behind one handle
pub struct VoiceService {
    recognition: RecognitionRouter,
    synthesis: SynthesisRouter,
    voice_hint: VoiceHint,
    persona_gender: Mutex<PersonaGender>,
    events: Mutex<Option<mpsc::UnboundedReceiver<SegmenterEvent>>>,
}

impl VoiceService {
    /// Build the service with the concrete cloud/platform adapters
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let cloud_recognizer: Option<Arc<dyn RecognizerBackend>> =
            config.cloud.as_ref().map(|cloud| {
                Arc::new(CloudRecognizer::new(cloud, &config.voice.locale))
                    as Arc<dyn RecognizerBackend>
            });
        let platform_recognizer: Option<Arc<dyn RecognizerBackend>> =
            Some(Arc::new(PlatformRecognizer::new(&config.platform)));

        let cloud_synthesizer: Option<Arc<dyn SynthesizerBackend>> = config
            .cloud
            .as_ref()
            .map(|cloud| Arc::new(CloudSynthesizer::new(cloud)) as Arc<dyn SynthesizerBackend>);
        let platform_synthesizer: Option<Arc<dyn SynthesizerBackend>> =
            Some(Arc::new(PlatformSynthesizer::new(&config.platform)));

        Self::with_backends(
            config,
            cloud_recognizer,
            platform_recognizer,
            cloud_synthesizer,
            platform_synthesizer,
        )
    }

    /// Build the service with injected backends.
    ///
    /// This is the seam tests (and embedders with their own engines) use;
    /// `new` is just this with the shipped adapters plugged in.
    #[must_use]
    pub fn with_backends(
        config: &Config,
        cloud_recognizer: Option<Arc<dyn RecognizerBackend>>,
        platform_recognizer: Option<Arc<dyn RecognizerBackend>>,
        cloud_synthesizer: Option<Arc<dyn SynthesizerBackend>>,
        platform_synthesizer: Option<Arc<dyn SynthesizerBackend>>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let segmenter = TurnSegmenter::new(config.segmenter, event_tx);

        let recognition =
            RecognitionRouter::new(cloud_recognizer, platform_recognizer, segmenter);

        let catalog = Arc::new(VoiceProfileCatalog::new());
        let resolver = VoiceResolver::new(catalog, config.voice.locale.clone());
        let synthesis = SynthesisRouter::new(cloud_synthesizer, platform_synthesizer, resolver);

        let persona_gender = config
            .persona_description
            .as_deref()
            .map_or(PersonaGender::Unknown, persona::classify);

        Self {
            recognition,
            synthesis,
            voice_hint: VoiceHint::parse(&config.voice.preferred),
            persona_gender: Mutex::new(persona_gender),
            events: Mutex::new(Some(event_rx)),
        }
    }

    /// Take the UI event receiver. Yields `None` after the first call.
    #[must_use]
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SegmenterEvent>> {
        self.events.lock().expect("events lock").take()
    }

    /// Start listening.
    ///
    /// # Errors
    ///
    /// Returns error when no recognition backend is available or the
    /// session fails to start.
    pub async fn start_recognition(&self) -> Result<()> {
        self.recognition.start().await
    }

    /// Stop listening, flushing any pending utterance immediately
    pub async fn stop_recognition(&self) {
        self.recognition.stop().await;
    }

    /// Toggle listening; returns the new state.
    ///
    /// # Errors
    ///
    /// Returns error if starting a session fails.
    pub async fn toggle_recognition(&self) -> Result<bool> {
        self.recognition.toggle().await
    }

    /// Speak `text` with the configured voice preference.
    ///
    /// # Errors
    ///
    /// Returns error on unrecoverable synthesis failure.
    pub async fn speak(&self, text: &str) -> Result<()> {
        let gender = self.persona_gender();
        self.synthesis.speak(text, &self.voice_hint, gender).await
    }

    /// Speak `text` with an explicit voice hint, overriding the preference.
    ///
    /// # Errors
    ///
    /// Returns error on unrecoverable synthesis failure.
    pub async fn speak_as(&self, text: &str, hint: &VoiceHint) -> Result<()> {
        let gender = self.persona_gender();
        self.synthesis.speak(text, hint, gender).await
    }

    /// Stop any in-flight speech on every backend
    pub async fn stop_speaking(&self) {
        self.synthesis.stop_speaking().await;
    }

    /// Re-classify the persona; returns the new gender bucket
    pub fn set_persona(&self, description: &str) -> PersonaGender {
        let gender = persona::classify(description);
        *self.persona_gender.lock().expect("persona lock") = gender;
        tracing::debug!(?gender, "persona reclassified");
        gender
    }

    /// Current persona gender bucket
    #[must_use]
    pub fn persona_gender(&self) -> PersonaGender {
        *self.persona_gender.lock().expect("persona lock")
    }

    /// The recognition backend a new session would use
    #[must_use]
    pub fn recognition_backend(&self) -> Option<BackendKind> {
        self.recognition.selected_backend()
    }

    /// Whether a recognition session is live
    pub async fn is_listening(&self) -> bool {
        self.recognition.is_listening().await
    }
}
