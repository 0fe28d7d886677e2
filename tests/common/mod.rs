//! Shared test utilities
//!
//! Scripted speech backends so pipeline behavior can be tested without
//! audio hardware or network access.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use aura_voice::config::{Config, PlatformConfig, SegmenterConfig, VoicePreferences};
use aura_voice::{
    BackendKind, Error, RecognizerBackend, RecognizerEvent, Result, SynthesizerBackend,
    TranscriptSegment, VoiceInfo,
};

/// A config with defaults and no cloud credentials
#[must_use]
pub fn test_config() -> Config {
    Config {
        cloud: None,
        segmenter: SegmenterConfig::default(),
        voice: VoicePreferences::default(),
        platform: PlatformConfig::default(),
        persona_description: None,
    }
}

/// Shared, ordered log of backend activity across all mocks
pub type ActivityLog = Arc<Mutex<Vec<String>>>;

/// Create an empty activity log
#[must_use]
pub fn activity_log() -> ActivityLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Read the log contents
#[must_use]
pub fn log_entries(log: &ActivityLog) -> Vec<String> {
    log.lock().expect("log lock").clone()
}

/// Mock synthesizer as a trait object, ready for `with_backends`
#[must_use]
pub fn mock_synthesizer(
    kind: BackendKind,
    behavior: SynthBehavior,
    voices: Vec<VoiceInfo>,
    log: &ActivityLog,
) -> Arc<dyn SynthesizerBackend> {
    Arc::new(MockSynthesizer::new(kind, behavior, voices, log.clone()))
}

/// Scripted recognizer as a trait object, ready for `with_backends`
#[must_use]
pub fn scripted_recognizer(
    kind: BackendKind,
    script: Vec<ScriptStep>,
) -> Arc<dyn RecognizerBackend> {
    Arc::new(ScriptedRecognizer::new(kind, script))
}

/// Unavailable recognizer as a trait object
#[must_use]
pub fn unavailable_recognizer(kind: BackendKind) -> Arc<dyn RecognizerBackend> {
    Arc::new(ScriptedRecognizer::unavailable(kind))
}

/// How a mock synthesizer responds to speak calls
#[derive(Debug, Clone, Copy)]
pub enum SynthBehavior {
    /// Complete after the given playback duration
    Succeed { playback_ms: u64 },
    /// Fail every call (e.g. simulate an HTTP 401)
    Fail,
}

/// Scripted synthesizer backend
pub struct MockSynthesizer {
    kind: BackendKind,
    behavior: SynthBehavior,
    voices: Vec<VoiceInfo>,
    log: ActivityLog,
}

impl MockSynthesizer {
    #[must_use]
    pub fn new(
        kind: BackendKind,
        behavior: SynthBehavior,
        voices: Vec<VoiceInfo>,
        log: ActivityLog,
    ) -> Self {
        Self {
            kind,
            behavior,
            voices,
            log,
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().expect("log lock").push(entry);
    }
}

#[async_trait]
impl SynthesizerBackend for MockSynthesizer {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.record(format!(
            "{}:start:{text}:{}",
            self.kind,
            voice.unwrap_or("default")
        ));

        match self.behavior {
            SynthBehavior::Fail => {
                self.record(format!("{}:fail:{text}", self.kind));
                Err(Error::Tts("synthesis error 401: unauthorized".to_string()))
            }
            SynthBehavior::Succeed { playback_ms } => {
                tokio::select! {
                    () = cancel.cancelled() => {
                        self.record(format!("{}:cancelled:{text}", self.kind));
                        Ok(())
                    }
                    () = tokio::time::sleep(Duration::from_millis(playback_ms)) => {
                        self.record(format!("{}:done:{text}", self.kind));
                        Ok(())
                    }
                }
            }
        }
    }

    async fn stop(&self) {
        self.record(format!("{}:stop", self.kind));
    }
}

/// One step of a scripted recognition session
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Sleep before the next event
    Wait(u64),
    /// Emit an interim segment
    Interim(&'static str),
    /// Emit a final segment
    Final(&'static str),
    /// Emit the pause signal
    Pause,
    /// Emit an error
    Error(&'static str),
}

/// Scripted recognizer backend.
///
/// Plays its script once per `start` call, then ends the session.
pub struct ScriptedRecognizer {
    kind: BackendKind,
    available: bool,
    script: Vec<ScriptStep>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ScriptedRecognizer {
    #[must_use]
    pub fn new(kind: BackendKind, script: Vec<ScriptStep>) -> Self {
        Self {
            kind,
            available: true,
            script,
            cancel: Mutex::new(None),
        }
    }

    /// A recognizer that reports itself unavailable
    #[must_use]
    pub fn unavailable(kind: BackendKind) -> Self {
        Self {
            kind,
            available: false,
            script: Vec::new(),
            cancel: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RecognizerBackend for ScriptedRecognizer {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn start(&self, events: mpsc::UnboundedSender<RecognizerEvent>) -> Result<()> {
        let cancel = CancellationToken::new();
        {
            let mut guard = self.cancel.lock().expect("cancel lock");
            if let Some(old) = guard.replace(cancel.clone()) {
                old.cancel();
            }
        }

        let script = self.script.clone();
        tokio::spawn(async move {
            let mut sequence = 0;
            for step in script {
                if cancel.is_cancelled() {
                    break;
                }
                match step {
                    ScriptStep::Wait(ms) => {
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(Duration::from_millis(ms)) => {}
                        }
                    }
                    ScriptStep::Interim(text) => {
                        let _ = events.send(RecognizerEvent::Segment(TranscriptSegment {
                            text: text.to_string(),
                            is_final: false,
                            sequence,
                        }));
                        sequence += 1;
                    }
                    ScriptStep::Final(text) => {
                        let _ = events.send(RecognizerEvent::Segment(TranscriptSegment {
                            text: text.to_string(),
                            is_final: true,
                            sequence,
                        }));
                        sequence += 1;
                    }
                    ScriptStep::Pause => {
                        let _ = events.send(RecognizerEvent::Pause);
                    }
                    ScriptStep::Error(code) => {
                        let _ = events.send(RecognizerEvent::Error(code.to_string()));
                    }
                }
            }
            let _ = events.send(RecognizerEvent::Ended);
        });

        Ok(())
    }

    async fn stop(&self) {
        let token = self.cancel.lock().expect("cancel lock").take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}
