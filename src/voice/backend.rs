//! Speech backend capability interfaces
//!
//! Recognition and synthesis engines sit behind these traits so the routers
//! depend only on the interface, never on a concrete engine. Backends are
//! registered at startup; capability is probed once, not re-checked at
//! every call site.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Which backend family an engine belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Cloud speech service
    Cloud,
    /// Platform/local speech facility
    Platform,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cloud => write!(f, "cloud"),
            Self::Platform => write!(f, "platform"),
        }
    }
}

/// A transcript fragment produced by a recognizer.
///
/// `sequence` ordering is guaranteed within one recognition session.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    /// Transcript text
    pub text: String,

    /// Whether the recognizer will revise this fragment further
    pub is_final: bool,

    /// Monotonic per-session sequence number
    pub sequence: u64,
}

/// Events a recognizer backend emits during a session
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// A transcript fragment (interim or final)
    Segment(TranscriptSegment),

    /// The backend believes the speaker stopped
    Pause,

    /// The session ended (naturally or via stop)
    Ended,

    /// The session failed; no further events follow
    Error(String),
}

/// A voice available on a synthesis backend
#[derive(Debug, Clone)]
pub struct VoiceInfo {
    /// Backend-specific voice identifier
    pub name: String,

    /// BCP-47 locale of the voice
    pub locale: String,

    /// Higher-quality ("natural"/neural) voice
    pub natural: bool,
}

impl VoiceInfo {
    /// Convenience constructor
    #[must_use]
    pub fn new(name: impl Into<String>, locale: impl Into<String>, natural: bool) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            natural,
        }
    }
}

/// A speech recognition engine
#[async_trait]
pub trait RecognizerBackend: Send + Sync {
    /// Backend family
    fn kind(&self) -> BackendKind;

    /// Whether this backend can currently take a session
    fn is_available(&self) -> bool;

    /// Start a recognition session, delivering events on `events`.
    ///
    /// The session runs until it ends naturally, errors, or `stop` is
    /// called. Implementations must emit [`RecognizerEvent::Ended`] exactly
    /// once per started session (errors included, after the error event).
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be started at all.
    async fn start(&self, events: mpsc::UnboundedSender<RecognizerEvent>) -> Result<()>;

    /// Request termination of the current session; no-op when idle
    async fn stop(&self);
}

/// A speech synthesis engine
#[async_trait]
pub trait SynthesizerBackend: Send + Sync {
    /// Backend family
    fn kind(&self) -> BackendKind;

    /// Whether this backend is configured and usable
    fn is_available(&self) -> bool;

    /// Voices this backend can speak with
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Synthesize and play `text`, returning when playback completes.
    ///
    /// `voice` of `None` means the backend's own default voice. The call
    /// must return promptly (and cleanly) when `cancel` fires mid-playback.
    ///
    /// # Errors
    ///
    /// Returns error on synthesis or playback failure.
    async fn speak(&self, text: &str, voice: Option<&str>, cancel: CancellationToken)
    -> Result<()>;

    /// Stop any in-flight playback; no-op when idle
    async fn stop(&self);
}
