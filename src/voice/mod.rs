//! Voice pipeline
//!
//! Turn segmentation, backend routing for recognition and synthesis, and
//! voice resolution. Concrete engines (cloud REST, platform commands) live
//! behind the capability traits in [`backend`].

pub mod backend;
mod capture;
pub mod cloud;
mod playback;
pub mod platform;
pub mod recognition;
pub mod resolver;
pub mod segmenter;
pub mod synthesis;

pub use backend::{
    BackendKind, RecognizerBackend, RecognizerEvent, SynthesizerBackend, TranscriptSegment,
    VoiceInfo,
};
pub use capture::{
    AudioCapture, CloseReason, GateSignal, SAMPLE_RATE, SpeechGate, probe_input, rms_energy,
    samples_to_wav,
};
pub use cloud::{CloudRecognizer, CloudSynthesizer};
pub use platform::{PlatformRecognizer, PlatformSynthesizer};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use recognition::RecognitionRouter;
pub use resolver::{VoiceHint, VoiceResolver};
pub use segmenter::{SegmenterEvent, SegmenterState, SessionHandle, TurnSegmenter};
pub use synthesis::SynthesisRouter;
