//! Aura Voice - Real-time voice interaction pipeline for AI companions
//!
//! This library provides the core of a companion voice experience:
//! - Turn segmentation: deciding when a spoken utterance is done
//! - Recognition routing over cloud and platform speech backends
//! - Synthesis routing with fallback and last-caller-wins supersession
//! - Persona-driven voice resolution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     UI layer                         │
//! │   interim preview │ committed utterances │ speak()  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  VoiceService                        │
//! │  TurnSegmenter │ RecognitionRouter │ SynthesisRouter │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Speech backends                         │
//! │   Cloud REST (STT/TTS)  │  Platform (say/whisper)   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod persona;
pub mod service;
pub mod voice;

pub use catalog::{GenderBucket, VoiceProfile, VoiceProfileCatalog};
pub use config::Config;
pub use error::{Error, Result};
pub use persona::PersonaGender;
pub use service::VoiceService;
pub use voice::{
    BackendKind, RecognitionRouter, RecognizerBackend, RecognizerEvent, SegmenterEvent,
    SegmenterState, SessionHandle, SynthesisRouter, SynthesizerBackend, TranscriptSegment,
    TurnSegmenter, VoiceHint, VoiceInfo, VoiceResolver,
};
