//! Audio capture from microphone
//!
//! Capture runs at 16 kHz mono, the rate both recognition backends consume.
//! [`SpeechGate`] sits on top of the raw sample stream and decides where an
//! utterance starts and ends, so recognizers only ship audio that actually
//! contains speech.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::voice::backend::RecognizerEvent;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Minimum audio energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Speech required before an utterance can close (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that closes an utterance (0.7s at 16kHz)
const CLOSE_SILENCE_SAMPLES: usize = 11200;

/// Hard cap on utterance length (30s at 16kHz)
const MAX_UTTERANCE_SAMPLES: usize = 480_000;

/// Captures audio from the default input device
pub struct AudioCapture {
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Permission`] if no usable input device exists —
    /// at the audio layer a denied microphone and a missing microphone
    /// are indistinguishable, and both are fatal for the session.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Permission("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Permission(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable capture config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio into the internal buffer.
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream cannot be built or started.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Permission("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Permission(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take the samples captured since the last call
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Whether capture is running
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Why an utterance was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Trailing silence reached the close threshold
    Silence,
    /// The utterance hit the hard length cap
    MaxLength,
}

/// Signals the gate produces as samples flow through it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// Speech energy appeared after idle
    SpeechStarted,
    /// The current utterance is complete; collect it with `take_utterance`
    UtteranceEnded(CloseReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Speaking,
}

/// Energy-based utterance gate.
///
/// Opens on sustained energy above the speech threshold, accumulates the
/// utterance, and closes it after enough trailing silence (or at the hard
/// length cap). Chunks arriving while idle are discarded.
pub struct SpeechGate {
    state: GateState,
    utterance: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
}

impl SpeechGate {
    /// Create a gate in the idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: GateState::Idle,
            utterance: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    /// Feed captured samples through the gate
    pub fn push(&mut self, samples: &[f32]) -> Option<GateSignal> {
        if samples.is_empty() {
            return None;
        }

        let energy = rms_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            GateState::Idle => {
                if is_speech {
                    self.state = GateState::Speaking;
                    self.utterance.clear();
                    self.utterance.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech opened");
                    return Some(GateSignal::SpeechStarted);
                }
                None
            }
            GateState::Speaking => {
                self.utterance.extend_from_slice(samples);

                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                if self.utterance.len() >= MAX_UTTERANCE_SAMPLES {
                    tracing::debug!(samples = self.utterance.len(), "utterance hit length cap");
                    self.state = GateState::Idle;
                    return Some(GateSignal::UtteranceEnded(CloseReason::MaxLength));
                }

                if self.silence_samples >= CLOSE_SILENCE_SAMPLES {
                    if self.speech_samples >= MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.utterance.len(), "utterance closed");
                        self.state = GateState::Idle;
                        return Some(GateSignal::UtteranceEnded(CloseReason::Silence));
                    }
                    // Not enough speech to count as an utterance; drop it.
                    tracing::trace!("discarding sub-threshold speech burst");
                    self.reset();
                }
                None
            }
        }
    }

    /// Take the accumulated utterance, clearing the gate buffer
    pub fn take_utterance(&mut self) -> Vec<f32> {
        self.speech_samples = 0;
        self.silence_samples = 0;
        std::mem::take(&mut self.utterance)
    }

    /// Whether the gate is mid-utterance
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == GateState::Speaking
    }

    /// Reset to idle, discarding any partial utterance
    pub fn reset(&mut self) {
        self.state = GateState::Idle;
        self.utterance.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
    }
}

impl Default for SpeechGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture poll interval inside the recognition loop
const CAPTURE_POLL_MS: u64 = 100;

/// Check that a usable input device exists without opening a stream.
///
/// Recognition backends call this from their async `start` so permission
/// failures surface immediately instead of racing down the event channel.
///
/// # Errors
///
/// Returns [`Error::Permission`] when no input device is usable.
pub fn probe_input() -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Permission("no input device available".to_string()))?;

    device
        .supported_input_configs()
        .map_err(|e| Error::Permission(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable capture config found".to_string()))?;

    Ok(())
}

/// Blocking capture loop shared by the recognition backends.
///
/// Opens the microphone, gates for a single utterance, emits the
/// recognizer pause signal when the gate closes, and hands the samples to
/// the transcription task. One-shot: returns after the first utterance
/// (or on cancellation). Must run on a blocking thread — the cpal stream
/// it owns is not `Send`, which is also why the capture is constructed
/// here rather than passed in.
pub(crate) fn run_gated_capture(
    cancel: &CancellationToken,
    events: &mpsc::UnboundedSender<RecognizerEvent>,
    utterance_tx: &mpsc::UnboundedSender<Vec<f32>>,
) {
    let mut capture = match AudioCapture::new() {
        Ok(capture) => capture,
        Err(e) => {
            let _ = events.send(RecognizerEvent::Error(e.to_string()));
            return;
        }
    };
    if let Err(e) = capture.start() {
        let _ = events.send(RecognizerEvent::Error(e.to_string()));
        return;
    }

    let mut gate = SpeechGate::new();
    loop {
        if cancel.is_cancelled() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(CAPTURE_POLL_MS));

        let chunk = capture.drain();
        if let Some(GateSignal::UtteranceEnded(reason)) = gate.push(&chunk) {
            tracing::debug!(?reason, "utterance gated");
            let _ = events.send(RecognizerEvent::Pause);
            let _ = utterance_tx.send(gate.take_utterance());
            break;
        }
    }
    capture.stop();
}

/// RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud(len: usize) -> Vec<f32> {
        vec![0.5; len]
    }

    fn quiet(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn energy_calculation() {
        assert!(rms_energy(&quiet(100)) < 0.001);
        assert!(rms_energy(&loud(100)) > 0.4);
        assert!(rms_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn gate_opens_on_speech_and_closes_on_silence() {
        let mut gate = SpeechGate::new();

        assert_eq!(gate.push(&quiet(1600)), None);
        assert!(!gate.is_open());

        assert_eq!(gate.push(&loud(MIN_SPEECH_SAMPLES)), Some(GateSignal::SpeechStarted));
        assert!(gate.is_open());

        assert_eq!(
            gate.push(&quiet(CLOSE_SILENCE_SAMPLES)),
            Some(GateSignal::UtteranceEnded(CloseReason::Silence))
        );
        assert!(!gate.is_open());

        let utterance = gate.take_utterance();
        assert_eq!(utterance.len(), MIN_SPEECH_SAMPLES + CLOSE_SILENCE_SAMPLES);
    }

    #[test]
    fn short_bursts_are_discarded() {
        let mut gate = SpeechGate::new();

        // A click shorter than the speech minimum, then silence.
        assert_eq!(gate.push(&loud(800)), Some(GateSignal::SpeechStarted));
        assert_eq!(gate.push(&quiet(CLOSE_SILENCE_SAMPLES)), None);
        assert!(!gate.is_open());
        assert!(gate.take_utterance().is_empty());
    }

    #[test]
    fn speech_resets_silence_counter() {
        let mut gate = SpeechGate::new();
        gate.push(&loud(MIN_SPEECH_SAMPLES));

        // Silence just below the threshold, then more speech.
        assert_eq!(gate.push(&quiet(CLOSE_SILENCE_SAMPLES - 1600)), None);
        assert_eq!(gate.push(&loud(1600)), None);

        // The counter restarted; a full window is needed again.
        assert_eq!(gate.push(&quiet(CLOSE_SILENCE_SAMPLES - 1600)), None);
        assert_eq!(
            gate.push(&quiet(1600)),
            Some(GateSignal::UtteranceEnded(CloseReason::Silence))
        );
    }

    #[test]
    fn length_cap_closes_utterance() {
        let mut gate = SpeechGate::new();
        gate.push(&loud(MIN_SPEECH_SAMPLES));

        let mut closed = None;
        for _ in 0..((MAX_UTTERANCE_SAMPLES / 16000) + 1) {
            if let Some(signal) = gate.push(&loud(16000)) {
                closed = Some(signal);
                break;
            }
        }
        assert_eq!(closed, Some(GateSignal::UtteranceEnded(CloseReason::MaxLength)));
    }

    #[test]
    fn wav_roundtrip() {
        let samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.samples::<i16>().count(), samples.len());
    }
}
