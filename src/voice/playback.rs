//! Audio playback to speakers
//!
//! Playback is cancellable: every play call carries a `CancellationToken`,
//! and a fired token tears the output stream down mid-utterance. Cancelled
//! playback is a clean outcome, not an error — supersession decisions
//! belong to the synthesis router, not here.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Default sample rate for playback (matches cloud TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Poll interval while waiting for playback to finish
const POLL_MS: u64 = 25;

/// Plays audio to the default output device
#[derive(Clone)]
pub struct AudioPlayback {
    channels: u16,
}

impl AudioPlayback {
    /// Create a new audio playback instance.
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports speech-rate playback.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                (c.channels() == 1 || c.channels() == 2)
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = supported.channels(),
            "audio playback initialized"
        );

        Ok(Self {
            channels: supported.channels(),
        })
    }

    /// Play mono f32 samples, returning when playback completes or the
    /// token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started.
    pub async fn play(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        cancel: CancellationToken,
    ) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        // cpal streams are not Send; the whole stream lifetime stays
        // inside one blocking closure.
        let channels = self.channels;
        tokio::task::spawn_blocking(move || {
            play_blocking(channels, samples, sample_rate, &cancel)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    /// Decode MP3 bytes and play them
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub async fn play_mp3(&self, mp3_data: &[u8], cancel: CancellationToken) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        self.play(samples, sample_rate, cancel).await
    }
}

fn play_blocking(
    channels: u16,
    samples: Vec<f32>,
    sample_rate: u32,
    cancel: &CancellationToken,
) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    };
    let frame_width = channels as usize;

    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let cb_samples = Arc::clone(&samples);
    let cb_position = Arc::clone(&position);
    let cb_finished = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = cb_position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(frame_width) {
                    let sample = if pos < cb_samples.len() {
                        let s = cb_samples[pos];
                        pos += 1;
                        s
                    } else {
                        cb_finished.store(true, Ordering::Relaxed);
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
                cb_position.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll until the callback drains the buffer, the token fires, or the
    // expected duration (plus slack) elapses.
    let duration_ms = (total as u64 * 1000) / u64::from(sample_rate);
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) {
        if cancel.is_cancelled() {
            tracing::debug!(
                played = position.load(Ordering::Relaxed),
                total,
                "playback cancelled"
            );
            return Ok(());
        }
        if std::time::Instant::now() > deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(POLL_MS));
    }

    drop(stream);
    tracing::debug!(samples = total, "playback complete");
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples, returning the frame sample rate
///
/// # Errors
///
/// Returns error on a corrupt stream or an empty decode
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate as u32;
                }
                if frame.channels == 2 {
                    // Stereo: average the channels down to mono.
                    samples.extend(frame.data.chunks(2).map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Audio("MP3 stream decoded to no audio".to_string()));
    }

    Ok((samples, sample_rate))
}
