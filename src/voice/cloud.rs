//! Cloud speech backends
//!
//! Thin REST adapters over the cloud Cognitive Speech service. Recognition
//! ships energy-gated microphone utterances as WAV to the short-form
//! transcription endpoint; synthesis posts SSML and plays the returned MP3.
//! Both convert transport failures into the pipeline error taxonomy at this
//! boundary — no reqwest error escapes to the routers.

use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::CloudConfig;
use crate::voice::backend::{
    BackendKind, RecognizerBackend, RecognizerEvent, SynthesizerBackend, TranscriptSegment,
    VoiceInfo,
};
use crate::voice::capture;
use crate::voice::playback::AudioPlayback;
use crate::{Error, Result};

/// Voice used when resolution yields no explicit choice
const DEFAULT_CLOUD_VOICE: &str = "en-US-JennyNeural";

/// Short-form recognition response
#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(rename = "RecognitionStatus")]
    status: String,

    #[serde(rename = "DisplayText", default)]
    display_text: String,
}

/// Entry in the voices/list response
#[derive(Debug, Deserialize)]
struct VoiceListEntry {
    #[serde(rename = "ShortName")]
    short_name: String,

    #[serde(rename = "Locale")]
    locale: String,

    #[serde(rename = "VoiceType", default)]
    voice_type: String,
}

/// Cloud speech recognizer.
///
/// One-shot session shape: after end-of-speech silence the adapter emits
/// its pause signal, delivers the final transcript segment, and ends the
/// session.
pub struct CloudRecognizer {
    client: reqwest::Client,
    api_key: SecretString,
    region: String,
    language: String,
    session: Mutex<Option<CancellationToken>>,
}

impl CloudRecognizer {
    /// Create a recognizer from cloud credentials
    #[must_use]
    pub fn new(config: &CloudConfig, locale: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            region: config.region.clone(),
            language: recognition_language(locale),
            session: Mutex::new(None),
        }
    }
}

/// POST a WAV utterance to the short-form recognition endpoint
async fn transcribe_wav(
    client: &reqwest::Client,
    api_key: &SecretString,
    region: &str,
    language: &str,
    wav: Vec<u8>,
) -> Result<String> {
    let url = format!(
        "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language={}&format=simple",
        urlencoding::encode(language)
    );

    tracing::debug!(bytes = wav.len(), language, "cloud transcription request");

    let response = client
        .post(&url)
        .header("Ocp-Apim-Subscription-Key", api_key.expose_secret())
        .header(
            "Content-Type",
            "audio/wav; codecs=audio/pcm; samplerate=16000",
        )
        .body(wav)
        .send()
        .await
        .map_err(|e| Error::Backend(format!("cloud STT request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Stt(format!("cloud STT error {status}: {body}")));
    }

    let result: RecognitionResponse = response
        .json()
        .await
        .map_err(|e| Error::Stt(format!("malformed STT response: {e}")))?;

    if result.status != "Success" {
        return Err(Error::Stt(format!(
            "recognition rejected: {}",
            result.status
        )));
    }

    tracing::info!(transcript = %result.display_text, "cloud transcription complete");
    Ok(result.display_text)
}

#[async_trait]
impl RecognizerBackend for CloudRecognizer {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn is_available(&self) -> bool {
        !self.region.is_empty()
    }

    async fn start(&self, events: mpsc::UnboundedSender<RecognizerEvent>) -> Result<()> {
        capture::probe_input()?;

        let cancel = CancellationToken::new();
        {
            let mut session = self.session.lock().expect("session lock");
            if let Some(old) = session.replace(cancel.clone()) {
                old.cancel();
            }
        }

        let (utterance_tx, mut utterance_rx) = mpsc::unbounded_channel::<Vec<f32>>();

        let thread_cancel = cancel.clone();
        let thread_events = events.clone();
        tokio::task::spawn_blocking(move || {
            capture::run_gated_capture(&thread_cancel, &thread_events, &utterance_tx);
        });

        // Transcription task: owns the Ended emission on every path.
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let region = self.region.clone();
        let language = self.language.clone();
        tokio::spawn(async move {
            let mut sequence = 0;
            while let Some(samples) = utterance_rx.recv().await {
                match capture::samples_to_wav(&samples, capture::SAMPLE_RATE) {
                    Ok(wav) => match transcribe_wav(&client, &api_key, &region, &language, wav)
                        .await
                    {
                        Ok(text) if !text.trim().is_empty() => {
                            let _ = events.send(RecognizerEvent::Segment(TranscriptSegment {
                                text,
                                is_final: true,
                                sequence,
                            }));
                            sequence += 1;
                        }
                        Ok(_) => tracing::debug!("empty transcript discarded"),
                        Err(e) => {
                            let _ = events.send(RecognizerEvent::Error(e.to_string()));
                        }
                    },
                    Err(e) => {
                        let _ = events.send(RecognizerEvent::Error(e.to_string()));
                    }
                }
            }
            let _ = events.send(RecognizerEvent::Ended);
        });

        Ok(())
    }

    async fn stop(&self) {
        let token = self.session.lock().expect("session lock").take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}

/// Cloud speech synthesizer
pub struct CloudSynthesizer {
    client: reqwest::Client,
    api_key: SecretString,
    region: String,
    current: Mutex<Option<CancellationToken>>,
    voices_cache: tokio::sync::Mutex<Option<Vec<VoiceInfo>>>,
}

impl CloudSynthesizer {
    /// Create a synthesizer from cloud credentials
    #[must_use]
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            region: config.region.clone(),
            current: Mutex::new(None),
            voices_cache: tokio::sync::Mutex::new(None),
        }
    }

    async fn fetch_voices(&self) -> Result<Vec<VoiceInfo>> {
        let url = format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/voices/list",
            self.region
        );

        let response = self
            .client
            .get(&url)
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Backend(format!("voice list request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tts(format!("voice list error {status}")));
        }

        let entries: Vec<VoiceListEntry> = response
            .json()
            .await
            .map_err(|e| Error::Tts(format!("malformed voice list: {e}")))?;

        Ok(entries
            .into_iter()
            .map(|e| VoiceInfo {
                name: e.short_name,
                locale: e.locale,
                natural: e.voice_type.eq_ignore_ascii_case("neural"),
            })
            .collect())
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let url = format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        );
        let ssml = build_ssml(text, voice);

        tracing::debug!(voice, chars = text.len(), "cloud synthesis request");

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .header("Content-Type", "application/ssml+xml")
            .header(
                "X-Microsoft-OutputFormat",
                "audio-24khz-48kbitrate-mono-mp3",
            )
            .body(ssml)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("cloud TTS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("cloud TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Backend(format!("cloud TTS body read failed: {e}")))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SynthesizerBackend for CloudSynthesizer {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn is_available(&self) -> bool {
        !self.region.is_empty()
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        let mut cache = self.voices_cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            return cached.clone();
        }

        match self.fetch_voices().await {
            Ok(voices) => {
                tracing::debug!(count = voices.len(), "cloud voice list cached");
                *cache = Some(voices.clone());
                voices
            }
            Err(e) => {
                tracing::warn!(error = %e, "voice list fetch failed");
                Vec::new()
            }
        }
    }

    async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<()> {
        {
            let mut current = self.current.lock().expect("current lock");
            if let Some(old) = current.replace(cancel.clone()) {
                old.cancel();
            }
        }

        let voice = voice.unwrap_or(DEFAULT_CLOUD_VOICE);
        let audio = self.synthesize(text, voice).await?;

        if cancel.is_cancelled() {
            tracing::debug!("synthesis superseded before playback");
            return Ok(());
        }

        let playback = AudioPlayback::new()?;
        playback.play_mp3(&audio, cancel).await
    }

    async fn stop(&self) {
        let token = self.current.lock().expect("current lock").take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}

/// Recognition language from a locale restriction.
///
/// A bare language tag gets a default region; full tags pass through.
fn recognition_language(locale: &str) -> String {
    if locale.contains('-') {
        locale.to_string()
    } else {
        match locale.to_ascii_lowercase().as_str() {
            "en" | "" => "en-US".to_string(),
            other => format!("{other}-{}", other.to_ascii_uppercase()),
        }
    }
}

/// Minimal SSML wrapper around escaped text
fn build_ssml(text: &str, voice: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<speak version='1.0' xml:lang='en-US'><voice name='{voice}'>{escaped}</voice></speak>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssml_escapes_markup() {
        let ssml = build_ssml("a < b & c > d", "en-GB-RyanNeural");
        assert!(ssml.contains("a &lt; b &amp; c &gt; d"));
        assert!(ssml.contains("name='en-GB-RyanNeural'"));
    }

    #[test]
    fn recognition_language_defaults() {
        assert_eq!(recognition_language("en"), "en-US");
        assert_eq!(recognition_language("en-GB"), "en-GB");
        assert_eq!(recognition_language("fr"), "fr-FR");
        assert_eq!(recognition_language(""), "en-US");
    }
}
