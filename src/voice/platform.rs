//! Platform speech backends
//!
//! Local speech facilities discovered on the host: synthesis via the OS
//! speech command (`say` on macOS, `espeak-ng`/`espeak` or `spd-say` on
//! Linux), recognition via a local transcriber binary when one is
//! installed. Capability is whatever `which` finds (or the configured
//! override); nothing here talks to the network.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::PlatformConfig;
use crate::voice::backend::{
    BackendKind, RecognizerBackend, RecognizerEvent, SynthesizerBackend, TranscriptSegment,
    VoiceInfo,
};
use crate::voice::capture;
use crate::{Error, Result};

use SynthFlavor::{Espeak, Say, SpdSay};

/// Synthesis command flavors with known invocation shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynthFlavor {
    /// macOS `say`
    Say,
    /// `espeak-ng` / `espeak`
    Espeak,
    /// speech-dispatcher `spd-say`
    SpdSay,
}

impl SynthFlavor {
    fn from_command(path: &std::path::Path) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match stem {
            "say" => Self::Say,
            "spd-say" => Self::SpdSay,
            _ => Self::Espeak,
        }
    }
}

/// Platform speech synthesizer
pub struct PlatformSynthesizer {
    command: Option<PathBuf>,
    flavor: SynthFlavor,
    current: Mutex<Option<CancellationToken>>,
}

impl PlatformSynthesizer {
    /// Discover the platform synthesis command (or use the configured one)
    #[must_use]
    pub fn new(config: &PlatformConfig) -> Self {
        let command = config
            .synth_command
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| {
                ["say", "espeak-ng", "espeak", "spd-say"]
                    .iter()
                    .find_map(|c| which::which(c).ok())
            });

        let flavor = command
            .as_deref()
            .map_or(SynthFlavor::Espeak, SynthFlavor::from_command);

        match &command {
            Some(cmd) => {
                tracing::debug!(command = %cmd.display(), ?flavor, "platform synthesis available");
            }
            None => tracing::debug!("no platform synthesis command found"),
        }

        Self {
            command,
            flavor,
            current: Mutex::new(None),
        }
    }

    fn speak_args(&self, text: &str, voice: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = voice {
            match self.flavor {
                Say | Espeak => args.extend(["-v".to_string(), voice.to_string()]),
                SpdSay => args.extend(["-y".to_string(), voice.to_string()]),
            }
        }
        args.push(text.to_string());
        args
    }
}

#[async_trait]
impl SynthesizerBackend for PlatformSynthesizer {
    fn kind(&self) -> BackendKind {
        BackendKind::Platform
    }

    fn is_available(&self) -> bool {
        self.command.is_some()
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        let Some(command) = &self.command else {
            return Vec::new();
        };

        let list_args: &[&str] = match self.flavor {
            Say => &["-v", "?"],
            Espeak => &["--voices"],
            SpdSay => return Vec::new(),
        };

        let output = match Command::new(command).args(list_args).output().await {
            Ok(out) if out.status.success() => out,
            Ok(out) => {
                tracing::warn!(status = %out.status, "voice listing failed");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "voice listing failed to run");
                return Vec::new();
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match self.flavor {
            Say => parse_say_voices(&stdout),
            Espeak => parse_espeak_voices(&stdout),
            SpdSay => Vec::new(),
        }
    }

    async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let Some(command) = &self.command else {
            return Err(Error::Unsupported(
                "no platform synthesis command".to_string(),
            ));
        };

        {
            let mut current = self.current.lock().expect("current lock");
            if let Some(old) = current.replace(cancel.clone()) {
                old.cancel();
            }
        }

        let args = self.speak_args(text, voice);
        tracing::debug!(command = %command.display(), ?voice, "platform synthesis");

        let mut child = Command::new(command)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Tts(format!("failed to run platform synth: {e}")))?;

        let status = tokio::select! {
            () = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };

        match status {
            None => {
                // Superseded or stopped: tear the process down and treat
                // it as a clean outcome.
                let _ = child.kill().await;
                tracing::debug!("platform synthesis cancelled");
                Ok(())
            }
            Some(status) => {
                let status = status.map_err(|e| Error::Tts(e.to_string()))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Tts(format!("platform synth exited with {status}")))
                }
            }
        }
    }

    async fn stop(&self) {
        let token = self.current.lock().expect("current lock").take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}

/// Platform speech recognizer.
///
/// Wraps a local transcriber binary that accepts a WAV path and prints the
/// transcript on stdout. Capability is simply whether such a binary is
/// discoverable; without one the platform cannot recognize speech.
pub struct PlatformRecognizer {
    command: Option<PathBuf>,
    session: Mutex<Option<CancellationToken>>,
}

impl PlatformRecognizer {
    /// Discover the local transcriber (or use the configured one)
    #[must_use]
    pub fn new(config: &PlatformConfig) -> Self {
        let command = config
            .transcriber_command
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| {
                ["whisper-cli", "whisper-cpp", "whisper"]
                    .iter()
                    .find_map(|c| which::which(c).ok())
            });

        match &command {
            Some(cmd) => {
                tracing::debug!(command = %cmd.display(), "platform recognition available");
            }
            None => tracing::debug!("no local transcriber found"),
        }

        Self {
            command,
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RecognizerBackend for PlatformRecognizer {
    fn kind(&self) -> BackendKind {
        BackendKind::Platform
    }

    fn is_available(&self) -> bool {
        self.command.is_some()
    }

    async fn start(&self, events: mpsc::UnboundedSender<RecognizerEvent>) -> Result<()> {
        let Some(command) = self.command.clone() else {
            return Err(Error::Unsupported("no local transcriber".to_string()));
        };

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

        tokio::spawn(async move {
            let mut sequence = 0;
            while let Some(samples) = utterance_rx.recv().await {
                match transcribe_local(&command, &samples).await {
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

/// Run the local transcriber over a temp WAV file
async fn transcribe_local(command: &std::path::Path, samples: &[f32]) -> Result<String> {
    let wav = capture::samples_to_wav(samples, capture::SAMPLE_RATE)?;

    let path = std::env::temp_dir().join(format!("aura-utterance-{}.wav", std::process::id()));
    tokio::fs::write(&path, &wav).await?;

    let output = Command::new(command)
        .arg(&path)
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Stt(format!("failed to run transcriber: {e}")));

    let _ = tokio::fs::remove_file(&path).await;
    let output = output?;

    if !output.status.success() {
        return Err(Error::Stt(format!(
            "transcriber exited with {}",
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Parse `say -v ?` output: `Name    en_US    # comment`
fn parse_say_voices(stdout: &str) -> Vec<VoiceInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let before_comment = line.split('#').next().unwrap_or("");
            let mut fields = before_comment.split_whitespace();
            let name = fields.next()?;
            let locale = fields.next_back()?;
            Some(VoiceInfo::new(name, locale.replace('_', "-"), false))
        })
        .collect()
}

/// Parse `espeak-ng --voices` output:
/// `Pty Language       Age/Gender VoiceName          File                 Other Languages`
fn parse_espeak_voices(stdout: &str) -> Vec<VoiceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let language = fields[1];
            let name = fields[3];
            Some(VoiceInfo::new(name, language.to_string(), false))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_say_voice_list() {
        let listing = "\
Alex                en_US    # Most people recognize me by my voice.
Daniel              en_GB    # Hello, my name is Daniel.
Amelie              fr_CA    # Bonjour, je m'appelle Amelie.
";
        let voices = parse_say_voices(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].name, "Alex");
        assert_eq!(voices[0].locale, "en-US");
        assert_eq!(voices[1].locale, "en-GB");
        assert!(!voices[0].natural);
    }

    #[test]
    fn parses_espeak_voice_list() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  en-gb           M  english              gmw/en               (en 2)
 5  en-us           M  english-us           gmw/en-US            (en 3)
 5  fr-fr           M  french               roa/fr               (fr 5)
";
        let voices = parse_espeak_voices(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].name, "english");
        assert_eq!(voices[0].locale, "en-gb");
        assert_eq!(voices[1].name, "english-us");
    }

    #[test]
    fn say_list_ignores_malformed_lines() {
        assert!(parse_say_voices("").is_empty());
        assert!(parse_say_voices("\n\n").is_empty());
    }
}
