//! Configuration management for the Aura voice pipeline
//!
//! Precedence per field: environment variable > config file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::Result;
use self::file::AuraConfigFile;

/// Default continuation window after a recognizer pause
const DEFAULT_CONTINUATION_MS: u64 = 2000;

/// Default settle window before trusting the pause
const DEFAULT_FINAL_COMMIT_MS: u64 = 1000;

/// Aura voice pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Cloud speech credentials (absent = cloud backends unconfigured)
    pub cloud: Option<CloudConfig>,

    /// Turn segmentation timing
    pub segmenter: SegmenterConfig,

    /// Voice selection preferences
    pub voice: VoicePreferences,

    /// Platform speech tooling overrides
    pub platform: PlatformConfig,

    /// Free-text persona description; drives the default voice bucket
    pub persona_description: Option<String>,
}

/// Cloud speech service credentials
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Subscription key
    pub api_key: SecretString,

    /// Service region (e.g. "westeurope")
    pub region: String,
}

/// Turn segmentation timing.
///
/// The two stages are deliberately independent knobs: the continuation
/// window absorbs mid-sentence pauses the recognizer misreports as
/// end-of-speech, and the final-commit window lets the session settle
/// before the pause is trusted.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Continuation window after a recognizer pause
    pub continuation: Duration,

    /// Settle window before committing
    pub final_commit: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            continuation: Duration::from_millis(DEFAULT_CONTINUATION_MS),
            final_commit: Duration::from_millis(DEFAULT_FINAL_COMMIT_MS),
        }
    }
}

/// Voice selection preferences
#[derive(Debug, Clone)]
pub struct VoicePreferences {
    /// Preferred voice keyword, or "auto"
    pub preferred: String,

    /// Locale restriction for voice resolution
    pub locale: String,
}

impl Default for VoicePreferences {
    fn default() -> Self {
        Self {
            preferred: "auto".to_string(),
            locale: "en".to_string(),
        }
    }
}

/// Platform speech tooling overrides
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    /// Explicit path to the platform synthesis binary
    pub synth_command: Option<String>,

    /// Explicit path to a local transcriber binary
    pub transcriber_command: Option<String>,
}

impl Config {
    /// Load configuration from the config file and environment.
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let fc = Self::load_file()?.unwrap_or_default();
        Ok(Self::from_overlay(fc))
    }

    /// Build configuration from an already-parsed file overlay plus the
    /// environment. Split out so tests can exercise precedence without
    /// touching the filesystem.
    #[must_use]
    pub fn from_overlay(fc: AuraConfigFile) -> Self {
        let api_key = std::env::var("AURA_SPEECH_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(fc.cloud.api_key);
        let region = std::env::var("AURA_SPEECH_REGION")
            .ok()
            .filter(|r| !r.is_empty())
            .or(fc.cloud.region);

        // Cloud requires both pieces; a key without a region is unusable.
        let cloud = match (api_key, region) {
            (Some(key), Some(region)) => Some(CloudConfig {
                api_key: SecretString::from(key),
                region,
            }),
            (Some(_), None) => {
                tracing::warn!("AURA_SPEECH_KEY set without a region - cloud speech disabled");
                None
            }
            _ => None,
        };

        let defaults = SegmenterConfig::default();
        let segmenter = SegmenterConfig {
            continuation: fc
                .segmenter
                .continuation_ms
                .map_or(defaults.continuation, Duration::from_millis),
            final_commit: fc
                .segmenter
                .final_commit_ms
                .map_or(defaults.final_commit, Duration::from_millis),
        };

        let voice_defaults = VoicePreferences::default();
        let voice = VoicePreferences {
            preferred: std::env::var("AURA_VOICE")
                .ok()
                .filter(|v| !v.is_empty())
                .or(fc.voice.preferred)
                .unwrap_or(voice_defaults.preferred),
            locale: std::env::var("AURA_LOCALE")
                .ok()
                .filter(|l| !l.is_empty())
                .or(fc.voice.locale)
                .unwrap_or(voice_defaults.locale),
        };

        let platform = PlatformConfig {
            synth_command: fc.platform.synth_command,
            transcriber_command: fc.platform.transcriber_command,
        };

        Self {
            cloud,
            segmenter,
            voice,
            platform,
            persona_description: fc.persona.description,
        }
    }

    /// Path of the persistent config file, if a home directory exists
    #[must_use]
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "omni", "aura")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn load_file() -> Result<Option<AuraConfigFile>> {
        let Some(path) = Self::file_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path)?;
        let parsed = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(Some(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_defaults() {
        let config = Config::from_overlay(AuraConfigFile::default());
        assert_eq!(config.segmenter.continuation, Duration::from_millis(2000));
        assert_eq!(config.segmenter.final_commit, Duration::from_millis(1000));
        assert_eq!(config.voice.preferred, "auto");
        assert_eq!(config.voice.locale, "en");
    }

    #[test]
    fn file_overlay_wins_over_defaults() {
        let fc: AuraConfigFile = toml::from_str(
            r#"
            [segmenter]
            continuation_ms = 800
            final_commit_ms = 400

            [voice]
            preferred = "ryan"
            locale = "en-GB"
        "#,
        )
        .unwrap();

        let config = Config::from_overlay(fc);
        assert_eq!(config.segmenter.continuation, Duration::from_millis(800));
        assert_eq!(config.segmenter.final_commit, Duration::from_millis(400));
        assert_eq!(config.voice.preferred, "ryan");
        assert_eq!(config.voice.locale, "en-GB");
    }

    #[test]
    fn key_without_region_disables_cloud() {
        let fc: AuraConfigFile = toml::from_str(
            r#"
            [cloud]
            api_key = "abc123"
        "#,
        )
        .unwrap();

        let config = Config::from_overlay(fc);
        assert!(config.cloud.is_none());
    }
}
