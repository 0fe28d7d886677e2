//! TOML configuration file loading
//!
//! Supports `~/.config/omni/aura/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AuraConfigFile {
    /// Cloud speech service credentials
    #[serde(default)]
    pub cloud: CloudFileConfig,

    /// Turn segmentation timing
    #[serde(default)]
    pub segmenter: SegmenterFileConfig,

    /// Voice selection
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Platform speech tooling overrides
    #[serde(default)]
    pub platform: PlatformFileConfig,

    /// Persona description used for voice defaults
    #[serde(default)]
    pub persona: PersonaFileConfig,
}

/// Cloud speech service credentials
#[derive(Debug, Default, Deserialize)]
pub struct CloudFileConfig {
    /// Subscription key for the cloud speech service
    pub api_key: Option<String>,

    /// Service region (e.g. "westeurope")
    pub region: Option<String>,
}

/// Turn segmentation timing knobs.
///
/// Both stages are independent on purpose; see `TurnSegmenter`.
#[derive(Debug, Default, Deserialize)]
pub struct SegmenterFileConfig {
    /// Continuation window after a recognizer pause, in milliseconds
    pub continuation_ms: Option<u64>,

    /// Settle window before trusting the pause, in milliseconds
    pub final_commit_ms: Option<u64>,
}

/// Voice selection configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Preferred voice keyword (e.g. "ryan"), or "auto"
    pub preferred: Option<String>,

    /// BCP-47 locale restriction for voice resolution (e.g. "en-GB")
    pub locale: Option<String>,
}

/// Platform speech tooling overrides
#[derive(Debug, Default, Deserialize)]
pub struct PlatformFileConfig {
    /// Explicit path to the platform synthesis binary (say/espeak-ng/spd-say)
    pub synth_command: Option<String>,

    /// Explicit path to a local transcriber binary
    pub transcriber_command: Option<String>,
}

/// Persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    /// Free-text persona description; drives the default voice bucket
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let toml = r#"
            [cloud]
            region = "westeurope"

            [segmenter]
            continuation_ms = 1500
        "#;

        let parsed: AuraConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(parsed.cloud.region.as_deref(), Some("westeurope"));
        assert!(parsed.cloud.api_key.is_none());
        assert_eq!(parsed.segmenter.continuation_ms, Some(1500));
        assert!(parsed.segmenter.final_commit_ms.is_none());
        assert!(parsed.voice.preferred.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let parsed: AuraConfigFile = toml::from_str("").unwrap();
        assert!(parsed.cloud.api_key.is_none());
        assert!(parsed.persona.description.is_none());
    }
}
