//! Voice resolution
//!
//! Maps a requested voice keyword (or "auto") plus a classified persona
//! gender onto a concrete voice identifier of the active synthesis
//! backend. Resolution is a fixed priority chain; the first tier that
//! produces a voice wins:
//!
//! 1. exact catalog-mapped name, restricted to available voices
//! 2. keyword substring within the locale, preferring natural voices
//! 3. gender-bucket catalog defaults (opposite bucket before giving up)
//! 4. any available voice in the locale
//! 5. none — the backend's own default voice

use std::sync::Arc;

use crate::catalog::{GenderBucket, VoiceProfile, VoiceProfileCatalog, locale_matches};
use crate::persona::PersonaGender;
use crate::voice::backend::VoiceInfo;

/// A requested voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceHint {
    /// Pick automatically from the persona
    Auto,
    /// A concrete voice keyword (e.g. "ryan")
    Keyword(String),
}

impl VoiceHint {
    /// Parse a configured preference string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Keyword(trimmed.to_ascii_lowercase())
        }
    }
}

/// Resolves voice hints against the catalog and a backend's voice set
pub struct VoiceResolver {
    catalog: Arc<VoiceProfileCatalog>,
    locale: String,
}

impl VoiceResolver {
    /// Create a resolver for the given locale restriction
    #[must_use]
    pub fn new(catalog: Arc<VoiceProfileCatalog>, locale: impl Into<String>) -> Self {
        Self {
            catalog,
            locale: locale.into(),
        }
    }

    /// Resolve to a backend voice name, or `None` for the backend default
    #[must_use]
    pub fn resolve(
        &self,
        hint: &VoiceHint,
        gender: PersonaGender,
        available: &[VoiceInfo],
    ) -> Option<String> {
        if let VoiceHint::Keyword(keyword) = hint {
            // Tier 1: exact mapped-name match.
            if let Some(profile) = self.catalog.find(keyword)
                && let Some(voice) = available
                    .iter()
                    .find(|v| v.name.eq_ignore_ascii_case(profile.backend_name))
            {
                tracing::debug!(keyword, voice = %voice.name, "resolved via exact mapping");
                return Some(voice.name.clone());
            }

            // Tier 2: keyword substring within the locale.
            let needle = keyword.to_ascii_lowercase();
            let mut in_locale = available
                .iter()
                .filter(|v| locale_matches(&v.locale, &self.locale))
                .filter(|v| v.name.to_ascii_lowercase().contains(&needle));
            let substring = in_locale
                .clone()
                .find(|v| v.natural)
                .or_else(|| in_locale.next());
            if let Some(voice) = substring {
                tracing::debug!(keyword, voice = %voice.name, "resolved via substring match");
                return Some(voice.name.clone());
            }
        }

        // Tier 3: gender-bucket defaults. A missed concrete keyword still
        // knows its own bucket, which takes precedence over the persona's.
        let bucket = self
            .hinted_bucket(hint)
            .or_else(|| GenderBucket::from_persona(gender));
        if let Some(bucket) = bucket
            && let Some(name) = self
                .bucket_match(bucket, available)
                .or_else(|| self.bucket_match(bucket.opposite(), available))
        {
            tracing::debug!(?bucket, voice = %name, "resolved via gender bucket");
            return Some(name);
        }

        // Tier 4: anything in the locale, preferring natural voices.
        let mut in_locale = available
            .iter()
            .filter(|v| locale_matches(&v.locale, &self.locale));
        let fallback = in_locale
            .clone()
            .find(|v| v.natural)
            .or_else(|| in_locale.next());
        if let Some(voice) = fallback {
            tracing::debug!(voice = %voice.name, "resolved via locale fallback");
            return Some(voice.name.clone());
        }

        // Tier 5: let the backend use its own default.
        tracing::debug!("no voice resolved; backend default");
        None
    }

    /// Bucket of a concrete-keyword hint, when the catalog knows it
    fn hinted_bucket(&self, hint: &VoiceHint) -> Option<GenderBucket> {
        match hint {
            VoiceHint::Keyword(keyword) => self.catalog.find(keyword).map(|p| p.gender),
            VoiceHint::Auto => None,
        }
    }

    /// First available voice matching any catalog profile of the bucket
    fn bucket_match(&self, bucket: GenderBucket, available: &[VoiceInfo]) -> Option<String> {
        self.catalog.bucket(bucket).find_map(|profile| {
            available
                .iter()
                .find(|v| voice_matches_profile(v, profile))
                .map(|v| v.name.clone())
        })
    }
}

/// Whether an available voice is the catalog profile's voice on this
/// backend: an exact mapped-name match, or a name carrying the keyword.
fn voice_matches_profile(voice: &VoiceInfo, profile: &VoiceProfile) -> bool {
    voice.name.eq_ignore_ascii_case(profile.backend_name)
        || voice.name.to_ascii_lowercase().contains(profile.keyword)
}
