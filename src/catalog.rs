//! Voice profile catalog
//!
//! Static table of known voice identities. Each profile maps a short
//! keyword to the concrete cloud voice name, its locale, and a gender
//! bucket used for persona-driven defaults. The catalog is immutable
//! after startup and safe to share across the pipeline.

use crate::persona::PersonaGender;

/// Gender bucket of a voice identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenderBucket {
    /// Female voices
    Female,
    /// Male voices
    Male,
}

impl GenderBucket {
    /// The other bucket
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Female => Self::Male,
            Self::Male => Self::Female,
        }
    }

    /// Bucket matching a classified persona gender, if any
    #[must_use]
    pub const fn from_persona(gender: PersonaGender) -> Option<Self> {
        match gender {
            PersonaGender::Female => Some(Self::Female),
            PersonaGender::Male => Some(Self::Male),
            PersonaGender::Unknown => None,
        }
    }
}

/// A known voice identity
#[derive(Debug, Clone)]
pub struct VoiceProfile {
    /// Short keyword users refer to the voice by (lowercase)
    pub keyword: &'static str,

    /// Concrete cloud voice identifier
    pub backend_name: &'static str,

    /// BCP-47 locale of the voice
    pub locale: &'static str,

    /// Gender bucket
    pub gender: GenderBucket,
}

/// Catalog of known voice identities
#[derive(Debug)]
pub struct VoiceProfileCatalog {
    profiles: Vec<VoiceProfile>,
}

impl VoiceProfileCatalog {
    /// Build the default catalog of cloud neural voices
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: vec![
                profile("aria", "en-US-AriaNeural", "en-US", GenderBucket::Female),
                profile("jenny", "en-US-JennyNeural", "en-US", GenderBucket::Female),
                profile("michelle", "en-US-MichelleNeural", "en-US", GenderBucket::Female),
                profile("guy", "en-US-GuyNeural", "en-US", GenderBucket::Male),
                profile("davis", "en-US-DavisNeural", "en-US", GenderBucket::Male),
                profile("tony", "en-US-TonyNeural", "en-US", GenderBucket::Male),
                profile("sonia", "en-GB-SoniaNeural", "en-GB", GenderBucket::Female),
                profile("libby", "en-GB-LibbyNeural", "en-GB", GenderBucket::Female),
                profile("ryan", "en-GB-RyanNeural", "en-GB", GenderBucket::Male),
                profile("thomas", "en-GB-ThomasNeural", "en-GB", GenderBucket::Male),
                profile("natasha", "en-AU-NatashaNeural", "en-AU", GenderBucket::Female),
                profile("william", "en-AU-WilliamNeural", "en-AU", GenderBucket::Male),
            ],
        }
    }

    /// Look up a profile by keyword (case-insensitive)
    #[must_use]
    pub fn find(&self, keyword: &str) -> Option<&VoiceProfile> {
        let keyword = keyword.trim().to_ascii_lowercase();
        self.profiles.iter().find(|p| p.keyword == keyword)
    }

    /// All profiles in a gender bucket, catalog order
    pub fn bucket(&self, gender: GenderBucket) -> impl Iterator<Item = &VoiceProfile> {
        self.profiles.iter().filter(move |p| p.gender == gender)
    }

    /// All profiles whose locale matches the given restriction.
    ///
    /// A bare language ("en") matches any region of that language.
    pub fn in_locale<'a>(&'a self, locale: &'a str) -> impl Iterator<Item = &'a VoiceProfile> {
        self.profiles
            .iter()
            .filter(move |p| locale_matches(p.locale, locale))
    }

    /// All profiles
    #[must_use]
    pub fn profiles(&self) -> &[VoiceProfile] {
        &self.profiles
    }
}

impl Default for VoiceProfileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

const fn profile(
    keyword: &'static str,
    backend_name: &'static str,
    locale: &'static str,
    gender: GenderBucket,
) -> VoiceProfile {
    VoiceProfile {
        keyword,
        backend_name,
        locale,
        gender,
    }
}

/// Whether a voice locale satisfies a requested restriction.
///
/// `"en"` matches `"en-US"`; `"en-GB"` matches only `"en-GB"`.
#[must_use]
pub fn locale_matches(voice_locale: &str, want: &str) -> bool {
    let voice = voice_locale.to_ascii_lowercase();
    let want = want.to_ascii_lowercase();

    voice == want || voice.starts_with(&format!("{want}-"))
}
