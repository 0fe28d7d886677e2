//! Persona gender classification
//!
//! Derives a gender bucket from a free-text persona description. The bucket
//! only drives default voice selection; it is recomputed on every persona
//! change and never persisted.
//!
//! Rule order: an explicit structured declaration (`gender: female`) wins
//! outright; otherwise female- and male-associated words are counted with
//! word-boundary matching and the strictly higher count wins. Ties are
//! reported as [`PersonaGender::Unknown`].

use std::sync::LazyLock;

use regex::Regex;

/// Gender bucket derived from a persona description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaGender {
    /// Female-presenting persona
    Female,
    /// Male-presenting persona
    Male,
    /// No clear signal either way
    Unknown,
}

/// Structured declaration rule, e.g. "gender: female" or "gender = m".
///
/// Checked before any keyword scoring so an explicit tag is deterministic
/// even in text whose pronouns would score the other way.
static GENDER_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bgender\s*[:=]\s*(female|male|woman|man|f|m)\b")
        .expect("gender tag regex is valid")
});

/// Female-associated scoring words
const FEMALE_WORDS: &[&str] = &[
    "she", "her", "hers", "herself", "female", "woman", "girl", "lady", "queen", "goddess",
    "mother", "sister", "daughter", "aunt", "actress", "waitress", "feminine",
];

/// Male-associated scoring words
const MALE_WORDS: &[&str] = &[
    "he", "him", "his", "himself", "male", "man", "boy", "guy", "king", "god", "father",
    "brother", "son", "uncle", "gentleman", "masculine",
];

/// Classify a persona description into a gender bucket
#[must_use]
pub fn classify(text: &str) -> PersonaGender {
    if let Some(tagged) = structured_declaration(text) {
        tracing::debug!(gender = ?tagged, "persona gender from structured tag");
        return tagged;
    }

    let (female, male) = score_keywords(text);
    tracing::debug!(female, male, "persona gender keyword scores");

    match female.cmp(&male) {
        std::cmp::Ordering::Greater => PersonaGender::Female,
        std::cmp::Ordering::Less => PersonaGender::Male,
        std::cmp::Ordering::Equal => PersonaGender::Unknown,
    }
}

/// Check for an explicit `gender: ...` declaration
fn structured_declaration(text: &str) -> Option<PersonaGender> {
    let captures = GENDER_TAG.captures(text)?;
    let value = captures.get(1)?.as_str().to_ascii_lowercase();

    match value.as_str() {
        "female" | "woman" | "f" => Some(PersonaGender::Female),
        "male" | "man" | "m" => Some(PersonaGender::Male),
        _ => None,
    }
}

/// Count female- and male-associated words, word-boundary matched
fn score_keywords(text: &str) -> (usize, usize) {
    let mut female = 0;
    let mut male = 0;

    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
    {
        let token = token.trim_matches('\'').to_ascii_lowercase();
        if FEMALE_WORDS.contains(&token.as_str()) {
            female += 1;
        } else if MALE_WORDS.contains(&token.as_str()) {
            male += 1;
        }
    }

    (female, male)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_pronoun_majority() {
        assert_eq!(
            classify("A cheerful pirate captain. She sails the seas with her loyal crew."),
            PersonaGender::Female
        );
        assert_eq!(
            classify("An old wizard. He guards his tower and rarely leaves it."),
            PersonaGender::Male
        );
    }

    #[test]
    fn tie_is_unknown() {
        assert_eq!(classify("He met her at the market."), PersonaGender::Unknown);
        assert_eq!(classify("A talking teapot."), PersonaGender::Unknown);
    }

    #[test]
    fn structured_tag_beats_scoring() {
        // Pronoun count favors male, but the tag is explicit.
        let text = "Gender: female. He said he would return. He promised.";
        assert_eq!(classify(text), PersonaGender::Female);

        let text = "gender = m\nShe is always mentioned by her friends.";
        assert_eq!(classify(text), PersonaGender::Male);
    }

    #[test]
    fn tag_accepts_short_forms() {
        assert_eq!(classify("gender: f"), PersonaGender::Female);
        assert_eq!(classify("gender:M"), PersonaGender::Male);
        assert_eq!(classify("GENDER = Woman"), PersonaGender::Female);
    }

    #[test]
    fn word_boundaries_are_respected() {
        // "she" inside "shell" and "he" inside "the" must not count.
        assert_eq!(classify("the shell on the shelf"), PersonaGender::Unknown);
        // "hero" contains "her" but is not a match.
        assert_eq!(classify("a hero of the realm"), PersonaGender::Unknown);
    }

    #[test]
    fn empty_text_is_unknown() {
        assert_eq!(classify(""), PersonaGender::Unknown);
    }
}
