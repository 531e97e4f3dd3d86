//! Alternative ways of producing generation input. Every strategy ends in
//! the same encoder and store; they only decide the text, source and tags.

use crate::sigil::{BreathPhase, SigilMetadata, SourceType};

/// Input for one generation call.
#[derive(Clone, Debug, PartialEq)]
pub struct SigilSeed {
    pub text: String,
    pub source_type: SourceType,
    pub metadata: SigilMetadata,
}

impl SigilSeed {
    pub fn new(text: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            text: text.into(),
            source_type,
            metadata: SigilMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: SigilMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

pub trait SeedStrategy {
    fn seed(&self) -> SigilSeed;
}

impl SeedStrategy for SigilSeed {
    fn seed(&self) -> SigilSeed {
        self.clone()
    }
}

/// Generation driven by the current phase of a breathing cycle.
#[derive(Clone, Debug)]
pub struct BreathStrategy {
    pub phase: BreathPhase,
    /// Completed cycles so far; longer sessions lean toward stillness.
    pub cycle: u32,
    /// Optional free text the user attached to this breath.
    pub note: Option<String>,
}

impl BreathStrategy {
    pub fn new(phase: BreathPhase) -> Self {
        Self {
            phase,
            cycle: 0,
            note: None,
        }
    }

    fn phrase(&self) -> &'static str {
        match self.phase {
            BreathPhase::Inhale => "inhale breath rising light expanding awareness",
            BreathPhase::Hold => "holding breath still present moment",
            BreathPhase::Exhale => "exhale breath release calm falling gentle",
            BreathPhase::Rest => "rest quiet empty silence peace",
        }
    }
}

impl SeedStrategy for BreathStrategy {
    fn seed(&self) -> SigilSeed {
        let mut text = self.phrase().to_string();
        if self.cycle >= 10 {
            text.push_str(" stillness");
        }
        if let Some(note) = &self.note {
            text.push(' ');
            text.push_str(note);
        }
        SigilSeed::new(text, SourceType::Breath)
            .with_metadata(SigilMetadata::default().with_breath_phase(self.phase))
    }
}

/// Curated sigil entries usable without any user text.
pub const CURATED_SIGILS: &[(&str, &str)] = &[
    ("tidewalker", "walking along the ocean at night under the moon"),
    ("ember-heart", "warm fire of love burning gently in the dark"),
    ("sky-door", "a door in the clouds opening onto bright light"),
    ("root-stone", "grounded like stone in the forest, present and still"),
    ("mirror-self", "meeting myself as a stranger, a sudden insight"),
    ("river-return", "the river carries me back home again"),
];

/// Generation from a named curated entry.
#[derive(Clone, Debug)]
pub struct CuratedStrategy {
    name: String,
    phrase: &'static str,
}

impl CuratedStrategy {
    pub fn named(name: &str) -> Option<Self> {
        CURATED_SIGILS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, phrase)| Self {
                name: (*n).to_string(),
                phrase: *phrase,
            })
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        CURATED_SIGILS.iter().map(|(n, _)| *n)
    }
}

impl SeedStrategy for CuratedStrategy {
    fn seed(&self) -> SigilSeed {
        let mut metadata = SigilMetadata::default();
        metadata
            .extra
            .insert("curated".to_string(), serde_json::Value::from(self.name.clone()));
        SigilSeed::new(self.phrase, SourceType::Composite).with_metadata(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breath_seed_carries_phase() {
        let seed = BreathStrategy::new(BreathPhase::Exhale).seed();
        assert_eq!(seed.source_type, SourceType::Breath);
        assert_eq!(seed.metadata.breath_phase, Some(BreathPhase::Exhale));
        assert!(seed.text.contains("exhale"));
    }

    #[test]
    fn test_breath_seed_long_session_and_note() {
        let strategy = BreathStrategy {
            phase: BreathPhase::Rest,
            cycle: 12,
            note: Some("ocean".to_string()),
        };
        let seed = strategy.seed();
        assert!(seed.text.ends_with("stillness ocean"));
    }

    #[test]
    fn test_curated_lookup() {
        let s = CuratedStrategy::named("sky-door").unwrap();
        let seed = s.seed();
        assert_eq!(seed.source_type, SourceType::Composite);
        assert_eq!(seed.metadata.extra["curated"], "sky-door");
        assert!(CuratedStrategy::named("missing").is_none());
        assert_eq!(CuratedStrategy::names().count(), CURATED_SIGILS.len());
    }

    #[test]
    fn test_plain_seed_is_its_own_strategy() {
        let seed = SigilSeed::new("hello", SourceType::Dream);
        assert_eq!(seed.seed(), seed);
    }
}
