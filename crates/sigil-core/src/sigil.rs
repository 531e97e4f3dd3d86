use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a sigil's text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Dream,
    Meditation,
    Breath,
    Composite,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::Dream,
        SourceType::Meditation,
        SourceType::Breath,
        SourceType::Composite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dream => "dream",
            Self::Meditation => "meditation",
            Self::Breath => "breath",
            Self::Composite => "composite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Position of this source's marker slot within the trailing source slots.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

/// Semantic region label derived from the dominant encoder band.
/// Descriptive only.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Emotional tone dominates.
    Limbic,
    /// Symbolic imagery dominates.
    Occipital,
    /// Narrative structure dominates.
    Hippocampal,
    /// Depth and awareness dominate.
    Prefrontal,
    /// No band stands out; also the fallback label.
    #[default]
    Cortical,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Limbic,
        Category::Occipital,
        Category::Hippocampal,
        Category::Prefrontal,
        Category::Cortical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Limbic => "limbic",
            Self::Occipital => "occipital",
            Self::Hippocampal => "hippocampal",
            Self::Prefrontal => "prefrontal",
            Self::Cortical => "cortical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Category for a semantic band index (0..4).
    pub fn for_band(band: usize) -> Self {
        match band {
            0 => Self::Limbic,
            1 => Self::Occipital,
            2 => Self::Hippocampal,
            3 => Self::Prefrontal,
            _ => Self::Cortical,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
    Rest,
}

impl BreathPhase {
    pub const ALL: [BreathPhase; 4] = [
        BreathPhase::Inhale,
        BreathPhase::Hold,
        BreathPhase::Exhale,
        BreathPhase::Rest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inhale => "inhale",
            Self::Hold => "hold",
            Self::Exhale => "exhale",
            Self::Rest => "rest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Neurochemistry {
    Dopamine,
    Serotonin,
    Gaba,
    Oxytocin,
    Endorphin,
    Acetylcholine,
}

/// Closed set of optional tags attached to a sigil, plus one opaque bag for
/// producers the engine knows nothing about.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigilMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breath_phase: Option<BreathPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neurochemistry: Option<Neurochemistry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SigilMetadata {
    /// Key under `extra` where a generation fallback records its reason.
    pub const FALLBACK_KEY: &'static str = "fallback";

    pub fn with_breath_phase(mut self, phase: BreathPhase) -> Self {
        self.breath_phase = Some(phase);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_dream(mut self, dream_id: impl Into<String>) -> Self {
        self.dream_id = Some(dream_id.into());
        self
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.extra.get(Self::FALLBACK_KEY).and_then(|v| v.as_str())
    }
}

/// A fixed-length fingerprint of one text snapshot.
///
/// Sigils are never mutated once stored; the store only hands out shared
/// references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sigil {
    /// `Uuid::nil()` means "not yet assigned"; the store assigns one on append.
    pub id: Uuid,
    pub vector: Vec<f64>,
    pub category: Category,
    pub source_type: SourceType,
    pub timestamp: DateTime<Utc>,
    pub strength: f64,
    pub hash: u32,
    #[serde(default)]
    pub metadata: SigilMetadata,
}

impl Sigil {
    pub fn new(vector: Vec<f64>, category: Category, source_type: SourceType) -> Self {
        Self {
            id: Uuid::nil(),
            vector,
            category,
            source_type,
            timestamp: Utc::now(),
            strength: 0.0,
            hash: 0,
            metadata: SigilMetadata::default(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: SigilMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.fallback_reason().is_some()
    }

    /// Base-3 rendering of the text checksum.
    pub fn ternary_code(&self) -> String {
        to_ternary(self.hash)
    }
}

pub fn to_ternary(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(char::from(b'0' + (n % 3) as u8));
        n /= 3;
    }
    digits.iter().rev().collect()
}

pub fn from_ternary(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    s.chars().try_fold(0u32, |acc, c| {
        let d = c.to_digit(3)?;
        acc.checked_mul(3)?.checked_add(d)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_string_roundtrip() {
        for s in SourceType::ALL {
            assert_eq!(SourceType::parse(s.as_str()), Some(s));
        }
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        for p in BreathPhase::ALL {
            assert_eq!(BreathPhase::parse(p.as_str()), Some(p));
        }
        assert_eq!(SourceType::parse("nap"), None);
    }

    #[test]
    fn test_band_categories() {
        assert_eq!(Category::for_band(0), Category::Limbic);
        assert_eq!(Category::for_band(3), Category::Prefrontal);
        assert_eq!(Category::for_band(9), Category::Cortical);
    }

    #[test]
    fn test_ternary() {
        assert_eq!(to_ternary(0), "0");
        assert_eq!(to_ternary(5), "12");
        assert_eq!(from_ternary("12"), Some(5));
        assert_eq!(from_ternary("13"), None);
        assert_eq!(from_ternary(""), None);
        assert_eq!(from_ternary(&to_ternary(u32::MAX)), Some(u32::MAX));
    }

    #[test]
    fn test_metadata_serde_is_camel_case_and_sparse() {
        let meta = SigilMetadata::default()
            .with_breath_phase(BreathPhase::Exhale)
            .with_user("u1");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["breathPhase"], "exhale");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("dreamId").is_none());
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_fallback_reason() {
        let mut meta = SigilMetadata::default();
        assert!(meta.fallback_reason().is_none());
        meta.extra.insert(
            SigilMetadata::FALLBACK_KEY.to_string(),
            serde_json::Value::from("too long"),
        );
        assert_eq!(meta.fallback_reason(), Some("too long"));
    }
}
