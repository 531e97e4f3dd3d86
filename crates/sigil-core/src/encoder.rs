//! Deterministic text → fixed-length vector encoding.
//!
//! Layout for a vector of length `L`:
//!
//! ```text
//! [0 .. 32)          four semantic bands, 8 concept slots each
//! [32 .. L-4)        hash scatter of the token stream
//! [L-4 .. L)         source-type marker
//! ```
//!
//! Concept slots count keyword hits and saturate at 1.0. Keywords match as
//! token prefixes, except those ending in `$`, which match whole tokens only
//! ("cry$" counts "cry" but not "crystal"). The scatter
//! region keeps novel text from collapsing to the zero vector. The whole
//! vector is L2-normalized unless it is exactly zero.

use crate::constants::{
    BAND_COUNT, BAND_SPAN, BAND_WIDTH, EPSILON, KEYWORD_SATURATION, MAX_TEXT_BYTES,
    MIN_DIMENSIONS, SCATTER_CAP, SCATTER_STEP, SOURCE_MARKER, SOURCE_SLOTS,
};
use crate::error::{EngineError, Result};
use crate::sigil::{Category, SourceType};
use crate::tokenizer::{code_sum, tokenize};

type Concept = (&'static str, &'static [&'static str]);

const EMOTIONAL: [Concept; BAND_WIDTH] = [
    ("joy", &["joy", "happ", "delight", "glad", "bliss"]),
    ("peace", &["peace", "calm", "serene", "tranquil", "gentle"]),
    ("love", &["love", "tender", "warm", "compassion", "kind$", "kindness"]),
    ("fear", &["fear", "afraid", "scared", "terror", "dread"]),
    (
        "sadness",
        &["sad", "grief", "sorrow", "cry$", "cried", "crying", "cries", "tears", "lonel"],
    ),
    ("anger", &["anger", "angry", "rage", "furious", "frustrat"]),
    ("anxiety", &["anxi", "worr", "nervous", "tense", "stress"]),
    ("awe", &["awe", "wonder", "marvel", "amaz"]),
];

const SYMBOLIC: [Concept; BAND_WIDTH] = [
    ("water", &["water", "ocean", "river", "rain", "wave", "lake"]),
    ("light", &["light", "sun", "glow", "shin", "radian", "bright"]),
    ("darkness", &["dark", "shadow", "night", "black"]),
    ("fire", &["fire", "flame", "burn", "ember"]),
    ("earth", &["earth", "mountain", "stone", "ground", "forest", "tree"]),
    ("sky", &["sky", "cloud", "stars", "moon", "wind"]),
    ("animal", &["animal", "bird", "snake", "wolf", "dog", "fish"]),
    ("threshold", &["door", "gate", "bridge", "path", "road", "key$", "keys$"]),
];

const NARRATIVE: [Concept; BAND_WIDTH] = [
    ("journey", &["journey", "travel", "walk", "wander", "search"]),
    ("transformation", &["chang", "transform", "becom", "shift", "rebirth"]),
    ("conflict", &["fight", "chase", "battle", "struggl", "escap"]),
    ("encounter", &["meet", "stranger", "friend", "figure", "person"]),
    ("loss", &["lost", "lose", "missing", "gone", "leav"]),
    ("return", &["return", "home", "back$", "again"]),
    ("falling", &["fall", "drop", "sink", "descend"]),
    ("flying", &["fly", "flight", "float", "soar", "rise", "rising"]),
];

const DEPTH: [Concept; BAND_WIDTH] = [
    ("awareness", &["aware", "notic", "observ", "attention", "mindful"]),
    ("presence", &["present", "moment", "grounded", "embodied"]),
    ("insight", &["insight", "realiz", "understand", "clarity", "epiphan"]),
    ("self", &["self", "myself", "identity", "soul"]),
    ("unity", &["unity", "oneness", "connect", "whole", "everything"]),
    ("breath", &["breath", "inhal", "exhal"]),
    ("lucidity", &["lucid", "awake", "conscious", "dreaming"]),
    ("stillness", &["silen", "quiet", "still", "empty", "void"]),
];

const BANDS: [&[Concept; BAND_WIDTH]; BAND_COUNT] = [&EMOTIONAL, &SYMBOLIC, &NARRATIVE, &DEPTH];

fn keyword_hit(token: &str, keyword: &str) -> bool {
    match keyword.strip_suffix('$') {
        Some(word) => token == word,
        None => token.starts_with(keyword),
    }
}

/// Full result of encoding one text.
#[derive(Clone, Debug, PartialEq)]
pub struct Encoding {
    pub vector: Vec<f64>,
    pub category: Category,
    /// Share of squared magnitude held by the semantic bands, in [0, 1].
    pub strength: f64,
    /// True when the input produced the zero vector.
    pub degenerate: bool,
}

/// Stateless feature encoder for a fixed vector length.
#[derive(Clone, Debug)]
pub struct Encoder {
    dimensions: usize,
}

impl Encoder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions < MIN_DIMENSIONS {
            return Err(EngineError::InvalidConfig(format!(
                "dimensions must be at least {MIN_DIMENSIONS}, got {dimensions}"
            )));
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Encode text into a normalized vector. Empty text yields the zero vector.
    /// Oversized input also yields the zero vector here; use [`try_analyze`]
    /// to observe the rejection.
    ///
    /// [`try_analyze`]: Encoder::try_analyze
    pub fn encode(&self, text: &str, source: SourceType) -> Vec<f64> {
        match self.try_analyze(text, source) {
            Ok(encoding) => encoding.vector,
            Err(_) => vec![0.0; self.dimensions],
        }
    }

    /// Encode and classify, rejecting input the encoder refuses to process.
    pub fn try_analyze(&self, text: &str, source: SourceType) -> Result<Encoding> {
        if text.len() > MAX_TEXT_BYTES {
            return Err(EngineError::InvalidInput(format!(
                "text is {} bytes, limit is {MAX_TEXT_BYTES}",
                text.len()
            )));
        }

        let tokens = tokenize(text);
        let mut vector = vec![0.0; self.dimensions];

        for (band_idx, band) in BANDS.iter().enumerate() {
            for (concept_idx, (_, keywords)) in band.iter().enumerate() {
                let hits = tokens
                    .iter()
                    .filter(|t| keywords.iter().any(|k| keyword_hit(t, k)))
                    .count();
                vector[band_idx * BAND_WIDTH + concept_idx] =
                    (hits as f64 / KEYWORD_SATURATION).min(1.0);
            }
        }

        let scatter_width = self.dimensions - BAND_SPAN - SOURCE_SLOTS;
        for token in &tokens {
            let idx = BAND_SPAN + (code_sum(token) % scatter_width as u64) as usize;
            vector[idx] = (vector[idx] + SCATTER_STEP).min(SCATTER_CAP);
        }

        if !tokens.is_empty() {
            let marker = self.dimensions - SOURCE_SLOTS + source.ordinal();
            vector[marker] = SOURCE_MARKER;
        }

        let category = dominant_band(&vector);
        let band_energy: f64 = vector[..BAND_SPAN].iter().map(|x| x * x).sum();
        let total_energy: f64 = vector.iter().map(|x| x * x).sum();
        let strength = if total_energy > 0.0 {
            (band_energy / total_energy).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let vector = normalize(vector);
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(EngineError::InvalidInput(
                "encoding produced non-finite components".to_string(),
            ));
        }
        let degenerate = magnitude(&vector) < EPSILON;

        Ok(Encoding {
            vector,
            category,
            strength,
            degenerate,
        })
    }

    /// Concept names in slot order, for diagnostics.
    pub fn concept_names() -> impl Iterator<Item = &'static str> {
        BANDS.iter().flat_map(|band| band.iter().map(|(name, _)| *name))
    }
}

/// Band with the largest summed weight, `Cortical` if none has any.
fn dominant_band(vector: &[f64]) -> Category {
    let mut best: Option<(usize, f64)> = None;
    for band in 0..BAND_COUNT {
        let start = band * BAND_WIDTH;
        let sum: f64 = vector[start..start + BAND_WIDTH].iter().sum();
        if sum > 0.0 && best.is_none_or(|(_, b)| sum > b) {
            best = Some((band, sum));
        }
    }
    best.map_or(Category::Cortical, |(band, _)| Category::for_band(band))
}

pub fn magnitude(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// L2-normalize. A vector of exactly zero magnitude is returned unchanged.
pub fn normalize(mut v: Vec<f64>) -> Vec<f64> {
    let mag = magnitude(&v);
    if mag == 0.0 {
        return v;
    }
    for x in &mut v {
        *x /= mag;
    }
    v
}

/// Uniform unit vector, used by the generation fallback.
pub fn uniform(dimensions: usize) -> Vec<f64> {
    if dimensions == 0 {
        return Vec::new();
    }
    vec![1.0 / (dimensions as f64).sqrt(); dimensions]
}

/// Whether any slot in a semantic band is non-zero. `band` is 0..4.
pub fn band_active(vector: &[f64], band: usize) -> bool {
    let start = band * BAND_WIDTH;
    vector
        .get(start..start + BAND_WIDTH)
        .is_some_and(|slots| slots.iter().any(|x| *x > 0.0))
}
