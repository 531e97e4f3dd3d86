//! Aggregate statistics over a set of sigils.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN;
use crate::sigil::{BreathPhase, Category, Sigil, SourceType};

/// Absolute difference between the mean strength of the later and earlier
/// halves that counts as a trend.
const TREND_TOLERANCE: f64 = 0.05;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub dominant_category: String,
    pub dominant_source: String,
    pub dominant_breath_phase: String,
    /// `rising`, `falling`, `stable`, or `unknown` with fewer than two sigils.
    pub strength_trend: String,
}

impl Insights {
    fn unknown() -> Self {
        Self {
            dominant_category: UNKNOWN.to_string(),
            dominant_source: UNKNOWN.to_string(),
            dominant_breath_phase: UNKNOWN.to_string(),
            strength_trend: UNKNOWN.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionReport {
    pub total_sigils: usize,
    /// Every category, including those with zero members.
    pub category_distribution: BTreeMap<Category, usize>,
    pub source_type_distribution: BTreeMap<SourceType, usize>,
    /// Only sigils that carry a breath phase are counted.
    pub breath_phase_distribution: BTreeMap<BreathPhase, usize>,
    pub average_strength: f64,
    pub insights: Insights,
}

/// Summarize a sigil set. Empty input gives zero counts and `unknown`
/// insights.
pub fn summarize(sigils: &[&Sigil]) -> EvolutionReport {
    let mut category_distribution: BTreeMap<Category, usize> =
        Category::ALL.into_iter().map(|c| (c, 0)).collect();
    let mut source_type_distribution: BTreeMap<SourceType, usize> =
        SourceType::ALL.into_iter().map(|s| (s, 0)).collect();
    let mut breath_phase_distribution: BTreeMap<BreathPhase, usize> =
        BreathPhase::ALL.into_iter().map(|p| (p, 0)).collect();

    for s in sigils {
        *category_distribution.entry(s.category).or_default() += 1;
        *source_type_distribution.entry(s.source_type).or_default() += 1;
        if let Some(phase) = s.metadata.breath_phase {
            *breath_phase_distribution.entry(phase).or_default() += 1;
        }
    }

    if sigils.is_empty() {
        return EvolutionReport {
            total_sigils: 0,
            category_distribution,
            source_type_distribution,
            breath_phase_distribution,
            average_strength: 0.0,
            insights: Insights::unknown(),
        };
    }

    let average_strength = mean(sigils.iter().map(|s| s.strength));

    let insights = Insights {
        dominant_category: dominant(&category_distribution, Category::as_str),
        dominant_source: dominant(&source_type_distribution, SourceType::as_str),
        dominant_breath_phase: dominant(&breath_phase_distribution, BreathPhase::as_str),
        strength_trend: strength_trend(sigils).to_string(),
    };

    EvolutionReport {
        total_sigils: sigils.len(),
        category_distribution,
        source_type_distribution,
        breath_phase_distribution,
        average_strength,
        insights,
    }
}

/// Key with the highest count; the first key wins ties. `unknown` when all
/// counts are zero.
fn dominant<K: Copy + Ord>(dist: &BTreeMap<K, usize>, name: fn(&K) -> &'static str) -> String {
    dist.iter()
        .filter(|(_, count)| **count > 0)
        .fold(None::<(&K, usize)>, |best, (k, count)| match best {
            Some((_, b)) if b >= *count => best,
            _ => Some((k, *count)),
        })
        .map_or_else(|| UNKNOWN.to_string(), |(k, _)| name(k).to_string())
}

fn strength_trend(sigils: &[&Sigil]) -> &'static str {
    if sigils.len() < 2 {
        return UNKNOWN;
    }
    let mut ordered: Vec<&Sigil> = sigils.to_vec();
    ordered.sort_by_key(|s| s.timestamp);
    let (early, late) = ordered.split_at(ordered.len() / 2);
    let early = mean(early.iter().map(|s| s.strength));
    let late = mean(late.iter().map(|s| s.strength));
    let delta = late - early;
    if delta > TREND_TOLERANCE {
        "rising"
    } else if delta < -TREND_TOLERANCE {
        "falling"
    } else {
        "stable"
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
