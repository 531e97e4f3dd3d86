//! Pattern recognition: single-linkage clustering over a sigil set, and
//! matching single sigils against a library of named templates.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MIN_CLUSTER_SIZE;
use crate::encoder::Encoder;
use crate::sigil::{Category, Sigil, SourceType};
use crate::similarity::{SimilarityIndex, cosine};

/// Sigils joined by a chain of pairwise similarities at or above threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCluster {
    /// Rank in `ClusterReport::clusters` (0 = largest).
    pub index: usize,
    /// Members oldest first.
    pub members: Vec<Uuid>,
    /// Most frequent member category.
    pub label: Category,
    /// How many members carry `label`.
    pub frequency: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantPattern {
    pub cluster: usize,
    pub label: Category,
    pub size: usize,
    /// Fraction of the clustered input this pattern covers.
    pub share: f64,
}

/// One input sigil's place in time and cluster membership.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPoint {
    pub sigil: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `None` when the sigil did not join any cluster.
    pub cluster: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    /// Clusters of at least two members, largest first.
    pub clusters: Vec<PatternCluster>,
    pub dominant_patterns: Vec<DominantPattern>,
    /// Every input sigil ordered by timestamp.
    pub temporal_flow: Vec<FlowPoint>,
}

/// Disjoint-set forest with path halving and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Single-linkage clustering: any pair scoring at least `threshold` shares a
/// cluster, closed transitively. O(n²) similarity lookups.
pub fn cluster_sigils(index: &SimilarityIndex, sigils: &[&Sigil], threshold: f64) -> ClusterReport {
    let mut ordered: Vec<&Sigil> = sigils.to_vec();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    ordered.dedup_by_key(|s| s.id);

    let n = ordered.len();
    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if index.similarity(ordered[i], ordered[j]) >= threshold {
                uf.union(i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    // Members are already time-ordered; rank by size, then earliest member.
    let mut components: Vec<Vec<usize>> = groups
        .into_values()
        .filter(|g| g.len() >= MIN_CLUSTER_SIZE)
        .collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

    let mut membership: HashMap<usize, usize> = HashMap::new();
    let clusters: Vec<PatternCluster> = components
        .iter()
        .enumerate()
        .map(|(rank, members)| {
            let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
            for &m in members {
                membership.insert(m, rank);
                *counts.entry(ordered[m].category).or_default() += 1;
            }
            let (label, frequency) = counts
                .into_iter()
                .fold((Category::default(), 0), |best, (cat, count)| {
                    if count > best.1 { (cat, count) } else { best }
                });
            PatternCluster {
                index: rank,
                members: members.iter().map(|&m| ordered[m].id).collect(),
                label,
                frequency,
            }
        })
        .collect();

    let clustered: usize = clusters.iter().map(|c| c.members.len()).sum();
    let dominant_patterns = clusters
        .iter()
        .map(|c| DominantPattern {
            cluster: c.index,
            label: c.label,
            size: c.members.len(),
            share: c.members.len() as f64 / clustered as f64,
        })
        .collect();

    let temporal_flow = ordered
        .iter()
        .enumerate()
        .map(|(i, s)| FlowPoint {
            sigil: s.id,
            timestamp: s.timestamp,
            cluster: membership.get(&i).copied(),
        })
        .collect();

    ClusterReport {
        clusters,
        dominant_patterns,
        temporal_flow,
    }
}

/// A named reference vector in the pattern library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternTemplate {
    pub name: String,
    pub vector: Vec<f64>,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub name: String,
    pub category: Category,
    pub score: f64,
}

/// Curated seed phrases for the default library.
const CURATED_PATTERNS: &[(&str, &str)] = &[
    ("ocean-calm", "calm peaceful ocean water waves gentle rain"),
    ("shadow-descent", "dark shadow night fear falling sinking dread"),
    ("ascending-flight", "flying soaring rising sky clouds wind wonder"),
    ("inner-light", "light glowing radiant awareness clarity presence insight"),
    ("lost-path", "lost wandering path road searching stranger lonely"),
    ("rebirth-fire", "fire flame burning transformation rebirth changing"),
    ("still-breath", "breath inhale exhale stillness quiet silence mindful"),
    ("homecoming", "return home again friend warm love tender"),
];

/// Named templates matched with their own recognition threshold.
#[derive(Clone, Debug)]
pub struct PatternLibrary {
    templates: Vec<PatternTemplate>,
    threshold: f64,
}

impl PatternLibrary {
    pub fn new(threshold: f64) -> Self {
        Self {
            templates: Vec::new(),
            threshold,
        }
    }

    /// Library seeded from the curated phrases, encoded with `encoder`.
    pub fn with_defaults(encoder: &Encoder, threshold: f64) -> Self {
        let mut library = Self::new(threshold);
        for (name, phrase) in CURATED_PATTERNS {
            match encoder.try_analyze(phrase, SourceType::Composite) {
                Ok(encoding) => library.templates.push(PatternTemplate {
                    name: (*name).to_string(),
                    vector: encoding.vector,
                    category: encoding.category,
                }),
                Err(e) => tracing::warn!(pattern = *name, "skipping curated pattern: {e}"),
            }
        }
        library
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Add or replace a template modelled on `sigil`.
    pub fn learn(&mut self, name: &str, sigil: &Sigil) {
        self.templates.retain(|t| t.name != name);
        self.templates.push(PatternTemplate {
            name: name.to_string(),
            vector: sigil.vector.clone(),
            category: sigil.category,
        });
    }

    pub fn templates(&self) -> &[PatternTemplate] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&PatternTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Templates scoring at least the recognition threshold, best first.
    pub fn recognize(&self, sigil: &Sigil) -> Vec<PatternMatch> {
        let mut matches: Vec<PatternMatch> = self
            .templates
            .iter()
            .map(|t| PatternMatch {
                name: t.name.clone(),
                category: t.category,
                score: cosine(&sigil.vector, &t.vector),
            })
            .filter(|m| m.score >= self.threshold)
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        matches
    }
}
