//! Memoized cosine similarity over stored sigils.
//!
//! `find_similar` is a linear scan of the store per query. There is no
//! approximate index here: collections are expected to hold hundreds of
//! sigils, not millions.

use std::cmp::Ordering;
use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::EPSILON;
use crate::sigil::Sigil;
use crate::store::SigilStore;

/// Cosine similarity clamped to [0, 1]. Zero vectors score 0 against
/// anything, and mismatched lengths score 0.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a < EPSILON || norm_b < EPSILON {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Unordered sigil pair with the smaller id first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(Uuid, Uuid);

impl EdgeKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn touches(&self, id: Uuid) -> bool {
        self.0 == id || self.1 == id
    }
}

/// A cached similarity score, as persisted in snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityEdge {
    pub id_a: Uuid,
    pub id_b: Uuid,
    pub score: f64,
}

impl SimilarityEdge {
    pub fn new(a: Uuid, b: Uuid, score: f64) -> Self {
        let key = EdgeKey::new(a, b);
        Self {
            id_a: key.0,
            id_b: key.1,
            score: score.clamp(0.0, 1.0),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.id_a, self.id_b)
    }
}

/// One `find_similar` hit.
#[derive(Clone, Copy, Debug)]
pub struct SimilarMatch<'a> {
    pub sigil: &'a Sigil,
    pub score: f64,
}

/// Similarity cache keyed by canonical pair.
///
/// The cache sits behind its own lock so lookups work through `&self`;
/// invalidation takes `&mut self`, so it cannot interleave with a reader
/// that would repopulate an evicted pair.
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    cache: Mutex<HashMap<EdgeKey, f64>>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cosine similarity between two sigils, memoized. A sigil is always
    /// 1.0 against itself.
    pub fn similarity(&self, a: &Sigil, b: &Sigil) -> f64 {
        if a.id == b.id {
            return 1.0;
        }
        let key = EdgeKey::new(a.id, b.id);
        if let Some(score) = self.cache.lock().get(&key) {
            return *score;
        }
        let score = cosine(&a.vector, &b.vector);
        self.cache.lock().insert(key, score);
        score
    }

    pub fn cached(&self, a: Uuid, b: Uuid) -> Option<f64> {
        self.cache.lock().get(&EdgeKey::new(a, b)).copied()
    }

    /// All other stored sigils scoring at least `threshold` against `target`,
    /// best first, ties broken by most recent timestamp then id.
    /// An unknown target yields no matches.
    pub fn find_similar<'a>(
        &self,
        store: &'a SigilStore,
        target: Uuid,
        threshold: f64,
    ) -> Vec<SimilarMatch<'a>> {
        let Some(target) = store.get(target) else {
            tracing::debug!(%target, "find_similar on unknown sigil");
            return Vec::new();
        };

        let mut matches: Vec<SimilarMatch<'a>> = store
            .iter()
            .filter(|s| s.id != target.id)
            .map(|s| SimilarMatch {
                sigil: s,
                score: self.similarity(target, s),
            })
            .filter(|m| m.score >= threshold)
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.sigil.timestamp.cmp(&a.sigil.timestamp))
                .then_with(|| a.sigil.id.cmp(&b.sigil.id))
        });
        matches
    }

    /// Drop every cached pair that references `id`.
    pub fn invalidate(&mut self, id: Uuid) -> usize {
        let cache = self.cache.get_mut();
        let before = cache.len();
        cache.retain(|key, _| !key.touches(id));
        before - cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.get_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `limit` highest-scoring cached pairs, for persistence.
    pub fn top_edges(&self, limit: usize) -> Vec<SimilarityEdge> {
        let cache = self.cache.lock();
        let mut edges: Vec<SimilarityEdge> = cache
            .iter()
            .map(|(key, score)| SimilarityEdge::new(key.0, key.1, *score))
            .collect();
        edges.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key().cmp(&b.key()))
        });
        edges.truncate(limit);
        edges
    }

    /// Warm the cache from persisted edges whose endpoints are still stored.
    pub fn warm(&mut self, edges: &[SimilarityEdge], store: &SigilStore) -> usize {
        let cache = self.cache.get_mut();
        let mut loaded = 0;
        for edge in edges {
            if store.contains(edge.id_a) && store.contains(edge.id_b) {
                cache.insert(edge.key(), edge.score.clamp(0.0, 1.0));
                loaded += 1;
            }
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigil::{Category, SourceType};
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn store_with(vectors: &[(Vec<f64>, i64)]) -> (SigilStore, Vec<Uuid>) {
        let mut store = SigilStore::new(3, 100);
        let ids = vectors
            .iter()
            .map(|(v, secs)| {
                let s = Sigil::new(v.clone(), Category::Cortical, SourceType::Dream)
                    .with_timestamp(Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap());
                store.append(s).unwrap().id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_cosine_basics() {
        assert_relative_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_relative_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_symmetric_and_reflexive() {
        let (store, ids) = store_with(&[(vec![1.0, 0.0, 0.0], 0), (vec![0.6, 0.8, 0.0], 1)]);
        let index = SimilarityIndex::new();
        let a = store.get(ids[0]).unwrap();
        let b = store.get(ids[1]).unwrap();
        assert_eq!(index.similarity(a, b), index.similarity(b, a));
        assert_relative_eq!(index.similarity(a, b), 0.6, epsilon = 1e-12);
        assert_eq!(index.similarity(a, a), 1.0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_zero_vector_reflexive() {
        let (store, ids) = store_with(&[(vec![0.0, 0.0, 0.0], 0)]);
        let index = SimilarityIndex::new();
        let z = store.get(ids[0]).unwrap();
        assert_eq!(index.similarity(z, z), 1.0);
    }

    #[test]
    fn test_find_similar_threshold_and_order() {
        let (store, ids) = store_with(&[
            (vec![1.0, 0.0, 0.0], 0),
            (vec![0.6, 0.8, 0.0], 1),
            (vec![0.9, 0.435_889_894_354_067_4, 0.0], 2),
            (vec![0.0, 0.0, 1.0], 3),
        ]);
        let index = SimilarityIndex::new();

        let hits = index.find_similar(&store, ids[0], 0.5);
        let got: Vec<Uuid> = hits.iter().map(|m| m.sigil.id).collect();
        assert_eq!(got, vec![ids[2], ids[1]]);
        assert!(hits.iter().all(|m| m.score >= 0.5));

        let all = index.find_similar(&store, ids[0], 0.0);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_ties_break_most_recent_first() {
        let (store, ids) = store_with(&[
            (vec![1.0, 0.0, 0.0], 0),
            (vec![0.0, 1.0, 0.0], 5),
            (vec![0.0, 1.0, 0.0], 9),
            (vec![0.0, 1.0, 0.0], 7),
        ]);
        let index = SimilarityIndex::new();
        let hits = index.find_similar(&store, ids[1], 0.9);
        let got: Vec<Uuid> = hits.iter().map(|m| m.sigil.id).collect();
        assert_eq!(got, vec![ids[2], ids[3]]);
    }

    #[test]
    fn test_unknown_target_is_empty() {
        let (store, _) = store_with(&[(vec![1.0, 0.0, 0.0], 0)]);
        let index = SimilarityIndex::new();
        assert!(index.find_similar(&store, Uuid::new_v4(), 0.0).is_empty());
    }

    #[test]
    fn test_invalidate_drops_pairs() {
        let (store, ids) = store_with(&[
            (vec![1.0, 0.0, 0.0], 0),
            (vec![0.0, 1.0, 0.0], 1),
            (vec![0.0, 0.0, 1.0], 2),
        ]);
        let mut index = SimilarityIndex::new();
        index.find_similar(&store, ids[0], 0.0);
        index.find_similar(&store, ids[1], 0.0);
        assert_eq!(index.len(), 3);

        assert_eq!(index.invalidate(ids[0]), 2);
        assert!(index.cached(ids[0], ids[1]).is_none());
        assert!(index.cached(ids[1], ids[2]).is_some());
    }

    #[test]
    fn test_top_edges_and_warm() {
        let (store, ids) = store_with(&[
            (vec![1.0, 0.0, 0.0], 0),
            (vec![0.6, 0.8, 0.0], 1),
            (vec![0.8, 0.6, 0.0], 2),
        ]);
        let index = SimilarityIndex::new();
        index.find_similar(&store, ids[0], 0.0);
        index.find_similar(&store, ids[1], 0.0);

        let top = index.top_edges(2);
        assert_eq!(top.len(), 2);
        assert!(top[0].score >= top[1].score);
        assert!(top[0].id_a <= top[0].id_b);

        let mut fresh = SimilarityIndex::new();
        let stale = SimilarityEdge::new(ids[0], Uuid::new_v4(), 0.9);
        let mut edges = top.clone();
        edges.push(stale);
        assert_eq!(fresh.warm(&edges, &store), 2);
        assert_eq!(fresh.len(), 2);
    }
}
