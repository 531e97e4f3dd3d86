use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::encoder::{magnitude, normalize};
use crate::error::{EngineError, Result};
use crate::sigil::{Category, Sigil, SourceType};

/// Criteria for [`SigilStore::list`]. Unset fields match everything.
/// Time bounds are inclusive.
#[derive(Clone, Debug, Default)]
pub struct SigilFilter {
    pub source_type: Option<SourceType>,
    pub category: Option<Category>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SigilFilter {
    pub fn source(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn matches(&self, sigil: &Sigil) -> bool {
        self.source_type.is_none_or(|s| sigil.source_type == s)
            && self.category.is_none_or(|c| sigil.category == c)
            && self.since.is_none_or(|t| sigil.timestamp >= t)
            && self.until.is_none_or(|t| sigil.timestamp <= t)
    }
}

/// Largest deviation from unit length stored without renormalizing.
const UNIT_TOLERANCE: f64 = 1e-9;

/// Outcome of a successful append.
#[derive(Debug)]
pub struct Appended {
    pub id: Uuid,
    /// Ids trimmed to honour the retention bound, oldest first.
    pub evicted: Vec<Uuid>,
}

/// Append-only, bounded sigil repository.
///
/// Sigils are kept sorted by timestamp (ties in insertion order), so the
/// oldest is always at the front and eviction is a pop from the head.
#[derive(Debug)]
pub struct SigilStore {
    sigils: Vec<Sigil>,
    ids: HashSet<Uuid>,
    dimensions: usize,
    capacity: usize,
}

impl SigilStore {
    pub fn new(dimensions: usize, capacity: usize) -> Self {
        Self {
            sigils: Vec::new(),
            ids: HashSet::new(),
            dimensions,
            capacity,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.sigils.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigils.is_empty()
    }

    /// Store a sigil, assigning an id when it has none, then trim to capacity.
    ///
    /// Vectors must be finite. A non-zero vector that is not unit length is
    /// normalized; strength must lie in [0, 1].
    pub fn append(&mut self, mut sigil: Sigil) -> Result<Appended> {
        if sigil.vector.len() != self.dimensions {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimensions,
                got: sigil.vector.len(),
            });
        }
        if sigil.vector.iter().any(|x| !x.is_finite()) {
            return Err(EngineError::InvalidInput(
                "vector has non-finite components".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&sigil.strength) {
            return Err(EngineError::InvalidInput(format!(
                "strength {} is outside [0, 1]",
                sigil.strength
            )));
        }
        let mag = magnitude(&sigil.vector);
        if !mag.is_finite() {
            return Err(EngineError::InvalidInput("vector magnitude overflows".to_string()));
        }
        if mag > 0.0 && (mag - 1.0).abs() > UNIT_TOLERANCE {
            sigil.vector = normalize(sigil.vector);
        }
        if sigil.id.is_nil() {
            sigil.id = Uuid::new_v4();
        } else if self.ids.contains(&sigil.id) {
            return Err(EngineError::DuplicateId(sigil.id));
        }

        let id = sigil.id;
        let pos = self
            .sigils
            .partition_point(|s| s.timestamp <= sigil.timestamp);
        self.sigils.insert(pos, sigil);
        self.ids.insert(id);

        let evicted = self.trim();
        Ok(Appended { id, evicted })
    }

    /// Evict oldest sigils until the store fits its capacity.
    pub fn trim(&mut self) -> Vec<Uuid> {
        let excess = self.sigils.len().saturating_sub(self.capacity);
        let evicted: Vec<Uuid> = self.sigils.drain(..excess).map(|s| s.id).collect();
        for id in &evicted {
            self.ids.remove(id);
            tracing::debug!(%id, "evicted sigil past retention bound");
        }
        evicted
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Sigil> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.sigils.iter().find(|s| s.id == id)
    }

    pub fn list(&self, filter: &SigilFilter) -> Vec<&Sigil> {
        self.sigils.iter().filter(|s| filter.matches(s)).collect()
    }

    /// All sigils, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sigil> {
        self.sigils.iter()
    }

    pub fn newest(&self) -> Option<&Sigil> {
        self.sigils.last()
    }
}
