//! Braids: weighted connection graphs over a caller-chosen set of sigils.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::sigil::Sigil;
use crate::similarity::SimilarityIndex;
use crate::store::SigilStore;

/// Why two braid members are connected, in classification priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Both members share a category.
    Neural,
    /// Both members share a breath phase.
    Temporal,
    /// Similar, with no shared tag.
    Symbolic,
}

impl ConnectionKind {
    pub fn classify(a: &Sigil, b: &Sigil) -> Self {
        if a.category == b.category {
            Self::Neural
        } else if a.metadata.breath_phase.is_some()
            && a.metadata.breath_phase == b.metadata.breath_phase
        {
            Self::Temporal
        } else {
            Self::Symbolic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neural => "neural",
            Self::Temporal => "temporal",
            Self::Symbolic => "symbolic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Neural, Self::Temporal, Self::Symbolic]
            .into_iter()
            .find(|k| k.as_str() == s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from: Uuid,
    pub to: Uuid,
    pub kind: ConnectionKind,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Braid {
    pub id: Uuid,
    /// Resolved members in request order.
    pub members: Vec<Uuid>,
    pub connections: Vec<Connection>,
    /// Mean connection score, 0 when there are no connections.
    pub strength: f64,
    pub created_at: DateTime<Utc>,
}

impl Braid {
    pub fn connection_count(&self, kind: ConnectionKind) -> usize {
        self.connections.iter().filter(|c| c.kind == kind).count()
    }
}

/// Build a braid over `ids`. Unknown and repeated ids are skipped; fewer than
/// two remaining members is an error.
pub fn build_braid(
    store: &SigilStore,
    index: &SimilarityIndex,
    ids: &[Uuid],
    connection_threshold: f64,
) -> Result<Braid> {
    let mut seen = HashSet::new();
    let members: Vec<&Sigil> = ids
        .iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| {
            let found = store.get(*id);
            if found.is_none() {
                tracing::debug!(%id, "braid member not in store, skipping");
            }
            found
        })
        .collect();

    if members.len() < 2 {
        return Err(EngineError::InsufficientMembers {
            requested: ids.len(),
            resolved: members.len(),
        });
    }

    let mut connections = Vec::new();
    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            let score = index.similarity(a, b);
            if score >= connection_threshold {
                connections.push(Connection {
                    from: a.id,
                    to: b.id,
                    kind: ConnectionKind::classify(a, b),
                    score,
                });
            }
        }
    }

    let strength = if connections.is_empty() {
        0.0
    } else {
        connections.iter().map(|c| c.score).sum::<f64>() / connections.len() as f64
    };

    Ok(Braid {
        id: Uuid::new_v4(),
        members: members.iter().map(|s| s.id).collect(),
        connections,
        strength,
        created_at: Utc::now(),
    })
}

/// Append-only braid history, bounded to the most recent `capacity` braids.
#[derive(Debug)]
pub struct BraidLog {
    braids: VecDeque<Braid>,
    capacity: usize,
}

impl BraidLog {
    /// A log holding at most `capacity` braids, never fewer than one.
    pub fn new(capacity: usize) -> Self {
        Self {
            braids: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, braid: Braid) -> &Braid {
        self.braids.push_back(braid);
        while self.braids.len() > self.capacity {
            if let Some(old) = self.braids.pop_front() {
                tracing::debug!(id = %old.id, "dropped braid past retention bound");
            }
        }
        &self.braids[self.braids.len() - 1]
    }

    pub fn get(&self, id: Uuid) -> Option<&Braid> {
        self.braids.iter().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Braid> {
        self.braids.iter()
    }

    pub fn len(&self) -> usize {
        self.braids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.braids.is_empty()
    }
}
