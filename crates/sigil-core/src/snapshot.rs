//! Persisted snapshot shape and its JSON wire format.
//!
//! The wire format uses camelCase field names. Sigil vectors are plain
//! float arrays; timestamps are RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::braid::Braid;
use crate::sigil::Sigil;
use crate::similarity::SimilarityEdge;

pub const CURRENT_VERSION: &str = "1.0";

/// Everything the engine needs to resume: sigils (≤ N, oldest first),
/// braids (≤ M, oldest first) and the warmest similarity edges (≤ K).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub sigils: Vec<Sigil>,
    #[serde(default)]
    pub braids: Vec<Braid>,
    /// Accepts the older `edges` field name.
    #[serde(default, alias = "edges")]
    pub similarity_edges: Vec<SimilarityEdge>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            saved_at: Utc::now(),
            sigils: Vec::new(),
            braids: Vec::new(),
            similarity_edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sigils.is_empty() && self.braids.is_empty()
    }
}

/// Deserialize a JSON snapshot.
pub fn import_json(json: &str) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_str(json)
}

/// Serialize a snapshot to pretty-printed JSON.
pub fn export_json(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigil::{BreathPhase, Category, SigilMetadata, SourceType};
    use uuid::Uuid;

    fn make_snapshot() -> Snapshot {
        let mut sigil = Sigil::new(vec![0.6, 0.8], Category::Limbic, SourceType::Breath)
            .with_metadata(SigilMetadata::default().with_breath_phase(BreathPhase::Inhale));
        sigil.id = Uuid::new_v4();
        sigil.hash = 42;
        let mut snap = Snapshot::empty();
        snap.sigils.push(sigil);
        snap.similarity_edges
            .push(SimilarityEdge::new(Uuid::new_v4(), Uuid::new_v4(), 0.9));
        snap
    }

    #[test]
    fn test_roundtrip() {
        let snap = make_snapshot();
        let json = export_json(&snap).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(snap, back);
    }

    #[test]
    fn test_wire_field_names() {
        let json = export_json(&make_snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], CURRENT_VERSION);
        assert!(value.get("savedAt").is_some());
        assert!(value.get("similarityEdges").is_some());
        let sigil = &value["sigils"][0];
        assert_eq!(sigil["sourceType"], "breath");
        assert_eq!(sigil["category"], "limbic");
        assert_eq!(sigil["metadata"]["breathPhase"], "inhale");
    }

    #[test]
    fn test_minimal_and_alias() {
        let json = r#"{
            "version": "0.9",
            "savedAt": "2026-01-01T00:00:00Z",
            "edges": [{
                "idA": "00000000-0000-0000-0000-000000000001",
                "idB": "00000000-0000-0000-0000-000000000002",
                "score": 0.75
            }]
        }"#;
        let snap = import_json(json).unwrap();
        assert!(snap.sigils.is_empty());
        assert!(snap.is_empty());
        assert_eq!(snap.similarity_edges.len(), 1);
        assert_eq!(snap.similarity_edges[0].score, 0.75);
    }
}
