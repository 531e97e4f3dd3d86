use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::braid::{Braid, BraidLog, build_braid};
use crate::config::EngineConfig;
use crate::encoder::{Encoder, uniform};
use crate::error::{EngineError, Result};
use crate::pattern::{ClusterReport, PatternLibrary, PatternMatch, cluster_sigils};
use crate::persistence::SnapshotPort;
use crate::report::{EvolutionReport, summarize};
use crate::sigil::{Category, Sigil, SigilMetadata, SourceType, from_ternary};
use crate::similarity::{SimilarMatch, SimilarityIndex};
use crate::snapshot::{CURRENT_VERSION, Snapshot};
use crate::store::{SigilFilter, SigilStore};
use crate::strategy::{SeedStrategy, SigilSeed};
use crate::tokenizer::text_hash;

/// The sigil pattern engine: one instance owns the store, the similarity
/// cache, the braid history and the pattern library.
///
/// Construct it once and pass it to consumers by reference. Every query is
/// idempotent while the store is unchanged.
pub struct SigilEngine {
    config: EngineConfig,
    encoder: Encoder,
    store: SigilStore,
    index: SimilarityIndex,
    braids: BraidLog,
    library: PatternLibrary,
}

impl SigilEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let encoder = Encoder::new(config.dimensions)?;
        let library = PatternLibrary::with_defaults(&encoder, config.thresholds.recognition);
        Ok(Self {
            store: SigilStore::new(config.dimensions, config.retention.max_sigils),
            index: SimilarityIndex::new(),
            braids: BraidLog::new(config.retention.max_braids),
            encoder,
            library,
            config,
        })
    }

    /// Build an engine and restore whatever the port has saved.
    pub fn load_from(config: EngineConfig, port: &dyn SnapshotPort) -> Result<Self> {
        let mut engine = Self::new(config)?;
        let snapshot = port
            .load()
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?;
        if let Some(snapshot) = snapshot {
            engine.restore(snapshot)?;
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn store(&self) -> &SigilStore {
        &self.store
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut PatternLibrary {
        &mut self.library
    }

    // --- Generation ---

    /// Encode `text` and store the resulting sigil. Never fails: unusable
    /// input produces a fallback sigil instead.
    pub fn generate(&mut self, text: &str, source: SourceType, metadata: SigilMetadata) -> Sigil {
        self.generate_at(text, source, metadata, Utc::now())
    }

    /// [`generate`](Self::generate) with an explicit timestamp.
    ///
    /// When the store is full and `timestamp` is older than every stored
    /// sigil, the new sigil is the one evicted: it is still returned, but
    /// its id will not resolve.
    pub fn generate_at(
        &mut self,
        text: &str,
        source: SourceType,
        metadata: SigilMetadata,
        timestamp: DateTime<Utc>,
    ) -> Sigil {
        let sigil = self.build_sigil(text, source, metadata, timestamp);
        match self.insert(sigil.clone()) {
            Ok(id) if !self.store.contains(id) => {
                tracing::warn!(%id, "generated sigil is older than the retention window, not kept");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(id = %sigil.id, "generated sigil was not stored: {e}"),
        }
        sigil
    }

    pub fn generate_from(&mut self, strategy: &dyn SeedStrategy) -> Sigil {
        let SigilSeed {
            text,
            source_type,
            metadata,
        } = strategy.seed();
        self.generate(&text, source_type, metadata)
    }

    fn build_sigil(
        &self,
        text: &str,
        source: SourceType,
        metadata: SigilMetadata,
        timestamp: DateTime<Utc>,
    ) -> Sigil {
        let hash = text_hash(text);
        match self.encoder.try_analyze(text, source) {
            Ok(encoding) => {
                if encoding.degenerate {
                    tracing::warn!(
                        source = source.as_str(),
                        "degenerate encoding, storing zero vector"
                    );
                }
                Sigil {
                    id: Uuid::new_v4(),
                    vector: encoding.vector,
                    category: encoding.category,
                    source_type: source,
                    timestamp,
                    strength: encoding.strength,
                    hash,
                    metadata,
                }
            }
            // Fallback: uniform vector, default category, reason in metadata.
            Err(e) => {
                tracing::warn!(source = source.as_str(), "encoding failed, using fallback: {e}");
                let mut metadata = metadata;
                metadata.extra.insert(
                    SigilMetadata::FALLBACK_KEY.to_string(),
                    Value::from(e.to_string()),
                );
                Sigil {
                    id: Uuid::new_v4(),
                    vector: uniform(self.config.dimensions),
                    category: Category::default(),
                    source_type: source,
                    timestamp,
                    strength: 0.0,
                    hash,
                    metadata,
                }
            }
        }
    }

    // --- Store ---

    /// Store a caller-built sigil. Assigns an id when it has none.
    pub fn append(&mut self, sigil: Sigil) -> Result<&Sigil> {
        let id = self.insert(sigil)?;
        self.store.get(id).ok_or(EngineError::LookupNotFound(id))
    }

    fn insert(&mut self, sigil: Sigil) -> Result<Uuid> {
        let appended = self.store.append(sigil)?;
        for evicted in &appended.evicted {
            let dropped = self.index.invalidate(*evicted);
            tracing::debug!(id = %evicted, dropped, "invalidated cache for evicted sigil");
        }
        Ok(appended.id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Sigil> {
        self.store.get(id)
    }

    pub fn require(&self, id: Uuid) -> Result<&Sigil> {
        self.store.get(id).ok_or(EngineError::LookupNotFound(id))
    }

    pub fn list(&self, filter: &SigilFilter) -> Vec<&Sigil> {
        self.store.list(filter)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Most recent sigil whose checksum matches `code`. Accepts a decimal
    /// hash or a `t`-prefixed ternary code.
    pub fn lookup_code(&self, code: &str) -> Option<&Sigil> {
        let code = code.trim();
        let hash = match code.strip_prefix('t') {
            Some(ternary) => from_ternary(ternary)?,
            None => code.parse::<u32>().ok()?,
        };
        self.store.iter().rev().find(|s| s.hash == hash)
    }

    // --- Similarity ---

    pub fn similarity(&self, a: Uuid, b: Uuid) -> Result<f64> {
        let a = self.require(a)?;
        let b = self.require(b)?;
        Ok(self.index.similarity(a, b))
    }

    pub fn find_similar(&self, id: Uuid, threshold: f64) -> Vec<SimilarMatch<'_>> {
        self.index.find_similar(&self.store, id, threshold)
    }

    /// `find_similar` at the configured ad hoc threshold.
    pub fn find_similar_default(&self, id: Uuid) -> Vec<SimilarMatch<'_>> {
        self.find_similar(id, self.config.thresholds.similar)
    }

    // --- Braids ---

    pub fn braid(&mut self, ids: &[Uuid]) -> Result<&Braid> {
        let braid = build_braid(
            &self.store,
            &self.index,
            ids,
            self.config.thresholds.braid_connection,
        )?;
        tracing::info!(
            id = %braid.id,
            members = braid.members.len(),
            connections = braid.connections.len(),
            strength = braid.strength,
            "braid created"
        );
        Ok(self.braids.push(braid))
    }

    pub fn braids(&self) -> impl Iterator<Item = &Braid> {
        self.braids.iter()
    }

    pub fn get_braid(&self, id: Uuid) -> Option<&Braid> {
        self.braids.get(id)
    }

    // --- Patterns ---

    /// Cluster the given sigils. Every id must be stored.
    pub fn cluster(&self, ids: &[Uuid]) -> Result<ClusterReport> {
        let sigils = ids
            .iter()
            .map(|id| self.require(*id))
            .collect::<Result<Vec<_>>>()?;
        Ok(cluster_sigils(&self.index, &sigils, self.config.thresholds.cluster))
    }

    pub fn cluster_all(&self) -> ClusterReport {
        let sigils: Vec<&Sigil> = self.store.iter().collect();
        cluster_sigils(&self.index, &sigils, self.config.thresholds.cluster)
    }

    pub fn recognize(&self, id: Uuid) -> Result<Vec<PatternMatch>> {
        Ok(self.library.recognize(self.require(id)?))
    }

    pub fn recognize_sigil(&self, sigil: &Sigil) -> Vec<PatternMatch> {
        self.library.recognize(sigil)
    }

    // --- Reporting ---

    pub fn summarize(&self) -> EvolutionReport {
        let sigils: Vec<&Sigil> = self.store.iter().collect();
        summarize(&sigils)
    }

    pub fn summarize_filtered(&self, filter: &SigilFilter) -> EvolutionReport {
        summarize(&self.store.list(filter))
    }

    // --- Persistence ---

    /// Owned copy of the state within the configured N/M/K bounds.
    pub fn snapshot(&self) -> Snapshot {
        let retention = &self.config.retention;
        let skip = self.store.len().saturating_sub(retention.max_sigils);
        let sigils: Vec<Sigil> = self.store.iter().skip(skip).cloned().collect();
        let skip = self.braids.len().saturating_sub(retention.max_braids);
        let braids: Vec<Braid> = self.braids.iter().skip(skip).cloned().collect();
        Snapshot {
            version: CURRENT_VERSION.to_string(),
            saved_at: Utc::now(),
            sigils,
            braids,
            similarity_edges: self.index.top_edges(retention.max_edges),
        }
    }

    /// Replace all state with `snapshot`. Sigils beyond N are trimmed oldest
    /// first; edges whose endpoints are gone are ignored.
    ///
    /// Sigils the store rejects (wrong dimensions, duplicate id, invalid
    /// values) are skipped with a warning, along with every braid that names
    /// one of them.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        if snapshot.version != CURRENT_VERSION {
            tracing::info!(version = %snapshot.version, "restoring snapshot from another version");
        }
        let mut store = SigilStore::new(self.config.dimensions, self.config.retention.max_sigils);
        let mut rejected = HashSet::new();
        for sigil in snapshot.sigils {
            let id = sigil.id;
            if let Err(e) = store.append(sigil) {
                tracing::warn!(%id, "skipping stored sigil: {e}");
                rejected.insert(id);
            }
        }
        rejected.retain(|id| !store.contains(*id));
        let mut braids = BraidLog::new(self.config.retention.max_braids);
        let mut dropped_braids = 0;
        for braid in snapshot.braids {
            if braid.members.iter().any(|m| rejected.contains(m)) {
                tracing::warn!(id = %braid.id, "skipping braid with a skipped member");
                dropped_braids += 1;
                continue;
            }
            braids.push(braid);
        }
        let mut index = SimilarityIndex::new();
        let warmed = index.warm(&snapshot.similarity_edges, &store);

        tracing::info!(
            sigils = store.len(),
            skipped_sigils = rejected.len(),
            braids = braids.len(),
            skipped_braids = dropped_braids,
            edges = warmed,
            "restored snapshot"
        );
        self.store = store;
        self.braids = braids;
        self.index = index;
        Ok(())
    }

    /// Write a snapshot through `port`. In-memory state is authoritative and
    /// is left untouched if the write fails.
    pub fn save_to(&self, port: &dyn SnapshotPort) -> Result<()> {
        port.save(&self.snapshot()).map_err(|e| {
            tracing::warn!("snapshot save failed: {e}");
            EngineError::PersistenceFailure(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_TEXT_BYTES;
    use crate::persistence::{MemoryPort, PortError};
    use crate::sigil::BreathPhase;
    use crate::strategy::BreathStrategy;
    use chrono::TimeZone;

    fn engine() -> SigilEngine {
        SigilEngine::new(EngineConfig::default()).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    struct FailingPort;

    impl SnapshotPort for FailingPort {
        fn load(&self) -> std::result::Result<Option<Snapshot>, PortError> {
            Err("disk gone".into())
        }

        fn save(&self, _: &Snapshot) -> std::result::Result<(), PortError> {
            Err("disk full".into())
        }
    }

    #[test]
    fn test_generate_stores_sigil() {
        let mut engine = engine();
        let sigil = engine
            .generate("a peaceful ocean of light", SourceType::Meditation, SigilMetadata::default());
        assert!(!sigil.id.is_nil());
        assert_eq!(sigil.vector.len(), 64);
        assert_eq!(sigil.hash, text_hash("a peaceful ocean of light"));
        assert!(!sigil.is_fallback());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get(sigil.id), Some(&sigil));
    }

    #[test]
    fn test_empty_text_stores_zero_vector() {
        let mut engine = engine();
        let sigil = engine.generate("", SourceType::Dream, SigilMetadata::default());
        assert!(sigil.vector.iter().all(|x| *x == 0.0));
        assert_eq!(sigil.strength, 0.0);
        assert!(!sigil.is_fallback());
    }

    #[test]
    fn test_oversized_text_falls_back() {
        let mut engine = engine();
        let text = "ocean ".repeat(MAX_TEXT_BYTES / 6 + 1);
        let meta = SigilMetadata::default().with_user("u1");
        let sigil = engine.generate(&text, SourceType::Dream, meta);
        assert!(sigil.is_fallback());
        assert_eq!(sigil.category, Category::Cortical);
        assert_eq!(sigil.metadata.user_id.as_deref(), Some("u1"));
        let expected = 1.0 / 64f64.sqrt();
        assert!(sigil.vector.iter().all(|x| (x - expected).abs() < 1e-12));
    }

    #[test]
    fn test_generate_from_breath_strategy() {
        let mut engine = engine();
        let sigil = engine.generate_from(&BreathStrategy::new(BreathPhase::Inhale));
        assert_eq!(sigil.source_type, SourceType::Breath);
        assert_eq!(sigil.metadata.breath_phase, Some(BreathPhase::Inhale));
    }

    #[test]
    fn test_append_checks_dimensions() {
        let mut engine = engine();
        let bad = Sigil::new(vec![1.0; 3], Category::Limbic, SourceType::Dream);
        assert!(matches!(
            engine.append(bad),
            Err(EngineError::DimensionMismatch { expected: 64, got: 3 })
        ));
    }

    #[test]
    fn test_similarity_requires_ids() {
        let mut engine = engine();
        let id = engine
            .generate("ocean", SourceType::Dream, SigilMetadata::default())
            .id;
        assert_eq!(engine.similarity(id, id).unwrap(), 1.0);
        assert!(matches!(
            engine.similarity(id, Uuid::new_v4()),
            Err(EngineError::LookupNotFound(_))
        ));
        assert!(engine.find_similar(Uuid::new_v4(), 0.0).is_empty());
    }

    #[test]
    fn test_eviction_purges_cache() {
        let config = EngineConfig {
            retention: crate::config::Retention {
                max_sigils: 3,
                ..Default::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = SigilEngine::new(config).unwrap();
        let meta = SigilMetadata::default;
        let oldest = engine.generate_at("ocean light", SourceType::Dream, meta(), at(0)).id;
        let b = engine.generate_at("ocean waves", SourceType::Dream, meta(), at(1)).id;
        let c = engine.generate_at("dark night", SourceType::Dream, meta(), at(2)).id;

        engine.find_similar(oldest, 0.0);
        engine.find_similar(b, 0.0);
        assert!(engine.index().cached(oldest, b).is_some());
        assert!(engine.index().cached(oldest, c).is_some());

        engine.generate_at("river home", SourceType::Dream, meta(), at(3));
        assert_eq!(engine.len(), 3);
        assert!(engine.get(oldest).is_none());
        assert!(engine.index().cached(oldest, b).is_none());
        assert!(engine.index().cached(oldest, c).is_none());
        assert!(engine.index().cached(b, c).is_some());
    }

    #[test]
    fn test_lookup_code() {
        let mut engine = engine();
        let sigil = engine
            .generate("sky door", SourceType::Dream, SigilMetadata::default());
        let decimal = sigil.hash.to_string();
        let ternary = format!("t{}", sigil.ternary_code());
        assert_eq!(engine.lookup_code(&decimal).map(|s| s.id), Some(sigil.id));
        assert_eq!(engine.lookup_code(&ternary).map(|s| s.id), Some(sigil.id));
        assert!(engine.lookup_code("t9").is_none());
        assert!(engine.lookup_code("nope").is_none());
    }

    #[test]
    fn test_lookup_code_prefers_newest() {
        let mut engine = engine();
        engine.generate_at("river home", SourceType::Dream, SigilMetadata::default(), at(0));
        let newer =
            engine.generate_at("river home", SourceType::Dream, SigilMetadata::default(), at(10));
        engine.generate_at("other", SourceType::Dream, SigilMetadata::default(), at(20));
        let code = newer.hash.to_string();
        assert_eq!(engine.lookup_code(&code).map(|s| s.id), Some(newer.id));
    }

    #[test]
    fn test_generate_older_than_window_not_kept() {
        let mut config = EngineConfig::default();
        config.retention.max_sigils = 2;
        let mut engine = SigilEngine::new(config).unwrap();
        engine.generate_at("ocean", SourceType::Dream, SigilMetadata::default(), at(10));
        engine.generate_at("river", SourceType::Dream, SigilMetadata::default(), at(20));

        let stale = engine.generate_at("stone", SourceType::Dream, SigilMetadata::default(), at(0));
        assert!(!stale.id.is_nil());
        assert!(engine.get(stale.id).is_none());
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn test_append_rejects_invalid_values() {
        let mut engine = engine();
        let mut nan = vec![0.0; 64];
        nan[0] = f64::NAN;
        let err = engine
            .append(Sigil::new(nan, Category::Limbic, SourceType::Dream))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let mut loud = Sigil::new(vec![0.0; 64], Category::Limbic, SourceType::Dream);
        loud.vector[0] = 2.0;
        loud.strength = 7.5;
        assert!(matches!(engine.append(loud), Err(EngineError::InvalidInput(_))));
        assert!(engine.is_empty());

        // Whatever is stored survives a JSON round trip.
        engine.generate("ocean", SourceType::Dream, SigilMetadata::default());
        let json = crate::snapshot::export_json(&engine.snapshot()).unwrap();
        assert_eq!(crate::snapshot::import_json(&json).unwrap().sigils.len(), 1);
    }

    #[test]
    fn test_load_skips_sigils_of_other_dimensions() {
        let port = MemoryPort::default();
        let mut engine = engine();
        let a = engine.generate("ocean light", SourceType::Dream, SigilMetadata::default());
        let b = engine.generate("ocean waves", SourceType::Dream, SigilMetadata::default());
        engine.braid(&[a.id, b.id]).unwrap();
        engine.find_similar(a.id, 0.0);
        engine.save_to(&port).unwrap();

        let config = EngineConfig {
            dimensions: 72,
            ..EngineConfig::default()
        };
        let mut reloaded = SigilEngine::load_from(config, &port).unwrap();
        assert!(reloaded.is_empty());
        assert_eq!(reloaded.braids().count(), 0);
        assert!(reloaded.index().is_empty());

        let fresh = reloaded.generate("still journaling", SourceType::Dream, SigilMetadata::default());
        assert_eq!(fresh.vector.len(), 72);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_restore_skips_duplicates_but_keeps_first() {
        let mut engine = engine();
        let a = engine.generate("ocean light", SourceType::Dream, SigilMetadata::default());
        let b = engine.generate("ocean waves", SourceType::Dream, SigilMetadata::default());
        engine.braid(&[a.id, b.id]).unwrap();
        let mut snapshot = engine.snapshot();
        snapshot.sigils.push(a.clone());

        let mut restored = self::engine();
        restored.restore(snapshot).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.braids().count(), 1);
    }

    #[test]
    fn test_cluster_requires_stored_ids() {
        let mut engine = engine();
        let id = engine
            .generate("ocean", SourceType::Dream, SigilMetadata::default())
            .id;
        assert!(engine.cluster(&[id]).is_ok());
        assert!(matches!(
            engine.cluster(&[id, Uuid::new_v4()]),
            Err(EngineError::LookupNotFound(_))
        ));
    }

    #[test]
    fn test_recognize() {
        let mut engine = engine();
        let id = engine
            .generate(
                "calm peaceful ocean water waves gentle rain",
                SourceType::Composite,
                SigilMetadata::default(),
            )
            .id;
        let matches = engine.recognize(id).unwrap();
        assert_eq!(matches[0].name, "ocean-calm");
        assert!(engine.recognize(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let mut engine = engine();
        let a = engine
            .generate("ocean light", SourceType::Dream, SigilMetadata::default())
            .id;
        let b = engine
            .generate("ocean light waves", SourceType::Dream, SigilMetadata::default())
            .id;
        engine.braid(&[a, b]).unwrap();

        let port = MemoryPort::new();
        engine.save_to(&port).unwrap();

        let loaded = SigilEngine::load_from(EngineConfig::default(), &port).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.braids().count(), 1);
        assert!(loaded.index().cached(a, b).is_some());
        assert_eq!(loaded.get(a), engine.get(a));
    }

    #[test]
    fn test_save_failure_keeps_state() {
        let mut engine = engine();
        engine.generate("ocean", SourceType::Dream, SigilMetadata::default());
        let err = engine.save_to(&FailingPort).unwrap_err();
        assert!(matches!(err, EngineError::PersistenceFailure(_)));
        assert_eq!(engine.len(), 1);

        assert!(matches!(
            SigilEngine::load_from(EngineConfig::default(), &FailingPort),
            Err(EngineError::PersistenceFailure(_))
        ));
    }

    #[test]
    fn test_restore_trims_to_retention() {
        let mut big = engine();
        for i in 0..5 {
            big.generate_at("ocean", SourceType::Dream, SigilMetadata::default(), at(i));
        }
        let snapshot = big.snapshot();
        let newest = snapshot.sigils[4].id;

        let config = EngineConfig {
            retention: crate::config::Retention {
                max_sigils: 2,
                ..Default::default()
            },
            ..EngineConfig::default()
        };
        let mut small = SigilEngine::new(config).unwrap();
        small.restore(snapshot).unwrap();
        assert_eq!(small.len(), 2);
        assert!(small.get(newest).is_some());
    }
}
