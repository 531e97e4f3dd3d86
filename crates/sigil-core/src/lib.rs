//! Neural sigil pattern engine.
//!
//! Turns free text into fixed-length concept vectors ("sigils"), keeps a
//! bounded time-ordered store of them, and answers similarity, braiding,
//! clustering, recognition and evolution queries over that store.
//!
//! Zero I/O: durable storage goes through the `SnapshotPort` trait.

pub mod braid;
pub mod config;
pub mod constants;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod persistence;
pub mod report;
pub mod shared;
pub mod sigil;
pub mod similarity;
pub mod snapshot;
pub mod store;
pub mod strategy;
pub mod tokenizer;

pub use braid::{Braid, BraidLog, Connection, ConnectionKind, build_braid};
pub use config::{EngineConfig, Retention, Thresholds};
pub use constants::{DEFAULT_DIMENSIONS, EPSILON, MIN_DIMENSIONS};
pub use encoder::{Encoder, Encoding};
pub use engine::SigilEngine;
pub use error::{EngineError, Result};
pub use pattern::{
    ClusterReport, DominantPattern, FlowPoint, PatternCluster, PatternLibrary, PatternMatch,
    PatternTemplate, cluster_sigils,
};
pub use persistence::{MemoryPort, PortError, SnapshotPort};
pub use report::{EvolutionReport, Insights, summarize};
pub use shared::SharedEngine;
pub use sigil::{BreathPhase, Category, Neurochemistry, Sigil, SigilMetadata, SourceType};
pub use similarity::{SimilarMatch, SimilarityEdge, SimilarityIndex, cosine};
pub use snapshot::{CURRENT_VERSION, Snapshot, export_json, import_json};
pub use store::{Appended, SigilFilter, SigilStore};
pub use strategy::{BreathStrategy, CuratedStrategy, SeedStrategy, SigilSeed};
pub use tokenizer::{text_hash, tokenize};
