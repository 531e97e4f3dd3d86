/// Default sigil vector length.
pub const DEFAULT_DIMENSIONS: usize = 64;

/// Concept slots per semantic band.
pub const BAND_WIDTH: usize = 8;

/// Number of semantic bands (emotional, symbolic, narrative, depth).
pub const BAND_COUNT: usize = 4;

/// Indices occupied by the semantic bands, starting at 0.
pub const BAND_SPAN: usize = BAND_WIDTH * BAND_COUNT;

/// Trailing indices reserved for the source-type marker.
pub const SOURCE_SLOTS: usize = 4;

/// Smallest vector length that leaves room for a scatter region.
pub const MIN_DIMENSIONS: usize = BAND_SPAN + SOURCE_SLOTS + 4;

/// Keyword hits that saturate a concept slot at 1.0.
pub const KEYWORD_SATURATION: f64 = 3.0;

/// Weight added to a scatter slot per token.
pub const SCATTER_STEP: f64 = 0.1;

/// Ceiling for any single scatter slot.
pub const SCATTER_CAP: f64 = 0.5;

/// Weight of the source-type marker slot.
pub const SOURCE_MARKER: f64 = 0.25;

/// Texts longer than this (in bytes) are rejected by the encoder.
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Default retention bound for stored sigils (N).
pub const DEFAULT_MAX_SIGILS: usize = 500;

/// Default retention bound for braids (M).
pub const DEFAULT_MAX_BRAIDS: usize = 50;

/// Default bound on persisted similarity edges (K).
pub const DEFAULT_MAX_EDGES: usize = 200;

/// Ad hoc `find_similar` threshold.
pub const SIMILAR_THRESHOLD: f64 = 0.7;

/// Pattern-library recognition threshold.
pub const RECOGNITION_THRESHOLD: f64 = 0.65;

/// Minimum pair score for a braid connection.
pub const BRAID_CONNECTION_THRESHOLD: f64 = 0.6;

/// Single-linkage clustering threshold.
pub const CLUSTER_THRESHOLD: f64 = 0.65;

/// Clusters smaller than this are not reported.
pub const MIN_CLUSTER_SIZE: usize = 2;

/// Sentinel used by the reporter when a distribution is empty.
pub const UNKNOWN: &str = "unknown";
