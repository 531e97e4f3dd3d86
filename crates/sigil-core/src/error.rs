use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the engine to its direct caller.
///
/// Encoding problems never appear here: they are recovered inside the engine
/// and recorded on the produced sigil instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A specific sigil id was required but is not in the store.
    #[error("sigil not found: {0}")]
    LookupNotFound(Uuid),

    /// A braid needs at least two stored members.
    #[error("braid needs at least 2 resolvable members, got {resolved} of {requested}")]
    InsufficientMembers { requested: usize, resolved: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("duplicate sigil id: {0}")]
    DuplicateId(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The injected storage adapter rejected a load or save.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
