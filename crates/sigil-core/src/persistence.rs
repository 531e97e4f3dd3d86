//! The narrow port through which all durable I/O happens.

use parking_lot::Mutex;

use crate::snapshot::Snapshot;

pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Storage adapter for engine snapshots. Implemented per platform; the
/// engine never depends on a concrete storage technology.
pub trait SnapshotPort {
    /// The last saved snapshot, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<Snapshot>, PortError>;

    /// Replace the stored snapshot. Last writer wins.
    fn save(&self, snapshot: &Snapshot) -> Result<(), PortError>;
}

/// Process-local adapter, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPort {
    slot: Mutex<Option<Snapshot>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<Snapshot> {
        self.slot.lock().clone()
    }
}

impl SnapshotPort for MemoryPort {
    fn load(&self) -> Result<Option<Snapshot>, PortError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PortError> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}
