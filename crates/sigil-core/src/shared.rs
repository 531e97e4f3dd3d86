//! Thread-safe handle around a single engine instance.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::SigilEngine;
use crate::error::{EngineError, Result};
use crate::persistence::SnapshotPort;

/// Cloneable handle: many readers, one writer. Reads never observe a
/// partially applied append or trim.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<SigilEngine>>,
}

impl SharedEngine {
    pub fn new(engine: SigilEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&SigilEngine) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut SigilEngine) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Snapshot under the read lock, then write through `port` with no lock
    /// held so slow storage does not block readers or writers.
    pub fn flush(&self, port: &dyn SnapshotPort) -> Result<()> {
        let snapshot = self.read(|engine| engine.snapshot());
        port.save(&snapshot).map_err(|e| {
            tracing::warn!("snapshot flush failed: {e}");
            EngineError::PersistenceFailure(e.to_string())
        })
    }
}
