use std::fs;
use std::path::Path;

use sigil_core::{Snapshot, export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::SqliteStore;

impl SqliteStore {
    /// Replace the stored snapshot with the contents of a JSON export file.
    pub fn import_json_file(&self, path: &Path) -> Result<Snapshot> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json)
    }

    /// Replace the stored snapshot with a JSON export string.
    pub fn import_json_str(&self, json: &str) -> Result<Snapshot> {
        let snapshot =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.save_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Export the stored snapshot to a JSON file.
    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// Export the stored snapshot as JSON. An empty store exports an empty
    /// snapshot.
    pub fn export_json_string(&self) -> Result<String> {
        let snapshot = self.load_snapshot()?.unwrap_or_else(Snapshot::empty);
        export_json(&snapshot)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}
