use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Non-fatal: in-memory and fresh databases have nothing to checkpoint.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sigils (
            id          TEXT PRIMARY KEY,
            vector      BLOB NOT NULL,
            category    TEXT NOT NULL,
            source_type TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            strength    REAL NOT NULL,
            hash        INTEGER NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS braids (
            id         TEXT PRIMARY KEY,
            strength   REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS braid_members (
            braid_id TEXT NOT NULL REFERENCES braids(id),
            position INTEGER NOT NULL,
            sigil_id TEXT NOT NULL,
            PRIMARY KEY (braid_id, position)
        );

        CREATE TABLE IF NOT EXISTS connections (
            braid_id TEXT NOT NULL REFERENCES braids(id),
            from_id  TEXT NOT NULL,
            to_id    TEXT NOT NULL,
            kind     TEXT NOT NULL,
            score    REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS similarity_edges (
            id_a  TEXT NOT NULL,
            id_b  TEXT NOT NULL,
            score REAL NOT NULL,
            PRIMARY KEY (id_a, id_b)
        );

        CREATE INDEX IF NOT EXISTS idx_sigil_timestamp ON sigils(timestamp);
        CREATE INDEX IF NOT EXISTS idx_sigil_hash ON sigils(hash);
        CREATE INDEX IF NOT EXISTS idx_conn_braid ON connections(braid_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &[
            "metadata",
            "sigils",
            "braids",
            "braid_members",
            "connections",
            "similarity_edges",
        ] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn test_wal_mode_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("sigils.db")).unwrap();
        initialize(&conn).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
