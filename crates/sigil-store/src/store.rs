use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use sigil_core::{
    Braid, Category, Connection as BraidConnection, ConnectionKind, PortError, Sigil,
    SigilMetadata, SimilarityEdge, Snapshot, SnapshotPort, SourceType,
};

use crate::error::{Result, StoreError};
use crate::schema;

/// SQLite-backed snapshot port. Each save replaces the previous snapshot
/// in a single transaction.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    fn set_metadata_on(&self, conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn sigil_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sigils", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // --- Save ---

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM connections; DELETE FROM braid_members; DELETE FROM braids;
             DELETE FROM similarity_edges; DELETE FROM sigils;",
        )?;

        self.set_metadata_on(&tx, "snapshot_version", &snapshot.version)?;
        self.set_metadata_on(&tx, "saved_at", &format_time(snapshot.saved_at))?;

        for sigil in &snapshot.sigils {
            self.save_sigil_on(&tx, sigil)?;
        }
        for braid in &snapshot.braids {
            self.save_braid_on(&tx, braid)?;
        }
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO similarity_edges (id_a, id_b, score) VALUES (?1, ?2, ?3)",
            )?;
            for edge in &snapshot.similarity_edges {
                stmt.execute(params![
                    edge.id_a.to_string(),
                    edge.id_b.to_string(),
                    edge.score
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            sigils = snapshot.sigils.len(),
            braids = snapshot.braids.len(),
            edges = snapshot.similarity_edges.len(),
            "snapshot written"
        );
        Ok(())
    }

    fn save_sigil_on(&self, conn: &Connection, sigil: &Sigil) -> Result<()> {
        let metadata = serde_json::to_string(&sigil.metadata)
            .map_err(|e| StoreError::InvalidData(format!("metadata encode failed: {e}")))?;
        conn.execute(
            "INSERT INTO sigils (id, vector, category, source_type, timestamp, strength, hash, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                sigil.id.to_string(),
                encode_vector(&sigil.vector),
                sigil.category.as_str(),
                sigil.source_type.as_str(),
                format_time(sigil.timestamp),
                sigil.strength,
                i64::from(sigil.hash),
                metadata,
            ],
        )?;
        Ok(())
    }

    fn save_braid_on(&self, conn: &Connection, braid: &Braid) -> Result<()> {
        let braid_id = braid.id.to_string();
        conn.execute(
            "INSERT INTO braids (id, strength, created_at) VALUES (?1, ?2, ?3)",
            params![braid_id, braid.strength, format_time(braid.created_at)],
        )?;
        for (position, member) in braid.members.iter().enumerate() {
            conn.execute(
                "INSERT INTO braid_members (braid_id, position, sigil_id) VALUES (?1, ?2, ?3)",
                params![braid_id, position as i64, member.to_string()],
            )?;
        }
        for c in &braid.connections {
            conn.execute(
                "INSERT INTO connections (braid_id, from_id, to_id, kind, score)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    braid_id,
                    c.from.to_string(),
                    c.to.to_string(),
                    c.kind.as_str(),
                    c.score
                ],
            )?;
        }
        Ok(())
    }

    // --- Load ---

    /// The stored snapshot, or `None` if nothing was ever saved.
    pub fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        let Some(saved_at) = self.get_metadata("saved_at")? else {
            return Ok(None);
        };
        let version = self
            .get_metadata("snapshot_version")?
            .unwrap_or_else(|| sigil_core::CURRENT_VERSION.to_string());

        Ok(Some(Snapshot {
            version,
            saved_at: parse_time(&saved_at)?,
            sigils: self.load_sigils()?,
            braids: self.load_braids()?,
            similarity_edges: self.load_edges()?,
        }))
    }

    fn load_sigils(&self) -> Result<Vec<Sigil>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, vector, category, source_type, timestamp, strength, hash, metadata
             FROM sigils ORDER BY timestamp, rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, vector, category, source_type, timestamp, strength, hash, metadata)| {
                    let metadata: SigilMetadata = serde_json::from_str(&metadata).map_err(|e| {
                        StoreError::InvalidData(format!("bad metadata on sigil {id}: {e}"))
                    })?;
                    Ok(Sigil {
                        id: parse_uuid(&id)?,
                        vector: decode_vector(&vector)?,
                        category: Category::parse(&category).ok_or_else(|| {
                            StoreError::InvalidData(format!("unknown category: {category}"))
                        })?,
                        source_type: SourceType::parse(&source_type).ok_or_else(|| {
                            StoreError::InvalidData(format!("unknown source type: {source_type}"))
                        })?,
                        timestamp: parse_time(&timestamp)?,
                        strength,
                        hash: u32::try_from(hash).map_err(|_| {
                            StoreError::InvalidData(format!("hash out of range: {hash}"))
                        })?,
                        metadata,
                    })
                },
            )
            .collect()
    }

    fn load_braids(&self) -> Result<Vec<Braid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, strength, created_at FROM braids ORDER BY rowid")?;
        let rows: Vec<(String, f64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut braids = Vec::with_capacity(rows.len());
        for (id_str, strength, created_at) in rows {
            braids.push(Braid {
                id: parse_uuid(&id_str)?,
                members: self.load_members(&id_str)?,
                connections: self.load_connections(&id_str)?,
                strength,
                created_at: parse_time(&created_at)?,
            });
        }
        Ok(braids)
    }

    fn load_members(&self, braid_id: &str) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(
            "SELECT sigil_id FROM braid_members WHERE braid_id = ?1 ORDER BY position",
        )?;
        let ids: Vec<String> = stmt
            .query_map([braid_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    fn load_connections(&self, braid_id: &str) -> Result<Vec<BraidConnection>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_id, to_id, kind, score FROM connections
             WHERE braid_id = ?1 ORDER BY rowid",
        )?;
        let rows: Vec<(String, String, String, f64)> = stmt
            .query_map([braid_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(from, to, kind, score)| {
                Ok(BraidConnection {
                    from: parse_uuid(&from)?,
                    to: parse_uuid(&to)?,
                    kind: ConnectionKind::parse(&kind).ok_or_else(|| {
                        StoreError::InvalidData(format!("unknown connection kind: {kind}"))
                    })?,
                    score,
                })
            })
            .collect()
    }

    fn load_edges(&self) -> Result<Vec<SimilarityEdge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id_a, id_b, score FROM similarity_edges ORDER BY score DESC, id_a, id_b")?;
        let rows: Vec<(String, String, f64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(a, b, score)| Ok(SimilarityEdge::new(parse_uuid(&a)?, parse_uuid(&b)?, score)))
            .collect()
    }
}

impl SnapshotPort for SqliteStore {
    fn load(&self) -> std::result::Result<Option<Snapshot>, PortError> {
        Ok(self.load_snapshot()?)
    }

    fn save(&self, snapshot: &Snapshot) -> std::result::Result<(), PortError> {
        Ok(self.save_snapshot(snapshot)?)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("bad UUID '{s}': {e}")))
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp '{s}': {e}")))
}

/// Little-endian f64 components, 8 bytes each.
fn encode_vector(vector: &[f64]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(StoreError::InvalidData(format!(
            "vector blob of {} bytes is not a whole number of f64s",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect())
}
