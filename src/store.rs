use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One resolved question/answer interaction, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub timestamp: String,
    pub insights_json: Option<String>,
}

/// Append-only SQLite log of agent interactions.
///
/// Clones share the underlying connection. Appends are single-statement
/// inserts serialized through the connection mutex, so multiple agents can
/// write to one log concurrently; records are immutable once written.
#[derive(Clone)]
pub struct InteractionLog {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS interactions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_question  TEXT NOT NULL,
    agent_response TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    insights       TEXT
)";

const RECORD_COLUMNS: &str = "id, user_question, agent_response, timestamp, insights";

impl InteractionLog {
    /// Open (or create) the log database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open interaction log at {}", path.display()))?;
        debug!(path = %path.display(), "interaction log opened");
        Self::init(conn)
    }

    /// In-memory log, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to create interactions table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append one record, returning its assigned id. Ids are unique and
    /// strictly increasing in insertion order.
    pub fn append(
        &self,
        question: &str,
        answer: &str,
        insights_json: Option<&str>,
    ) -> Result<i64> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO interactions (user_question, agent_response, timestamp, insights)
             VALUES (?1, ?2, ?3, ?4)",
            params![question, answer, timestamp, insights_json],
        )
        .context("Failed to store interaction")?;
        let id = conn.last_insert_rowid();
        debug!(id, "interaction stored");
        Ok(id)
    }

    /// All records, most recent first.
    pub fn list_all(&self) -> Result<Vec<InteractionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM interactions ORDER BY id DESC"
        ))?;
        let records = stmt
            .query_map([], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<InteractionRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM interactions WHERE id = ?1"),
                params![id],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Records whose question or answer contains `pattern`, oldest first.
    /// The match is a case-sensitive substring.
    pub fn search(&self, pattern: &str) -> Result<Vec<InteractionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM interactions
             WHERE instr(user_question, ?1) > 0 OR instr(agent_response, ?1) > 0
             ORDER BY id"
        ))?;
        let records = stmt
            .query_map(params![pattern], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<InteractionRecord> {
    Ok(InteractionRecord {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        timestamp: row.get(3)?,
        insights_json: row.get(4)?,
    })
}
