//! SQLite-backed mirror of per-session strike state. The in-memory strike
//! machine stays authoritative; this store only provides cross-reload
//! continuity for the blocked flag and strike count.

use crate::risk::StrikeState;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Ephemeral store, used by tests and hosts that opt out of durability.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                strikes INTEGER NOT NULL,
                blocked INTEGER NOT NULL,
                updated_ts INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_ts);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upsert the state for one session.
    pub fn save(&self, session_id: &str, state: StrikeState, ts: i64) -> Result<(), StoreError> {
        self.conn.lock().expect("lock").execute(
            "INSERT OR REPLACE INTO sessions (session_id, strikes, blocked, updated_ts) \
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, state.strikes, state.blocked as i64, ts],
        )?;
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Option<StrikeState>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        let mut stmt =
            conn.prepare("SELECT strikes, blocked FROM sessions WHERE session_id = ?1")?;
        let mut rows = stmt.query(params![session_id])?;
        if let Some(row) = rows.next()? {
            let strikes: u32 = row.get(0)?;
            let blocked: i64 = row.get(1)?;
            return Ok(Some(StrikeState {
                strikes,
                blocked: blocked != 0,
            }));
        }
        Ok(None)
    }

    /// Retention: delete sessions last updated before `ts`.
    pub fn prune_before(&self, ts: i64) -> Result<u64, StoreError> {
        let n = self
            .conn
            .lock()
            .expect("lock")
            .execute("DELETE FROM sessions WHERE updated_ts < ?1", params![ts])?;
        Ok(n as u64)
    }
}
