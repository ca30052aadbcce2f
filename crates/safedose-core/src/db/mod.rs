//! Database layer for safedose.

mod dose_logs;
mod protocols;
mod schema;

pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::DosingProtocol;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Storage for dosing protocols.
///
/// Loaded protocols are handed to the next-dose resolver as plain values.
pub trait ProtocolRepository {
    /// Insert or replace a protocol. An existing protocol keeps its owner;
    /// saving over another user's protocol is a `Constraint` error.
    fn save_protocol(&self, protocol: &DosingProtocol) -> DbResult<()>;

    /// Load a protocol by ID.
    fn load_protocol(&self, id: &str) -> DbResult<Option<DosingProtocol>>;

    /// List protocols owned by `user_id` (`None` lists local-only protocols), newest first.
    fn list_protocols(&self, user_id: Option<&str>) -> DbResult<Vec<DosingProtocol>>;

    /// Delete a protocol owned by `user_id`. Returns false if no such protocol exists.
    fn delete_protocol(&self, id: &str, user_id: Option<&str>) -> DbResult<bool>;

    /// Activate or pause a protocol owned by `user_id`. Returns false if no such protocol exists.
    fn set_protocol_active(
        &self,
        id: &str,
        user_id: Option<&str>,
        active: bool,
    ) -> DbResult<bool>;
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"dosing_protocols".to_string()));
        assert!(tables.contains(&"dose_logs".to_string()));
    }

    #[test]
    fn test_open_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safedose.db");

        Database::open(&path).unwrap();
        // Schema uses IF NOT EXISTS, reopening must not fail
        assert!(Database::open(&path).is_ok());
    }
}
