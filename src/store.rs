// Relational store handle
// One connection per run: opened once before the database load, held through
// the queries, released by `close()` or on drop (every exit path).

use crate::error::{EtlError, Result};
use crate::model::is_sql_identifier;
use rusqlite::Connection;
use std::path::Path;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| {
            EtlError::Storage(format!("failed to open {}: {}", db_path.display(), e))
        })?;
        let store = Store { conn };
        store.setup()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EtlError::Storage(format!("failed to open in-memory store: {}", e)))?;
        let store = Store { conn };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<()> {
        // WAL for crash recovery; in-memory databases report "memory"
        self.conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| EtlError::Storage(format!("failed to set journal mode: {}", e)))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Row count of `table_name`; a missing table is a storage error
    pub fn row_count(&self, table_name: &str) -> Result<i64> {
        if !is_sql_identifier(table_name) {
            return Err(EtlError::Config(format!("invalid table name '{}'", table_name)));
        }
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| EtlError::Storage(format!("failed to count {}: {}", table_name, e)))
    }

    /// Release the connection, surfacing close errors
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| EtlError::Storage(format!("failed to close connection: {}", e)))
    }
}

/// `name` → `"name"` (identifiers are validated before reaching here)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_after_insert() {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("CREATE TABLE Largest_banks (Name TEXT); INSERT INTO Largest_banks VALUES ('A');")
            .unwrap();

        assert_eq!(store.row_count("Largest_banks").unwrap(), 1);
        store.close().unwrap();
    }

    #[test]
    fn test_row_count_missing_table_is_storage_error() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(store.row_count("nope"), Err(EtlError::Storage(_))));
        assert!(matches!(store.row_count("x; DROP"), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Banks.db");
        let store = Store::open(&path).unwrap();
        store.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("MC_GBP_Billion"), "\"MC_GBP_Billion\"");
    }
}
