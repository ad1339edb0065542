//! Volume schema definition

use rusqlite::Connection;
use tracing::debug;

use crate::error::StorageError;

/// The single table every volume holds
pub const ENTITIES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mime_type TEXT NOT NULL,
    status INTEGER NOT NULL,
    content BLOB
);
"#;

/// Create the entities table; a no-op on an initialized volume
pub fn create_entities_table(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(ENTITIES_SCHEMA)
        .map_err(|e| StorageError::Database(format!("Failed to create entities table: {}", e)))?;
    debug!("Entities table ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_entities_table(&conn).unwrap();
        create_entities_table(&conn).unwrap();

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('entities')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["id", "mime_type", "status", "content"]);
    }
}
