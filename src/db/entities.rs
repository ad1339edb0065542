//! Entity row operations
//!
//! Plain functions over a borrowed connection; the caller owns the
//! connection's lifetime.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::item::{Item, ItemStatus};

/// Insert a row and return its generated key
pub fn insert_entity(
    conn: &Connection,
    mime_type: &str,
    status: ItemStatus,
    content: &[u8],
) -> Result<u64, StorageError> {
    let generated: Option<i64> = conn
        .query_row(
            "INSERT INTO entities (mime_type, status, content) VALUES (?1, ?2, ?3) RETURNING id",
            params![mime_type, status, content],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StorageError::Database(format!("Failed to insert entity: {}", e)))?;

    let id = generated.ok_or_else(|| {
        StorageError::Database("Cannot get generated key for an inserted item".to_string())
    })?;

    u64::try_from(id)
        .map_err(|_| StorageError::Database(format!("Generated key out of range: {}", id)))
}

/// Get an entity by id
pub fn get_entity(conn: &Connection, id: u64) -> Result<Option<Item>, StorageError> {
    // Keys above i64::MAX can never have been generated
    let Ok(key) = i64::try_from(id) else {
        return Ok(None);
    };

    conn.query_row(
        "SELECT id, mime_type, status, content FROM entities WHERE id = ?1",
        params![key],
        |row| {
            let id: i64 = row.get(0)?;
            let content: Option<Vec<u8>> = row.get(3)?;
            Ok(Item {
                id: id as u64,
                mime_type: row.get(1)?,
                status: row.get(2)?,
                content: content.unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(|e| StorageError::Database(format!("Failed to get entity {}: {}", id, e)))
}

/// Delete an entity by id; missing ids are not an error
pub fn delete_entity(conn: &Connection, id: u64) -> Result<(), StorageError> {
    let Ok(key) = i64::try_from(id) else {
        return Ok(());
    };

    conn.execute("DELETE FROM entities WHERE id = ?1", params![key])
        .map_err(|e| StorageError::Database(format!("Failed to delete entity {}: {}", id, e)))?;
    Ok(())
}

/// Count stored entities
pub fn count_entities(conn: &Connection) -> Result<u64, StorageError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(format!("Query failed: {}", e)))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_entities_table;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_entities_table(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_get_delete() {
        let conn = setup();

        let id = insert_entity(&conn, "image/png", ItemStatus::Committed, &[0, 159, 146, 150]).unwrap();
        assert_eq!(id, 1);

        let item = get_entity(&conn, id).unwrap().unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.mime_type, "image/png");
        assert_eq!(item.status, ItemStatus::Committed);
        assert_eq!(item.content, vec![0, 159, 146, 150]);

        delete_entity(&conn, id).unwrap();
        assert!(get_entity(&conn, id).unwrap().is_none());
        assert_eq!(count_entities(&conn).unwrap(), 0);
    }

    #[test]
    fn test_keys_are_not_reused() {
        let conn = setup();

        let first = insert_entity(&conn, "text/plain", ItemStatus::Committed, b"a").unwrap();
        delete_entity(&conn, first).unwrap();
        let second = insert_entity(&conn, "text/plain", ItemStatus::Committed, b"b").unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_missing_and_out_of_range_ids() {
        let conn = setup();
        assert!(get_entity(&conn, 42).unwrap().is_none());
        assert!(get_entity(&conn, u64::MAX).unwrap().is_none());
        delete_entity(&conn, 42).unwrap();
        delete_entity(&conn, u64::MAX).unwrap();
    }

    #[test]
    fn test_unknown_status_is_rejected_on_read() {
        let conn = setup();
        conn.execute(
            "INSERT INTO entities (mime_type, status, content) VALUES ('text/plain', 9, x'00')",
            [],
        )
        .unwrap();

        let err = get_entity(&conn, 1).unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));
    }
}
