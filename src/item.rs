//! Stored items and their addresses

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a stored item
///
/// Only `Committed` is written today. `Pending` and `Deleted` are reserved:
/// deletes remove the row instead of marking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Committed,
    Deleted,
}

impl ItemStatus {
    /// Integer code stored in the `status` column
    pub fn code(self) -> i64 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Committed => 1,
            ItemStatus::Deleted => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ItemStatus::Pending),
            1 => Some(ItemStatus::Committed),
            2 => Some(ItemStatus::Deleted),
            _ => None,
        }
    }
}

impl ToSql for ItemStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for ItemStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        ItemStatus::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// A blob plus its mime type and status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Assigned by the volume on insert; unique only within that volume
    pub id: u64,
    pub mime_type: String,
    pub status: ItemStatus,
    pub content: Vec<u8>,
}

impl Item {
    /// A not-yet-persisted committed item
    pub fn committed(mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            id: 0,
            mime_type: mime_type.into(),
            status: ItemStatus::Committed,
            content,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Globally unique location of an item: `(id, volume_id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemAddress {
    pub id: u64,
    pub volume_id: u32,
}

impl ItemAddress {
    pub fn new(id: u64, volume_id: u32) -> Self {
        Self { id, volume_id }
    }
}

impl std::fmt::Display for ItemAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.volume_id)
    }
}
