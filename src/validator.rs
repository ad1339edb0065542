//! Write-time item validation

use crate::error::StorageError;
use crate::item::{Item, ItemStatus};

/// Shortest accepted mime type, in characters
pub const MIN_MIME_TYPE_LEN: usize = 2;

/// Longest accepted mime type, in characters
pub const MAX_MIME_TYPE_LEN: usize = 255;

/// Statuses an item may carry when written
const ALLOWED_STATUSES: [ItemStatus; 3] = [
    ItemStatus::Pending,
    ItemStatus::Committed,
    ItemStatus::Deleted,
];

/// Validates items against per-item invariants before they reach a volume
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemValidator;

impl ItemValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, item: &Item) -> Result<(), StorageError> {
        if !ALLOWED_STATUSES.contains(&item.status) {
            return Err(StorageError::Validation(format!(
                "Status {:?} is not allowed for the item",
                item.status
            )));
        }

        if !mime_type_length_ok(&item.mime_type) {
            return Err(StorageError::Validation(format!(
                "Mime type {} is not allowed for the item, length should be between {} and {} characters",
                item.mime_type, MIN_MIME_TYPE_LEN, MAX_MIME_TYPE_LEN
            )));
        }

        Ok(())
    }
}

pub(crate) fn mime_type_length_ok(mime_type: &str) -> bool {
    let len = mime_type.chars().count();
    (MIN_MIME_TYPE_LEN..=MAX_MIME_TYPE_LEN).contains(&len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_mime(mime_type: &str) -> Item {
        Item::committed(mime_type, vec![1, 2, 3])
    }

    #[test]
    fn test_accepts_every_known_status() {
        let validator = ItemValidator::new();
        for status in ALLOWED_STATUSES {
            let mut item = item_with_mime("text/plain");
            item.status = status;
            assert!(validator.validate(&item).is_ok());
        }
    }

    #[test]
    fn test_mime_length_bounds() {
        let validator = ItemValidator::new();

        assert!(validator.validate(&item_with_mime("ab")).is_ok());
        assert!(validator.validate(&item_with_mime(&"a".repeat(255))).is_ok());

        for bad in ["", "a", &"a".repeat(256)] {
            let err = validator.validate(&item_with_mime(bad)).unwrap_err();
            assert!(matches!(err, StorageError::Validation(_)));
        }
    }

    #[test]
    fn test_length_counts_characters() {
        // two characters, four bytes
        assert!(mime_type_length_ok("éé"));
        assert!(!mime_type_length_ok("é"));
    }
}
