//! Error types for the index crate.

use sws_types::{ObjectId, ObjectType, SwitchError};

/// Errors that can occur during index operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// No entry for this key.
    #[error("no key in group {group} of type {object_type}")]
    NotFound { object_type: ObjectType, group: usize },

    /// The key already maps to a different object.
    #[error("key already maps to {existing}")]
    AlreadyExists { existing: ObjectId },
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;

impl From<IndexError> for SwitchError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::NotFound { .. } => SwitchError::ItemNotFound(e.to_string()),
            IndexError::AlreadyExists { existing } => SwitchError::ItemAlreadyExists { existing },
        }
    }
}
