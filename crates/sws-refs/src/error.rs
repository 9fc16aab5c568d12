//! Error types for reference graph operations.

use sws_types::{AttrId, ObjectId, SwitchError};
use thiserror::Error;

/// Errors that can occur during reference graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// Tried to remove an edge that was never added.
    #[error("no edge {referencing} -> {referenced} (attr {attr:?})")]
    EdgeNotFound {
        referenced: ObjectId,
        referencing: ObjectId,
        attr: Option<AttrId>,
    },

    /// Null handles never take part in edges.
    #[error("null handle in reference edge")]
    NullHandle,
}

/// Convenience type alias for graph operations.
pub type RefResult<T> = std::result::Result<T, RefError>;

impl From<RefError> for SwitchError {
    fn from(e: RefError) -> Self {
        // A missing edge means the graph and the attribute store disagree.
        SwitchError::Failure(e.to_string())
    }
}
