use sws_types::{AttrId, ObjectId, SwitchError, ValueKind};

/// Errors from attribute store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The object has no slots.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object exists but the slot does not.
    #[error("slot not found: {id} attr {attr} extra {extra}")]
    SlotNotFound { id: ObjectId, attr: AttrId, extra: u32 },

    /// Slots were already allocated for this object.
    #[error("object already exists: {0}")]
    AlreadyExists(ObjectId),

    /// Stored and supplied value kinds differ.
    #[error("type mismatch on {id} attr {attr}: stored {stored}, given {given}")]
    TypeMismatch {
        id: ObjectId,
        attr: AttrId,
        stored: ValueKind,
        given: ValueKind,
    },

    /// A list header disagrees with its element slots.
    #[error("corrupt list {id} attr {attr}: {reason}")]
    CorruptList {
        id: ObjectId,
        attr: AttrId,
        reason: String,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for SwitchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) | StoreError::SlotNotFound { .. } => {
                SwitchError::ItemNotFound(e.to_string())
            }
            StoreError::AlreadyExists(id) => SwitchError::ItemAlreadyExists { existing: id },
            StoreError::TypeMismatch { .. } => SwitchError::InvalidParameter(e.to_string()),
            StoreError::CorruptList { .. } => SwitchError::Failure(e.to_string()),
        }
    }
}
