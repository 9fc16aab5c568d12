use std::fmt;

use thiserror::Error;

use crate::object::{ObjectId, ObjectType};

/// Stable status codes, as written into record lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    Failure = 1,
    InvalidParameter = 2,
    ItemNotFound = 3,
    ItemAlreadyExists = 4,
    ResourceInUse = 5,
    InvalidKeyGroup = 6,
    NotSupported = 7,
}

impl Status {
    /// Numeric code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`Status::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Success,
            1 => Self::Failure,
            2 => Self::InvalidParameter,
            3 => Self::ItemNotFound,
            4 => Self::ItemAlreadyExists,
            5 => Self::ResourceInUse,
            6 => Self::InvalidKeyGroup,
            7 => Self::NotSupported,
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::InvalidParameter => "invalid parameter",
            Self::ItemNotFound => "item not found",
            Self::ItemAlreadyExists => "item already exists",
            Self::ResourceInUse => "resource in use",
            Self::InvalidKeyGroup => "invalid key group",
            Self::NotSupported => "not supported",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by every layer of the object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    /// Malformed id, unknown attribute, or type/enum mismatch.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing object, attribute slot, key, or object type.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// Duplicate secondary key or reserved id.
    #[error("item already exists: {existing}")]
    ItemAlreadyExists { existing: ObjectId },

    /// Delete blocked by a live USER reference.
    #[error("object {object} is referenced by {referrer}")]
    ResourceInUse { object: ObjectId, referrer: ObjectId },

    /// Internal invariant violation.
    #[error("failure: {0}")]
    Failure(String),

    /// Key lookup attributes match no declared key group.
    #[error("attributes do not form a key group of type {0}")]
    InvalidKeyGroup(ObjectType),

    #[error("not supported: {0}")]
    NotSupported(String),
}

impl SwitchError {
    /// Status code for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidParameter(_) => Status::InvalidParameter,
            Self::ItemNotFound(_) => Status::ItemNotFound,
            Self::ItemAlreadyExists { .. } => Status::ItemAlreadyExists,
            Self::ResourceInUse { .. } => Status::ResourceInUse,
            Self::Failure(_) => Status::Failure,
            Self::InvalidKeyGroup(_) => Status::InvalidKeyGroup,
            Self::NotSupported(_) => Status::NotSupported,
        }
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::ItemNotFound(what.to_string())
    }

    pub fn invalid(what: impl fmt::Display) -> Self {
        Self::InvalidParameter(what.to_string())
    }
}

/// Result alias used across the store.
pub type SwitchResult<T> = Result<T, SwitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_roundtrip() {
        for code in 0..8 {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(Status::from_code(99).is_none());
    }

    #[test]
    fn errors_map_to_status() {
        assert_eq!(
            SwitchError::invalid("x").status(),
            Status::InvalidParameter
        );
        assert_eq!(
            SwitchError::ItemAlreadyExists {
                existing: ObjectId::NULL
            }
            .status(),
            Status::ItemAlreadyExists
        );
        assert_eq!(
            SwitchError::InvalidKeyGroup(ObjectType(1)).status(),
            Status::InvalidKeyGroup
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = SwitchError::not_found("object 0x1");
        assert_eq!(err.to_string(), "item not found: object 0x1");
    }
}
