use sws_types::SwitchError;
use thiserror::Error;

/// Errors from the record log and dump file layers.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record line could not be parsed. `line` is 1-based.
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A dump frame failed its checksum.
    #[error("dump frame at offset {offset}: crc mismatch (expected {expected:#010x}, got {actual:#010x})")]
    CrcMismatch { offset: u64, expected: u32, actual: u32 },

    /// A dump frame was cut short or has an impossible length.
    #[error("dump frame at offset {offset}: {reason}")]
    BadFrame { offset: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Switch(#[from] SwitchError),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

impl From<RecordError> for SwitchError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Switch(inner) => inner,
            RecordError::Parse { .. } => SwitchError::InvalidParameter(e.to_string()),
            other => SwitchError::Failure(other.to_string()),
        }
    }
}
