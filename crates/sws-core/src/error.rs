use sws_record::RecordError;
use sws_types::SwitchError;
use thiserror::Error;

/// Failure of a log replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot read record log: {0}")]
    Read(#[from] RecordError),

    /// The operation on `line` (1-based) failed; nothing after it ran.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: SwitchError,
    },
}

pub type ReplayResult<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Line { line, .. } => Some(*line),
            Self::Read(_) => None,
        }
    }
}

impl From<ReplayError> for SwitchError {
    fn from(e: ReplayError) -> Self {
        match e {
            ReplayError::Read(inner) => inner.into(),
            ReplayError::Line { source, .. } => source,
        }
    }
}
