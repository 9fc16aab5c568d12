//! Append-only record log writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RecordResult;
use crate::line::RecordLine;

/// Flush/sync strategy for the record log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every line.
    EveryWrite,
    /// Flush to the OS after every line and let it decide when to sync.
    #[default]
    OsDefault,
}

struct LogWriter {
    writer: BufWriter<File>,
    lines: u64,
}

/// Appends [`RecordLine`]s to a log file, one per line.
///
/// Each line is written and flushed under one lock, so concurrent callers
/// never interleave partial lines.
pub struct Recorder {
    path: PathBuf,
    sync_mode: SyncMode,
    writer: Mutex<LogWriter>,
}

impl Recorder {
    /// Open (or create) the log at `path`, appending to existing content.
    pub fn open(path: &Path, sync_mode: SyncMode) -> RecordResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), ?sync_mode, "record log opened");
        Ok(Self {
            path: path.to_path_buf(),
            sync_mode,
            writer: Mutex::new(LogWriter {
                writer: BufWriter::new(file),
                lines: 0,
            }),
        })
    }

    pub fn append(&self, line: &RecordLine) -> RecordResult<()> {
        let mut w = self.writer.lock();
        writeln!(w.writer, "{line}")?;
        w.writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }
        w.lines += 1;
        Ok(())
    }

    /// Lines appended through this recorder.
    pub fn lines_written(&self) -> u64 {
        self.writer.lock().lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}
