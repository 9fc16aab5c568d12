//! Tolerant record log reader.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::RecordResult;

/// One complete line of the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// 1-based line number.
    pub line_no: usize,
    pub text: String,
}

/// Complete lines of a record log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordLog {
    pub entries: Vec<LogEntry>,
    /// The file ended in a partial line, which was discarded.
    pub truncated_tail: bool,
}

/// Read every newline-terminated line of `path`.
///
/// A final line with no newline is the remains of an interrupted write and
/// is dropped. Blank lines are skipped.
pub fn read_log(path: &Path) -> RecordResult<RecordLog> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);

    let mut log = RecordLog::default();
    let mut rest: &str = &text;
    let mut line_no = 0;
    while let Some(pos) = rest.find('\n') {
        line_no += 1;
        let line = rest[..pos].trim_end_matches('\r');
        if !line.is_empty() {
            log.entries.push(LogEntry {
                line_no,
                text: line.to_string(),
            });
        }
        rest = &rest[pos + 1..];
    }
    if !rest.is_empty() {
        warn!(
            path = %path.display(),
            line = line_no + 1,
            bytes = rest.len(),
            "discarding truncated final record line"
        );
        log.truncated_tail = true;
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_complete_lines_with_numbers() {
        let f = write("a\n\nb\n");
        let log = read_log(f.path()).unwrap();
        assert!(!log.truncated_tail);
        assert_eq!(
            log.entries,
            vec![
                LogEntry { line_no: 1, text: "a".into() },
                LogEntry { line_no: 3, text: "b".into() },
            ]
        );
    }

    #[test]
    fn drops_partial_final_line() {
        let f = write("t:1|c|0|vlan:1|0\nt:1|c|0|vl");
        let log = read_log(f.path()).unwrap();
        assert!(log.truncated_tail);
        assert_eq!(log.entries.len(), 1);
    }

    #[test]
    fn empty_file_is_empty_log() {
        let f = write("");
        assert_eq!(read_log(f.path()).unwrap(), RecordLog::default());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_log(&dir.path().join("absent.log")).is_err());
    }
}
