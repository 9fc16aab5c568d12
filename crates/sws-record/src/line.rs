//! Record line structure.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use sws_types::Status;

/// Operation letter of a record line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Set,
    Remove,
    Get,
    Notify,
}

impl Op {
    pub fn letter(self) -> char {
        match self {
            Self::Create => 'c',
            Self::Set => 's',
            Self::Remove => 'r',
            Self::Get => 'g',
            Self::Notify => 'n',
        }
    }

    pub fn from_letter(s: &str) -> Option<Self> {
        Some(match s {
            "c" => Self::Create,
            "s" => Self::Set,
            "r" => Self::Remove,
            "g" => Self::Get,
            "n" => Self::Notify,
            _ => return None,
        })
    }

    /// `true` for operations replay re-issues against the store.
    pub fn mutates(self) -> bool {
        matches!(self, Self::Create | Self::Set | Self::Remove)
    }
}

/// One line of the record log.
///
/// `fields` hold `(key, value)` pairs whose values are already in their
/// escaped text form (see [`crate::codec`]). For object operations the key
/// is the decimal attribute id; notify lines use field names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLine {
    pub commented: bool,
    pub timestamp: String,
    pub thread: u64,
    pub op: Op,
    pub status: i32,
    pub type_name: String,
    pub dense_id: u64,
    pub extra: u64,
    pub fields: Vec<(String, String)>,
}

impl RecordLine {
    /// A successful, uncommented line stamped with the current time and
    /// thread.
    pub fn new(op: Op, type_name: impl Into<String>, dense_id: u64) -> Self {
        Self {
            commented: false,
            timestamp: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.6fZ")
                .to_string(),
            thread: current_thread_number(),
            op,
            status: Status::Success.code(),
            type_name: type_name.into(),
            dense_id,
            extra: 0,
            fields: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status.code();
        self
    }

    pub fn with_extra(mut self, extra: u64) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_fields(mut self, fields: Vec<(String, String)>) -> Self {
        self.fields = fields;
        self
    }

    pub fn commented(mut self, commented: bool) -> Self {
        self.commented = commented;
        self
    }

    /// Parse one line, without its trailing newline.
    pub fn parse(text: &str) -> Result<Self, String> {
        let (commented, body) = match text.strip_prefix('#') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut parts = body.split('|');
        let mut next = |what: &str| parts.next().ok_or_else(|| format!("missing {what}"));

        let stamp = next("timestamp")?;
        let (timestamp, thread) = stamp
            .rsplit_once(':')
            .ok_or_else(|| format!("malformed timestamp {stamp:?}"))?;
        let thread = thread
            .parse()
            .map_err(|_| format!("malformed thread id {thread:?}"))?;

        let op_text = next("operation")?;
        let op = Op::from_letter(op_text).ok_or_else(|| format!("unknown operation {op_text:?}"))?;

        let status_text = next("status")?;
        let status = status_text
            .parse()
            .map_err(|_| format!("malformed status {status_text:?}"))?;

        let object = next("object")?;
        let (type_name, dense) = object
            .rsplit_once(':')
            .ok_or_else(|| format!("malformed object {object:?}"))?;
        let dense_id = dense
            .parse()
            .map_err(|_| format!("malformed object id {dense:?}"))?;

        let extra_text = next("extra")?;
        let extra = extra_text
            .parse()
            .map_err(|_| format!("malformed extra {extra_text:?}"))?;

        let fields = parts
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| format!("field without '=': {p:?}"))
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(Self {
            commented,
            timestamp: timestamp.to_string(),
            thread,
            op,
            status,
            type_name: type_name.to_string(),
            dense_id,
            extra,
            fields,
        })
    }
}

impl fmt::Display for RecordLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commented {
            f.write_str("#")?;
        }
        write!(
            f,
            "{}:{}|{}|{}|{}:{}|{}",
            self.timestamp,
            self.thread,
            self.op.letter(),
            self.status,
            self.type_name,
            self.dense_id,
            self.extra
        )?;
        for (k, v) in &self.fields {
            write!(f, "|{k}={v}")?;
        }
        Ok(())
    }
}

static NEXT_THREAD_NUMBER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: u64 = NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique number of the calling thread, assigned on first use.
fn current_thread_number() -> u64 {
    THREAD_NUMBER.with(|n| *n)
}
