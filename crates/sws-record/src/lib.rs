//! Durable formats for the switch object store.
//!
//! Two files are produced:
//!
//! - The **record log**: append-only UTF-8 text, one operation per line,
//!   `timestamp:thread|op|status|type:dense-id|extra|attr=value|...`. A
//!   leading `#` marks a line written from inside a trigger chain; replay
//!   skips it. A crash may leave the final line without its newline, and the
//!   reader drops such a line.
//! - The **dump file**: a header frame followed by one frame per live
//!   object. Each frame is `[len: u32 LE][crc32: u32 LE][bincode payload]`.
//!
//! # Modules
//!
//! - [`line`] -- Record line structure and its text form
//! - [`codec`] -- Attribute value text encoding, guided by the model
//! - [`writer`] -- The [`Recorder`] appending lines to the log
//! - [`reader`] -- Tolerant log reader
//! - [`dump`] -- Dump file framing

pub mod codec;
pub mod dump;
pub mod error;
pub mod line;
pub mod reader;
pub mod writer;

pub use codec::{decode_attrs, encode_attrs, format_value, parse_value};
pub use dump::{read_dump, DumpFile, DumpHeader, DumpWriter, ObjectSnapshot};
pub use error::{RecordError, RecordResult};
pub use line::{Op, RecordLine};
pub use reader::{read_log, LogEntry, RecordLog};
pub use writer::{Recorder, SyncMode};
