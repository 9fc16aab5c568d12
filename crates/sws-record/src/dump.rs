//! Dump file framing.
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode)]
//! ```
//!
//! The first frame is a [`DumpHeader`]; every following frame is one
//! [`ObjectSnapshot`]. Unlike the record log, a dump is written whole, so
//! any bad frame makes the file unreadable.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sws_types::{Attribute, ObjectId};
use tracing::debug;

use crate::error::{RecordError, RecordResult};

const HEADER_SIZE: u64 = 8;

/// Current dump format version.
pub const DUMP_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpHeader {
    pub version: u32,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub object_count: u64,
}

impl DumpHeader {
    pub fn new(object_count: u64) -> Self {
        Self {
            version: DUMP_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            object_count,
        }
    }
}

/// Every attribute of one live object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub attrs: Vec<Attribute>,
}

/// Writes a dump file frame by frame.
pub struct DumpWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    objects: u64,
}

impl DumpWriter {
    /// Create (truncating) `path` and write the header frame.
    pub fn create(path: &Path, header: &DumpHeader) -> RecordResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        write_frame(&mut writer, header)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            objects: 0,
        })
    }

    pub fn append(&mut self, snapshot: &ObjectSnapshot) -> RecordResult<()> {
        write_frame(&mut self.writer, snapshot)?;
        self.objects += 1;
        Ok(())
    }

    /// Flush and sync. Returns the number of object frames written.
    pub fn finish(mut self) -> RecordResult<u64> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        debug!(path = %self.path.display(), objects = self.objects, "dump written");
        Ok(self.objects)
    }
}

fn write_frame<T: Serialize>(w: &mut impl Write, value: &T) -> RecordResult<()> {
    let payload =
        bincode::serialize(value).map_err(|e| RecordError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| RecordError::Serialization(format!("frame of {} bytes", payload.len())))?;
    w.write_all(&length.to_le_bytes())?;
    w.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read the frame at `*offset`, advancing it. `Ok(None)` at a clean end of
/// file.
fn read_frame<T: DeserializeOwned>(
    r: &mut impl Read,
    offset: &mut u64,
    file_len: u64,
) -> RecordResult<Option<T>> {
    if *offset == file_len {
        return Ok(None);
    }
    if *offset + HEADER_SIZE > file_len {
        return Err(RecordError::BadFrame {
            offset: *offset,
            reason: "truncated frame header".into(),
        });
    }
    let mut header = [0u8; HEADER_SIZE as usize];
    r.read_exact(&mut header)?;
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if length == 0 || *offset + HEADER_SIZE + u64::from(length) > file_len {
        return Err(RecordError::BadFrame {
            offset: *offset,
            reason: format!("invalid payload length {length}"),
        });
    }
    let mut payload = vec![0u8; length as usize];
    r.read_exact(&mut payload)?;

    let actual = crc32fast::hash(&payload);
    if actual != expected {
        return Err(RecordError::CrcMismatch {
            offset: *offset,
            expected,
            actual,
        });
    }
    let value =
        bincode::deserialize(&payload).map_err(|e| RecordError::Serialization(e.to_string()))?;
    *offset += HEADER_SIZE + u64::from(length);
    Ok(Some(value))
}

/// A fully read dump file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpFile {
    pub header: DumpHeader,
    pub objects: Vec<ObjectSnapshot>,
}

pub fn read_dump(path: &Path) -> RecordResult<DumpFile> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut offset = 0;

    let header: DumpHeader =
        read_frame(&mut reader, &mut offset, file_len)?.ok_or_else(|| RecordError::BadFrame {
            offset: 0,
            reason: "empty dump file".into(),
        })?;
    if header.version != DUMP_VERSION {
        return Err(RecordError::BadFrame {
            offset: 0,
            reason: format!("unsupported dump version {}", header.version),
        });
    }

    let mut objects = Vec::new();
    while let Some(snapshot) = read_frame::<ObjectSnapshot>(&mut reader, &mut offset, file_len)? {
        objects.push(snapshot);
    }
    if objects.len() as u64 != header.object_count {
        return Err(RecordError::BadFrame {
            offset,
            reason: format!(
                "header announces {} objects, found {}",
                header.object_count,
                objects.len()
            ),
        });
    }
    debug!(path = %path.display(), objects = objects.len(), "dump read");
    Ok(DumpFile { header, objects })
}
