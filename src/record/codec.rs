//! On-disk frame for one record.
//!
//! ```text
//! ┌──────────┬──────────┬──────────────┬──────────────────┐
//! │ CRC (4B) │ Len (4B) │ Version (8B) │ Identifier (var) │
//! └──────────┴──────────┴──────────────┴──────────────────┘
//! ```
//!
//! Len counts everything after the Len field (version + identifier), so
//! frames can be concatenated with no separator and still be split apart.
//! CRC covers everything after the CRC field itself. All integers are
//! little-endian; the identifier is UTF-8.

use std::io::{self, Read};

use crate::error::{Error, Result};
use crate::types::Record;

const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
const VERSION_SIZE: usize = 8;
const PREFIX_SIZE: usize = CRC_SIZE + LEN_SIZE;

/// Fixed part of every frame.
pub const HEADER_SIZE: usize = PREFIX_SIZE + VERSION_SIZE;

/// Largest payload accepted on decode. A bigger Len means the stream is garbage.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Longest identifier that fits in a decodable frame.
pub const MAX_ID_LEN: usize = MAX_PAYLOAD_SIZE - VERSION_SIZE;

/// Reject records whose frame `decode` would refuse.
pub fn check_encodable(record: &Record) -> Result<()> {
    if record.id.len() > MAX_ID_LEN {
        return Err(Error::RecordTooLarge {
            id_len: record.id.len(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

/// Serialize a record to a standalone frame.
///
/// Does not check the identifier length; callers writing untrusted records
/// go through [`check_encodable`] first, as `RecordWriter` does.
pub fn encode(record: &Record) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_size(record));
    encode_into(record, &mut buf);
    buf
}

/// Append the frame for `record` to `buf`.
pub fn encode_into(record: &Record, buf: &mut Vec<u8>) {
    let start = buf.len();
    let payload_len = VERSION_SIZE + record.id.len();

    // CRC placeholder, patched once the rest is in place
    buf.extend_from_slice(&[0u8; CRC_SIZE]);
    buf.extend_from_slice(&(payload_len as u32).to_le_bytes());
    buf.extend_from_slice(&record.version.to_le_bytes());
    buf.extend_from_slice(record.id.as_bytes());

    let crc = crc32fast::hash(&buf[start + CRC_SIZE..]);
    buf[start..start + CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
}

/// Size of the frame for `record`.
pub fn encoded_size(record: &Record) -> usize {
    HEADER_SIZE + record.id.len()
}

/// Decode the frame at the start of `data`. Trailing bytes are ignored.
pub fn decode(data: &[u8]) -> Result<Record> {
    if data.len() < HEADER_SIZE {
        return Err(Error::Corruption("record too short".into()));
    }

    let stored_crc = le_u32(&data[0..CRC_SIZE]);
    let payload_len = checked_payload_len(le_u32(&data[CRC_SIZE..PREFIX_SIZE]))?;

    let total_len = PREFIX_SIZE + payload_len;
    if data.len() < total_len {
        return Err(Error::Corruption("record truncated".into()));
    }

    let computed_crc = crc32fast::hash(&data[CRC_SIZE..total_len]);
    if stored_crc != computed_crc {
        return Err(Error::Corruption("CRC mismatch".into()));
    }

    parse_payload(&data[PREFIX_SIZE..total_len])
}

/// Read the next frame from a byte stream.
///
/// Returns `Ok(None)` on a clean end of stream (no bytes at a frame
/// boundary). A stream that ends inside a frame is corruption, never a
/// silent stop.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Record>> {
    let mut prefix = [0u8; PREFIX_SIZE];
    if !fill_or_eof(reader, &mut prefix)? {
        return Ok(None);
    }

    let stored_crc = le_u32(&prefix[0..CRC_SIZE]);
    let payload_len = checked_payload_len(le_u32(&prefix[CRC_SIZE..]))?;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Corruption("record truncated".into()),
        _ => Error::Io(e),
    })?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&prefix[CRC_SIZE..]);
    hasher.update(&payload);
    if hasher.finalize() != stored_crc {
        return Err(Error::Corruption("CRC mismatch".into()));
    }

    parse_payload(&payload).map(Some)
}

/// Fill `buf` completely. `Ok(false)` if the stream was already at EOF.
fn fill_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(Error::Corruption("record header truncated".into())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn checked_payload_len(raw: u32) -> Result<usize> {
    let len = raw as usize;
    if len < VERSION_SIZE {
        return Err(Error::Corruption(format!("payload length {len} below minimum")));
    }
    if len > MAX_PAYLOAD_SIZE {
        return Err(Error::Corruption(format!("payload length {len} exceeds limit")));
    }
    Ok(len)
}

fn parse_payload(payload: &[u8]) -> Result<Record> {
    let mut version = [0u8; VERSION_SIZE];
    version.copy_from_slice(&payload[..VERSION_SIZE]);
    let id = std::str::from_utf8(&payload[VERSION_SIZE..])
        .map_err(|e| Error::Corruption(format!("identifier is not UTF-8: {e}")))?;

    Ok(Record {
        id: id.to_owned(),
        version: i64::from_le_bytes(version),
    })
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
