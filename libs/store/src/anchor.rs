//! Tuple anchor codec.
//!
//! The anchor is the header-of-headers: a fixed-format record, always
//! written to the distinguished anchor key and always written last, that
//! tells a reader where the rest of the metadata lives and how big it is.
//! A reader that cannot obtain a valid anchor treats the tuple as absent.
//!
//! On-storage layout (all integers little-endian unsigned 32-bit):
//!
//! ```text
//! u32 version
//! u32 n_bytes_header    compressed header size
//! u32 len_header        uncompressed header size
//! u32 n_bytes_footer
//! u32 len_footer
//! str obj_class         u32 length prefix + bytes
//! ```

use byteorder::{ByteOrder, LittleEndian};
use tessera_daos::ObjClassId;

use crate::error::{Error, Result};

pub const ANCHOR_VERSION: u32 = 1;

/// Size of the fixed integer envelope preceding the class name.
const ENVELOPE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleAnchor {
    pub version: u32,
    /// Compressed (on-storage) size of the header record.
    pub n_bytes_header: u32,
    /// Uncompressed size of the header record.
    pub len_header: u32,
    pub n_bytes_footer: u32,
    pub len_footer: u32,
    /// Name of the object class the tuple was written with.
    pub obj_class: String,
}

impl Default for TupleAnchor {
    fn default() -> Self {
        Self {
            version: ANCHOR_VERSION,
            n_bytes_header: 0,
            len_header: 0,
            n_bytes_footer: 0,
            len_footer: 0,
            obj_class: String::new(),
        }
    }
}

impl TupleAnchor {
    /// Exact size of this anchor when serialized.
    pub fn serialized_size(&self) -> usize {
        ENVELOPE_SIZE + 4 + self.obj_class.len()
    }

    /// Storage reserved for the anchor record: the fixed envelope plus the
    /// class-name limit. Reads go through a buffer of this size; the actual
    /// record is usually shorter.
    pub fn reserved_size() -> usize {
        ENVELOPE_SIZE + 4 + ObjClassId::NAME_MAX_LENGTH
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.serialized_size()];
        LittleEndian::write_u32(&mut buf[0..4], self.version);
        LittleEndian::write_u32(&mut buf[4..8], self.n_bytes_header);
        LittleEndian::write_u32(&mut buf[8..12], self.len_header);
        LittleEndian::write_u32(&mut buf[12..16], self.n_bytes_footer);
        LittleEndian::write_u32(&mut buf[16..20], self.len_footer);
        write_string(&mut buf[ENVELOPE_SIZE..], &self.obj_class);
        buf
    }

    /// Decode an anchor, returning it together with the number of bytes
    /// consumed.
    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < ENVELOPE_SIZE {
            return Err(Error::TruncatedAnchor(buf.len()));
        }
        let version = LittleEndian::read_u32(&buf[0..4]);
        let n_bytes_header = LittleEndian::read_u32(&buf[4..8]);
        let len_header = LittleEndian::read_u32(&buf[8..12]);
        let n_bytes_footer = LittleEndian::read_u32(&buf[12..16]);
        let len_footer = LittleEndian::read_u32(&buf[16..20]);
        let (obj_class, n_str) = read_string(&buf[ENVELOPE_SIZE..])?;
        Ok((
            Self {
                version,
                n_bytes_header,
                len_header,
                n_bytes_footer,
                len_footer,
                obj_class,
            },
            ENVELOPE_SIZE + n_str,
        ))
    }
}

/// Write a u32-length-prefixed string. The destination must hold
/// `4 + s.len()` bytes.
fn write_string(buf: &mut [u8], s: &str) {
    LittleEndian::write_u32(&mut buf[0..4], s.len() as u32);
    buf[4..4 + s.len()].copy_from_slice(s.as_bytes());
}

/// Read a u32-length-prefixed string, returning it with the number of bytes
/// consumed.
fn read_string(buf: &[u8]) -> Result<(String, usize)> {
    if buf.len() < 4 {
        return Err(Error::StringDecode(format!(
            "missing length prefix: {} bytes remain",
            buf.len()
        )));
    }
    let len = LittleEndian::read_u32(&buf[0..4]) as usize;
    if len > ObjClassId::NAME_MAX_LENGTH {
        return Err(Error::StringDecode(format!(
            "class name of {len} bytes exceeds the {}-byte limit",
            ObjClassId::NAME_MAX_LENGTH
        )));
    }
    if buf.len() < 4 + len {
        return Err(Error::StringDecode(format!(
            "string of {len} bytes truncated to {}",
            buf.len() - 4
        )));
    }
    let s = std::str::from_utf8(&buf[4..4 + len])
        .map_err(|e| Error::StringDecode(e.to_string()))?
        .to_string();
    Ok((s, 4 + len))
}
