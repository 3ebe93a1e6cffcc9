use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::config;
use crate::integrity;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("bad magic: expected 0x{expected:08X}, got 0x{got:08X}")]
    BadMagic { expected: u32, got: u32 },
    #[error("checksum mismatch: expected 0x{expected:08X}, got 0x{computed:08X}")]
    ChecksumMismatch { expected: u32, computed: u32 },
    #[error("frame too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),
    #[error("payload of {0} bytes does not fit the 32-bit length field")]
    PayloadTooLarge(usize),
}

/// Compression algorithm tag recorded in the frame.
///
/// The codec never interprets the payload; the tag only tells the reader which
/// inverse transform to apply after reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    #[default]
    Stored = 0,
    Zlib = 1,
}

impl Compression {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Compression::Stored),
            1 => Some(Compression::Zlib),
            _ => None,
        }
    }
}

/// Per-page values written into the header alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMeta {
    pub flags: u8,
    pub compression: u8,
    pub page_index: u16,
    pub page_count: u16,
    /// Identifies the document the page belongs to; see [`integrity::document_id`].
    pub document_id: u64,
}

/// Parsed frame header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u32,
    pub version: u8,
    pub flags: u8,
    pub compression: u8,
    pub page_index: u16,
    pub page_count: u16,
    pub payload_length: u32,
    pub document_id: u64,
    pub checksum: u32,
}

impl FrameHeader {
    pub fn is_encrypted(&self) -> bool {
        self.flags & config::FLAG_ENCRYPTED != 0
    }

    pub fn is_last_page(&self) -> bool {
        self.flags & config::FLAG_LAST_PAGE != 0
    }
}

// Header field offsets (V2, 28 bytes total)
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_FLAGS: usize = 5;
const OFF_COMPRESSION: usize = 6;
const OFF_PAGE_INDEX: usize = 8;
const OFF_PAGE_COUNT: usize = 10;
const OFF_PAYLOAD_LEN: usize = 12;
const OFF_DOCUMENT_ID: usize = 16;
const OFF_CHECKSUM: usize = 24;

/// Prepend a frame header to `payload`.
///
/// Fails only for payloads of 4 GiB or more, which the length field cannot
/// describe.
pub fn frame(payload: &[u8], meta: &FrameMeta) -> Result<Vec<u8>, FrameError> {
    let payload_length = length_field(payload.len())?;
    let mut header = [0u8; config::FRAME_HEADER_SIZE];

    LittleEndian::write_u32(&mut header[OFF_MAGIC..], config::MAGIC);
    header[OFF_VERSION] = config::FRAME_VERSION;
    header[OFF_FLAGS] = meta.flags;
    header[OFF_COMPRESSION] = meta.compression;
    LittleEndian::write_u16(&mut header[OFF_PAGE_INDEX..], meta.page_index);
    LittleEndian::write_u16(&mut header[OFF_PAGE_COUNT..], meta.page_count);
    LittleEndian::write_u32(&mut header[OFF_PAYLOAD_LEN..], payload_length);
    LittleEndian::write_u64(&mut header[OFF_DOCUMENT_ID..], meta.document_id);

    let checksum = integrity::frame_crc32(&header, OFF_CHECKSUM, payload);
    LittleEndian::write_u32(&mut header[OFF_CHECKSUM..], checksum);

    let mut framed = Vec::with_capacity(config::FRAME_HEADER_SIZE + payload.len());
    framed.extend_from_slice(&header);
    framed.extend_from_slice(payload);
    Ok(framed)
}

fn length_field(len: usize) -> Result<u32, FrameError> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge(len))
}

/// Validate a frame and return its header and payload.
///
/// Bytes past `payload_length` (block padding) are ignored. A length field
/// pointing past the end of the input can only come from a damaged header,
/// so it is reported as a checksum mismatch over the bytes that are present.
/// The version is checked only after the checksum so that a corrupted version
/// byte reads as corruption rather than as a newer format.
pub fn unframe(framed: &[u8]) -> Result<(FrameHeader, Vec<u8>), FrameError> {
    if framed.len() < config::FRAME_HEADER_SIZE {
        return Err(FrameError::TooShort {
            need: config::FRAME_HEADER_SIZE,
            have: framed.len(),
        });
    }

    let header_bytes = &framed[..config::FRAME_HEADER_SIZE];

    let magic = LittleEndian::read_u32(&header_bytes[OFF_MAGIC..]);
    if magic != config::MAGIC {
        return Err(FrameError::BadMagic {
            expected: config::MAGIC,
            got: magic,
        });
    }

    let payload_length = LittleEndian::read_u32(&header_bytes[OFF_PAYLOAD_LEN..]);
    let claimed_end = config::FRAME_HEADER_SIZE.saturating_add(payload_length as usize);
    let end = claimed_end.min(framed.len());

    let payload = &framed[config::FRAME_HEADER_SIZE..end];
    let checksum = LittleEndian::read_u32(&header_bytes[OFF_CHECKSUM..]);
    let computed = integrity::frame_crc32(header_bytes, OFF_CHECKSUM, payload);
    if computed != checksum || end < claimed_end {
        return Err(FrameError::ChecksumMismatch {
            expected: checksum,
            computed,
        });
    }

    let version = header_bytes[OFF_VERSION];
    if version != config::FRAME_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    let header = FrameHeader {
        magic,
        version,
        flags: header_bytes[OFF_FLAGS],
        compression: header_bytes[OFF_COMPRESSION],
        page_index: LittleEndian::read_u16(&header_bytes[OFF_PAGE_INDEX..]),
        page_count: LittleEndian::read_u16(&header_bytes[OFF_PAGE_COUNT..]),
        payload_length,
        document_id: LittleEndian::read_u64(&header_bytes[OFF_DOCUMENT_ID..]),
        checksum,
    };

    Ok((header, payload.to_vec()))
}
