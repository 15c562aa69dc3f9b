//! Minimal EBML primitives: vint decoding and element identification.
//!
//! Only the elements the seek path needs are classified; everything else is
//! treated as opaque binary and skipped by size.

use crate::common::errors::StreamError;

/// Element IDs of interest, with their marker bits intact.
pub mod ids {
    pub const EBML_HEAD: u32 = 0x1A45DFA3;
    pub const SEGMENT: u32 = 0x18538067;
    pub const INFO: u32 = 0x1549A966;
    pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
    pub const DURATION: u32 = 0x4489;
    pub const TRACKS: u32 = 0x1654AE6B;
    pub const TRACK_ENTRY: u32 = 0xAE;
    pub const TRACK_NUMBER: u32 = 0xD7;
    pub const TRACK_TYPE: u32 = 0x83;
    pub const CODEC_ID: u32 = 0x86;
    pub const CUES: u32 = 0x1C53BB6B;
    pub const CUE_POINT: u32 = 0xBB;
    pub const CUE_TIME: u32 = 0xB3;
    pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
    pub const CUE_POSITION: u32 = 0xF1;
    pub const CLUSTER: u32 = 0x1F43B675;
    pub const TIMECODE: u32 = 0xE7;
    pub const SIMPLE_BLOCK: u32 = 0xA3;
}

/// The raw big-endian byte pattern of the Cluster ID, used by the
/// closest-cluster resync scan.
pub const CLUSTER_ID_BYTES: [u8; 4] = [0x1F, 0x43, 0xB6, 0x75];

/// How an element's payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Master,
    UInt,
    String,
    Float,
    Binary,
}

pub fn kind_of(id: u32) -> ElementKind {
    use ids::*;
    match id {
        EBML_HEAD | SEGMENT | INFO | TRACKS | TRACK_ENTRY | CUES | CUE_POINT
        | CUE_TRACK_POSITIONS | CLUSTER => ElementKind::Master,
        TIMECODE_SCALE | TRACK_NUMBER | TRACK_TYPE | CUE_TIME | CUE_POSITION | TIMECODE => {
            ElementKind::UInt
        }
        CODEC_ID => ElementKind::String,
        DURATION => ElementKind::Float,
        _ => ElementKind::Binary,
    }
}

/// Decodes an element ID, marker bits kept.
///
/// `Ok(None)` means the buffered data is shorter than the encoded length;
/// the caller must stall and retry on the next write, so partial fields are
/// never consumed. A marker byte that cannot start a valid ID is an error,
/// never a stall: waiting for more bytes would hang a corrupt stream.
pub fn read_id(buf: &[u8]) -> Result<Option<(u32, usize)>, StreamError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first == 0 {
        return Err(StreamError::ContainerParse("invalid element id marker".into()));
    }
    let len = first.leading_zeros() as usize + 1;
    if len > 4 {
        return Err(StreamError::ContainerParse(format!(
            "element id of {} bytes exceeds the 4-byte maximum",
            len
        )));
    }
    if buf.len() < len {
        return Ok(None);
    }

    let mut id: u32 = 0;
    for &b in &buf[..len] {
        id = (id << 8) | b as u32;
    }
    Ok(Some((id, len)))
}

/// Decodes a size vint, marker bit masked off.
///
/// `Ok(None)` means more bytes are needed. An all-ones value is the EBML
/// "unknown size" marker and is surfaced as `(u64::MAX, len)`. A zero
/// marker byte would mean a field longer than 8 bytes and is an error.
pub fn read_size(buf: &[u8]) -> Result<Option<(u64, usize)>, StreamError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first == 0 {
        return Err(StreamError::ContainerParse(
            "size field exceeds the 8-byte maximum".into(),
        ));
    }
    let len = first.leading_zeros() as usize + 1;
    if buf.len() < len {
        return Ok(None);
    }

    let mut value = (first ^ (0x80 >> (len - 1))) as u64;
    for &b in &buf[1..len] {
        value = (value << 8) | b as u64;
    }

    let unknown = (1u64 << (7 * len)) - 1;
    if value == unknown {
        return Ok(Some((u64::MAX, len)));
    }
    Ok(Some((value, len)))
}

/// Encodes `value` as a minimal-length size vint (1–8 length bytes).
pub fn encode_size(value: u64) -> Vec<u8> {
    let mut len = 1;
    // Reserve the all-ones pattern for "unknown size".
    while len < 8 && value >= (1u64 << (7 * len)) - 1 {
        len += 1;
    }

    let mut out = vec![0u8; len];
    let mut v = value;
    for i in (0..len).rev() {
        out[i] = (v & 0xFF) as u8;
        v >>= 8;
    }
    out[0] |= 0x80 >> (len - 1);
    out
}

/// Interprets a payload as a big-endian unsigned integer.
pub fn parse_uint(payload: &[u8]) -> u64 {
    payload.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Interprets a payload as an IEEE float (4 or 8 bytes).
pub fn parse_float(payload: &[u8]) -> Option<f64> {
    match payload.len() {
        4 => Some(f32::from_be_bytes(payload.try_into().ok()?) as f64),
        8 => Some(f64::from_be_bytes(payload.try_into().ok()?)),
        _ => None,
    }
}
