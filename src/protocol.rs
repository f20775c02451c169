//! Shared protocol constants and frame encoding for the Ferry transport
//!
//! One file travels as a frame pair: a name sub-frame (u16 big-endian
//! length prefix) followed by a data sub-frame (u32 big-endian length
//! prefix). There is no magic, no version field, and no trailer; the
//! stream is a plain repetition of frame pairs until the sender closes
//! the connection at a pair boundary.

use anyhow::{bail, Result};

/// Default server port when none is given
pub const DEFAULT_PORT: u16 = 5000;

// Length-prefix field widths
pub const NAME_LEN_BYTES: usize = 2;
pub const DATA_LEN_BYTES: usize = 4;

/// Longest representable filename (u16 length prefix)
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Largest representable payload (u32 length prefix)
pub const MAX_DATA_LEN: u64 = u32::MAX as u64;

/// Encode a filename sub-frame: 2-byte big-endian length, then the bytes.
///
/// Fails before emitting anything if the name cannot be represented, so a
/// malformed length field never reaches the wire.
pub fn encode_name(name: &[u8]) -> Result<Vec<u8>> {
    if name.len() > MAX_NAME_LEN {
        bail!("file name too long for wire format: {} bytes (max {})", name.len(), MAX_NAME_LEN);
    }
    let mut buf = Vec::with_capacity(NAME_LEN_BYTES + name.len());
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name);
    Ok(buf)
}

/// Encode a data sub-frame: 4-byte big-endian length, then the payload.
pub fn encode_data(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() as u64 > MAX_DATA_LEN {
        bail!("payload too large for wire format: {} bytes (max {})", payload.len(), MAX_DATA_LEN);
    }
    let mut buf = Vec::with_capacity(DATA_LEN_BYTES + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}
