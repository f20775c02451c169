//! Blocking byte pump over a connected stream
//!
//! All transfers loop over partial reads/writes. The only place a peer may
//! legally close the connection is before the first byte of a frame pair,
//! i.e. at the 2-byte name-length field; `read_frame_start` is the single
//! entry point that reports that case as `FrameStart::Closed` instead of an
//! error. Everywhere else a zero-byte read means the stream can no longer
//! be resynchronized and the transfer is aborted.

use anyhow::{bail, Context, Result};
use std::io::{Read, Write};

use crate::protocol::{DATA_LEN_BYTES, NAME_LEN_BYTES};

/// Result of reading the field that opens a frame pair.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameStart {
    /// Name length received; a frame pair follows.
    NameLen(u16),
    /// Peer closed cleanly at the frame boundary; the session is over.
    Closed,
}

/// Write the entire buffer, looping over partial writes.
pub fn send_all<W: Write>(stream: &mut W, buf: &[u8]) -> Result<()> {
    stream.write_all(buf).context("send failed")?;
    Ok(())
}

/// Read exactly `n` bytes, looping over partial reads.
///
/// A zero-byte read here is always an unexpected disconnect.
pub fn recv_exact<R: Read>(stream: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let got = stream.read(&mut buf[filled..]).context("recv failed")?;
        if got == 0 {
            bail!("peer disconnected mid-frame ({}/{} bytes)", filled, n);
        }
        filled += got;
    }
    Ok(buf)
}

/// Read the 2-byte name-length field that starts a frame pair.
///
/// A zero-byte return on the very first read is the normal end-of-session
/// signal. Once any byte of the field has arrived, EOF is fatal.
pub fn read_frame_start<R: Read>(stream: &mut R) -> Result<FrameStart> {
    let mut buf = [0u8; NAME_LEN_BYTES];
    let mut filled = 0;
    while filled < NAME_LEN_BYTES {
        let got = stream.read(&mut buf[filled..]).context("recv failed")?;
        if got == 0 {
            if filled == 0 {
                return Ok(FrameStart::Closed);
            }
            bail!("peer disconnected inside name-length field");
        }
        filled += got;
    }
    Ok(FrameStart::NameLen(u16::from_be_bytes(buf)))
}

/// Read the 4-byte data-length field.
pub fn read_data_len<R: Read>(stream: &mut R) -> Result<u32> {
    let buf = recv_exact(stream, DATA_LEN_BYTES)?;
    Ok(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}
