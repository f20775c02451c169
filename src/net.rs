use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::logger::Logger;
use crate::protocol::{encode_data, encode_name};
use crate::store;
use crate::wire::{self, FrameStart};

/// How often the dispatcher re-checks the shutdown token while idle
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// What happens to the daemon when one connection fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Propagate the error and let the process exit (the default)
    Abort,
    /// Log the error, drop the connection, keep accepting
    KeepGoing,
}

pub fn connect(server: IpAddr, port: u16) -> Result<TcpStream> {
    let addr = SocketAddr::new(server, port);
    let stream = TcpStream::connect(addr).with_context(|| format!("connect {}", addr))?;
    Ok(stream)
}

/// Send each file as one frame pair, sequentially.
///
/// The whole file is read into memory before transmission, so memory use
/// scales with the largest file. Returns the total payload bytes sent.
pub fn send_files(
    stream: &mut TcpStream,
    paths: &[PathBuf],
    logger: &dyn Logger,
    progress: &ProgressBar,
) -> Result<u64> {
    let mut total = 0u64;
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{}: no usable file name", path.display()))?;
        let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        wire::send_all(stream, &encode_name(name.as_bytes())?)?;
        wire::send_all(stream, &encode_data(&data)?)?;
        logger.sent(path, data.len() as u64);
        progress.println(format!("Sent to server: {}", path.display()));
        progress.inc(1);
        total += data.len() as u64;
    }
    Ok(total)
}

/// Receive frame pairs until the peer closes at a pair boundary.
///
/// Per pair: name length, name, data length, data, then a synchronous
/// store before the next read. Returns the number of files stored.
pub fn receive_session(
    stream: &mut TcpStream,
    session_dir: &Path,
    logger: &dyn Logger,
) -> Result<u64> {
    let mut stored = 0u64;
    loop {
        let name_len = match wire::read_frame_start(stream)? {
            FrameStart::Closed => break,
            FrameStart::NameLen(n) => n,
        };
        let name_bytes = wire::recv_exact(stream, name_len as usize)?;
        let name = validate_name(&name_bytes)?;
        let data_len = wire::read_data_len(stream)?;
        let data = wire::recv_exact(stream, data_len as usize)?;
        let dest = store::store(session_dir, name, &data)?;
        println!("Received: {}\nSaved to: {}\n", name, dest.display());
        logger.stored(name, &dest, data.len() as u64);
        stored += 1;
    }
    Ok(stored)
}

/// Accept only plain file names from the wire.
fn validate_name(bytes: &[u8]) -> Result<&str> {
    let name = std::str::from_utf8(bytes).context("file name is not valid UTF-8")?;
    if name.is_empty() {
        bail!("empty file name");
    }
    if name == "." || name == ".." {
        bail!("file name {:?} is a directory reference", name);
    }
    if name.contains(['/', '\\', '\0']) {
        bail!("file name {:?} contains a path separator", name);
    }
    Ok(name)
}

/// Sequential accept loop: one connection runs to completion before the
/// next is accepted. The shutdown token is observed only between
/// connections; an in-progress transfer always finishes or fails on its
/// own terms.
pub fn serve(
    bind: SocketAddr,
    write_root: &Path,
    fail_mode: FailMode,
    shutdown: &AtomicBool,
    logger: &dyn Logger,
) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("bind {}", bind))?;
    // Non-blocking accept so the shutdown token is seen without a pending
    // connection; accepted streams go back to blocking mode below.
    listener
        .set_nonblocking(true)
        .context("set listener non-blocking")?;
    eprintln!(
        "ferryd listening on {} root={}",
        bind,
        write_root.display()
    );
    while !shutdown.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("accept on {}", bind)),
        };
        stream
            .set_nonblocking(false)
            .context("set connection blocking")?;
        if let Err(e) = handle_conn(stream, peer, write_root, logger) {
            logger.error("connection", &format!("{:#}", e));
            match fail_mode {
                FailMode::Abort => return Err(e),
                FailMode::KeepGoing => {
                    eprintln!("connection error from {}: {:#}", peer, e);
                }
            }
        }
    }
    println!("\nClosed server on: {}\n", bind);
    logger.shutdown(&bind);
    Ok(())
}

fn handle_conn(
    mut stream: TcpStream,
    peer: SocketAddr,
    write_root: &Path,
    logger: &dyn Logger,
) -> Result<u64> {
    println!("\n{} connected.\n", peer);
    logger.connected(&peer);
    let session_dir = store::ensure_session_dir(write_root, peer.ip())?;
    let stored = receive_session(&mut stream, &session_dir, logger)?;
    println!("{} left.", peer);
    logger.disconnected(&peer);
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_plain_names() {
        assert_eq!(validate_name(b"report.txt").unwrap(), "report.txt");
        assert_eq!(validate_name(b"no-extension").unwrap(), "no-extension");
        assert_eq!(validate_name(b".hidden").unwrap(), ".hidden");
    }

    #[test]
    fn test_validate_name_rejects_separators() {
        assert!(validate_name(b"../etc/passwd").is_err());
        assert!(validate_name(b"dir/file").is_err());
        assert!(validate_name(b"dir\\file").is_err());
        assert!(validate_name(b"nul\0byte").is_err());
    }

    #[test]
    fn test_validate_name_rejects_degenerate_names() {
        assert!(validate_name(b"").is_err());
        assert!(validate_name(b".").is_err());
        assert!(validate_name(b"..").is_err());
        assert!(validate_name(&[0xff, 0xfe]).is_err());
    }
}
