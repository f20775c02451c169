use anyhow::Result;
use indicatif::ProgressBar;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ferry::logger::NoopLogger;
use ferry::net::{self, FailMode};

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::File::create(path)?;
    f.write_all(data)?;
    Ok(())
}

fn patterned(size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    let mut val: u8 = 0;
    for b in buf.iter_mut() {
        *b = val;
        val = val.wrapping_add(1);
    }
    buf
}

struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: thread::JoinHandle<Result<()>>,
}

impl TestServer {
    /// Bind an OS-assigned port and run the dispatcher in a thread.
    ///
    /// The readiness probe connects and immediately disconnects, which is
    /// itself a legal zero-file session.
    fn start(root: &Path, fail_mode: FailMode) -> Self {
        let port = {
            let sock = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let p = sock.local_addr().unwrap().port();
            drop(sock);
            p
        };
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let root = root.to_path_buf();
        let handle =
            thread::spawn(move || net::serve(addr, &root, fail_mode, &flag, &NoopLogger));
        for _ in 0..100u32 {
            if TcpStream::connect(addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    fn stop(self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.handle.join().expect("server thread panicked")
    }
}

/// Poll until `cond` holds; the server stores asynchronously to the client.
fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..250u32 {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn send_paths(addr: SocketAddr, paths: &[PathBuf]) -> Result<u64> {
    let mut stream = net::connect(addr.ip(), addr.port())?;
    net::send_files(&mut stream, paths, &NoopLogger, &ProgressBar::hidden())
}

#[test]
fn push_stores_files_under_peer_dir() -> Result<()> {
    let srv_root = tempfile::tempdir()?;
    let cli_src = tempfile::tempdir()?;

    let body = patterned(256 * 1024);
    write_file(&cli_src.path().join("a.txt"), b"alpha contents")?;
    write_file(&cli_src.path().join("b.bin"), &body)?;
    write_file(&cli_src.path().join("empty.dat"), b"")?;

    let server = TestServer::start(srv_root.path(), FailMode::Abort);
    let total = send_paths(
        server.addr,
        &[
            cli_src.path().join("a.txt"),
            cli_src.path().join("b.bin"),
            cli_src.path().join("empty.dat"),
        ],
    )?;
    assert_eq!(total, 14 + body.len() as u64);

    let session = srv_root.path().join("127.0.0.1");
    assert!(wait_until(|| session.join("empty.dat").exists()));
    assert_eq!(std::fs::read(session.join("a.txt"))?, b"alpha contents");
    assert_eq!(std::fs::read(session.join("b.bin"))?, body);
    assert_eq!(std::fs::metadata(session.join("empty.dat"))?.len(), 0);

    server.stop()
}

#[test]
fn repeats_are_versioned_in_receipt_order() -> Result<()> {
    let srv_root = tempfile::tempdir()?;
    let cli_src = tempfile::tempdir()?;

    // Three files with the same basename; versioning makes receipt order
    // observable on disk.
    write_file(&cli_src.path().join("one/dup.txt"), b"first")?;
    write_file(&cli_src.path().join("two/dup.txt"), b"second")?;
    write_file(&cli_src.path().join("three/dup.txt"), b"third")?;

    let server = TestServer::start(srv_root.path(), FailMode::Abort);
    send_paths(
        server.addr,
        &[
            cli_src.path().join("one/dup.txt"),
            cli_src.path().join("two/dup.txt"),
            cli_src.path().join("three/dup.txt"),
        ],
    )?;

    let session = srv_root.path().join("127.0.0.1");
    assert!(wait_until(|| session.join("dup-v3.txt").exists()));
    assert_eq!(std::fs::read(session.join("dup.txt"))?, b"first");
    assert_eq!(std::fs::read(session.join("dup-v2.txt"))?, b"second");
    assert_eq!(std::fs::read(session.join("dup-v3.txt"))?, b"third");

    server.stop()
}

#[test]
fn versioning_survives_reconnects() -> Result<()> {
    let srv_root = tempfile::tempdir()?;
    let cli_src = tempfile::tempdir()?;

    write_file(&cli_src.path().join("report.txt"), b"monday")?;

    let server = TestServer::start(srv_root.path(), FailMode::Abort);
    send_paths(server.addr, &[cli_src.path().join("report.txt")])?;

    let session = srv_root.path().join("127.0.0.1");
    assert!(wait_until(|| session.join("report.txt").exists()));

    write_file(&cli_src.path().join("report.txt"), b"tuesday")?;
    send_paths(server.addr, &[cli_src.path().join("report.txt")])?;

    assert!(wait_until(|| session.join("report-v2.txt").exists()));
    assert_eq!(std::fs::read(session.join("report.txt"))?, b"monday");
    assert_eq!(std::fs::read(session.join("report-v2.txt"))?, b"tuesday");

    server.stop()
}

#[test]
fn clean_disconnects_are_not_errors() -> Result<()> {
    let srv_root = tempfile::tempdir()?;
    let cli_src = tempfile::tempdir()?;

    let server = TestServer::start(srv_root.path(), FailMode::Abort);

    // Sessions that close at the frame boundary without sending anything
    for _ in 0..3 {
        let stream = TcpStream::connect(server.addr)?;
        drop(stream);
    }

    // The dispatcher must still be serving afterwards
    write_file(&cli_src.path().join("alive.txt"), b"still here")?;
    send_paths(server.addr, &[cli_src.path().join("alive.txt")])?;
    let stored = srv_root.path().join("127.0.0.1/alive.txt");
    assert!(wait_until(|| stored.exists()));

    server.stop()
}

#[test]
fn keep_going_survives_a_malformed_stream() -> Result<()> {
    let srv_root = tempfile::tempdir()?;
    let cli_src = tempfile::tempdir()?;

    let server = TestServer::start(srv_root.path(), FailMode::KeepGoing);

    // Declare a 10-byte name but disconnect after 3 bytes: mid-frame EOF
    {
        let mut stream = TcpStream::connect(server.addr)?;
        stream.write_all(&10u16.to_be_bytes())?;
        stream.write_all(b"abc")?;
    }

    // With --keep-going the daemon drops that connection and keeps serving
    write_file(&cli_src.path().join("after.txt"), b"recovered")?;
    send_paths(server.addr, &[cli_src.path().join("after.txt")])?;
    let stored = srv_root.path().join("127.0.0.1/after.txt");
    assert!(wait_until(|| stored.exists()));

    server.stop()
}
