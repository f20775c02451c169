use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn connected(&self, _peer: &SocketAddr) {}
    fn stored(&self, _name: &str, _dest: &Path, _bytes: u64) {}
    fn disconnected(&self, _peer: &SocketAddr) {}
    fn sent(&self, _src: &Path, _bytes: u64) {}
    fn error(&self, _context: &str, _msg: &str) {}
    fn shutdown(&self, _addr: &SocketAddr) {}
    fn done(&self, _files: u64, _bytes: u64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn connected(&self, peer: &SocketAddr) {
        self.line(&format!("CONNECT peer={}", peer));
    }
    fn stored(&self, name: &str, dest: &Path, bytes: u64) {
        self.line(&format!(
            "STORE name={} dest={} bytes={}",
            name,
            dest.display(),
            bytes
        ));
    }
    fn disconnected(&self, peer: &SocketAddr) {
        self.line(&format!("DISCONNECT peer={}", peer));
    }
    fn sent(&self, src: &Path, bytes: u64) {
        self.line(&format!("SEND src={} bytes={}", src.display(), bytes));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} msg={}", context, msg));
    }
    fn shutdown(&self, addr: &SocketAddr) {
        self.line(&format!("SHUTDOWN addr={}", addr));
    }
    fn done(&self, files: u64, bytes: u64) {
        self.line(&format!("DONE files={files} bytes={bytes}"));
    }
}
