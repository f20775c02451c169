//! Per-peer storage with collision-safe versioned naming
//!
//! Every connection gets a session directory named after the peer's IP
//! address under the configured write root. Within a session directory a
//! stored file is never overwritten: a colliding name grows a `-v{N}`
//! suffix in front of its final extension, starting at 2.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Mode bits for created directories and files (rwxrwxr-x), subject to the
/// process umask. Ignored off Unix.
#[cfg(unix)]
const STORE_MODE: u32 = 0o775;

/// Session directory for a peer: `<write_root>/<peer_ip>`.
pub fn session_dir(write_root: &Path, peer: IpAddr) -> PathBuf {
    write_root.join(peer.to_string())
}

/// Resolve the peer's session directory, creating missing components.
///
/// Idempotent: an existing directory is reused, never recreated.
pub fn ensure_session_dir(write_root: &Path, peer: IpAddr) -> Result<PathBuf> {
    let dir = session_dir(write_root, peer);
    create_dir_tree(&dir).with_context(|| format!("create session dir {}", dir.display()))?;
    Ok(dir)
}

fn create_dir_tree(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(STORE_MODE);
    }
    builder.create(dir)
}

/// Write `data` under `session_dir` as `name`, versioning on collision.
///
/// The unsuffixed name is tried first; each taken candidate bumps the
/// version (`report.txt`, `report-v2.txt`, `report-v3.txt`, ...). Creation
/// uses `create_new`, so the existence test and the claim of the path are
/// one atomic step. Returns the path actually written.
pub fn store(session_dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let mut version = 1u32;
    loop {
        let candidate = if version == 1 {
            name.to_string()
        } else {
            versioned_name(name, version)
        };
        let path = session_dir.join(candidate);
        match open_new(&path) {
            Ok(mut file) => {
                file.write_all(data)
                    .with_context(|| format!("write {}", path.display()))?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => version += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("create {}", path.display()));
            }
        }
    }
}

/// Insert `-v{version}` before the final `.`, or append when there is none.
fn versioned_name(name: &str, version: u32) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}-v{}{}", &name[..dot], version, &name[dot..]),
        None => format!("{}-v{}", name, version),
    }
}

fn open_new(path: &Path) -> std::io::Result<fs::File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(STORE_MODE);
    }
    opts.open(path)
}
