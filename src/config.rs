//! Write-directory resolution for the daemon
//!
//! Operator-supplied paths are normalized before any socket is opened:
//! duplicate slashes collapse, a trailing slash is dropped, `~/` expands
//! to the home directory, and a bare relative path is rooted under home.
//! Paths starting with `.` or `/` pass through untouched.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Default write root relative to the home directory.
pub const DEFAULT_WRITE_DIR: &str = "ferry/downloads";

/// The invoking user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .context("HOME is not set; cannot resolve the write directory")
}

/// Write root used when `--dir` is absent: `~/ferry/downloads`.
pub fn default_write_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(DEFAULT_WRITE_DIR))
}

/// Normalize an operator-supplied write directory against `home`.
pub fn normalize_write_dir(raw: &str, home: &Path) -> Result<PathBuf> {
    if raw.is_empty() {
        bail!("write directory is empty");
    }
    let cleaned = collapse_slashes(raw);
    let path = if cleaned == "~" {
        home.to_path_buf()
    } else if let Some(rest) = cleaned.strip_prefix("~/") {
        home.join(rest)
    } else if cleaned.starts_with('.') || cleaned.starts_with('/') {
        PathBuf::from(cleaned)
    } else {
        home.join(cleaned)
    };
    Ok(path)
}

/// Collapse runs of `/` and drop a trailing `/` (keeping `/` itself).
fn collapse_slashes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_slash = false;
    for c in raw.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}
