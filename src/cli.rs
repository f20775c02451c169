//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// Common daemon options used by ferryd
#[derive(Clone, Debug, Parser)]
#[command(
    author,
    version,
    about = "Ferryd - receive files over plain TCP into per-peer directories"
)]
pub struct DaemonOpts {
    /// Bind address
    #[arg(short = 's', long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Listen port
    #[arg(short, long, default_value_t = crate::protocol::DEFAULT_PORT)]
    pub port: u16,

    /// Write directory root (default ~/ferry/downloads; created if missing)
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Drop a failed connection and keep serving instead of exiting
    #[arg(long)]
    pub keep_going: bool,

    /// Write timestamped log entries to file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}
