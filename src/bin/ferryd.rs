//! Ferryd - receive files over plain TCP into per-peer directories
//!
//! One connection at a time, run to completion before the next accept.
//! Ctrl-C requests a graceful stop: the in-flight connection finishes,
//! then the listener closes. A second Ctrl-C exits immediately.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ferry::cli::DaemonOpts;
use ferry::config;
use ferry::logger::{Logger, NoopLogger, TextLogger};
use ferry::net::{self, FailMode};

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    // Resolve configuration before any socket is opened
    let write_root = match opts.dir.as_deref() {
        Some(raw) => config::normalize_write_dir(raw, &config::home_dir()?)?,
        None => config::default_write_dir()?,
    };
    println!("Write directory set to: '{}'", write_root.display());

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            // Second Ctrl-C: stop waiting on the in-flight connection
            std::process::exit(130);
        }
        eprintln!("\nShutting down after the current connection...");
    })
    .expect("Error setting Ctrl-C handler");

    // Choose logger once; zero overhead with NoopLogger
    let logger: Arc<dyn Logger> = if let Some(ref p) = opts.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    let bind = SocketAddr::new(opts.bind, opts.port);
    let fail_mode = if opts.keep_going {
        FailMode::KeepGoing
    } else {
        FailMode::Abort
    };

    net::serve(bind, &write_root, fail_mode, &shutdown, logger.as_ref())
}
