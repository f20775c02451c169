//! Ferry client - send files to a ferryd server over plain TCP
//!
//! One frame pair per file, sequentially, over a single connection. Any
//! filesystem or transport error aborts the whole run; there is no retry
//! and no partial-transfer resume.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ferry::logger::{Logger, NoopLogger, TextLogger};
use ferry::net;
use ferry::protocol::DEFAULT_PORT;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Ferry - send files to a ferryd server over plain TCP"
)]
struct Args {
    /// Server address
    #[arg(short, long)]
    server: IpAddr,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Files to send, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write timestamped log entries to file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();

    // Choose logger once; zero overhead with NoopLogger
    let logger: Arc<dyn Logger> = if let Some(ref p) = args.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    print!("Connecting {}:{}... ", args.server, args.port);
    let _ = std::io::stdout().flush();
    let mut stream = net::connect(args.server, args.port)?;
    println!("ok");

    let progress = ProgressBar::new(args.files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{bar:30.green} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let total = net::send_files(&mut stream, &args.files, logger.as_ref(), &progress)?;
    progress.finish_and_clear();

    println!(
        "Done: {} file(s), {} bytes sent to {}:{}",
        args.files.len(),
        total,
        args.server,
        args.port
    );
    logger.done(args.files.len() as u64, total);
    Ok(())
}
