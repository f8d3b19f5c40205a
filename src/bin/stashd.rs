use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use stash::cli::DaemonOpts;
use stash::logger::{Logger, NoopLogger, TextLogger};
use stash::net::Server;

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let opts = DaemonOpts::parse();

    // The root is created on first start so a fresh daemon serves an empty
    // store instead of refusing to run.
    std::fs::create_dir_all(&opts.root)
        .with_context(|| format!("Failed to create root directory: {}", opts.root.display()))?;
    if !opts.root.is_dir() {
        anyhow::bail!("Error: Root path is not a directory: {}", opts.root.display());
    }

    // Canonicalize the path for better logging
    let canonical_root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("Failed to canonicalize root path: {}", opts.root.display()))?;

    println!("Starting stash daemon:");
    println!("  Root: {}", canonical_root.display());
    println!("  Bind: {}", opts.bind);
    if let Some(ref p) = opts.log_file {
        println!("  Log:  {}", p.display());
    }

    let logger: Arc<dyn Logger> = if let Some(ref p) = opts.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    let server = Server::bind(&opts.bind, &canonical_root)?;
    server.run(logger)
}
