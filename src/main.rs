//! stash - interactive client for a stashd file store
//!
//! Reads command lines from stdin, ships them to the server, and prints the
//! responses. `get` switches into streaming-receive mode until the server's
//! END terminator (or an ERROR) comes back.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use stash::cli::ClientOpts;
use stash::client;
use stash::log::TransferLog;
use stash::progress::TransferProgress;

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let opts = ClientOpts::parse();
    let mut stream = client::connect(&opts.host, opts.port)?;
    println!("Connected to {}:{}", opts.host, opts.port);
    println!("Commands: ls [path] | rm <path> | cp <src>... <dest> | get <path> [dir] | exit");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        print!("stash> ");
        io::stdout().flush()?;
        line.clear();
        if input.read_line(&mut line).context("read stdin")? == 0 {
            break; // EOF
        }
        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }
        if cmd == "exit" || cmd == "quit" {
            break;
        }

        client::send_command(&mut stream, cmd)?;

        let mut tokens = cmd.split_whitespace();
        if tokens.next() == Some("get") {
            let dest = match tokens.nth(1) {
                Some(dir) => PathBuf::from(dir),
                None => prompt_dest(&mut input)?,
            };
            run_transfer(&mut stream, &dest, opts.quiet);
        } else {
            match client::read_response(&mut stream) {
                Ok(resp) => print!("{resp}"),
                Err(e) => {
                    eprintln!("{e:#}");
                    break;
                }
            }
        }
    }
    Ok(())
}

// The save directory is the optional second operand; ask for it otherwise.
fn prompt_dest(input: &mut impl BufRead) -> Result<PathBuf> {
    print!("Save to directory: ");
    io::stdout().flush()?;
    let mut dir = String::new();
    input.read_line(&mut dir).context("read stdin")?;
    let dir = dir.trim();
    Ok(PathBuf::from(if dir.is_empty() { "." } else { dir }))
}

// A failed or aborted transfer returns to the prompt; the connection stays up.
fn run_transfer(stream: &mut std::net::TcpStream, dest: &std::path::Path, quiet: bool) {
    let log = TransferLog::new(dest);
    let progress = (!quiet).then(TransferProgress::new);
    match client::receive_transfer(stream, dest, Some(&log), progress.as_ref()) {
        Ok(summary) => match progress {
            Some(p) => p.finish(summary.aborted.as_deref()),
            None => match summary.aborted {
                Some(msg) => println!("{msg}"),
                None => println!(
                    "Transfer complete: {} files, {} bytes",
                    summary.files, summary.bytes
                ),
            },
        },
        Err(e) => eprintln!("transfer failed: {e:#}"),
    }
}
