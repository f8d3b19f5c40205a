//! Shared CLI fragments for the stash client and the stashd daemon

use clap::Parser;
use std::path::PathBuf;

use crate::protocol::DEFAULT_PORT;

/// Daemon options for stashd
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "stashd - file store daemon for the stash protocol")]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:9999")]
    pub bind: String,

    /// Root directory to serve (created if absent)
    #[arg(long, default_value = "server_files")]
    pub root: PathBuf,

    /// Append timestamped event log entries to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

/// Connection options for the interactive client
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "stash - interactive client for a stashd file store")]
pub struct ClientOpts {
    /// Server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Disable the transfer progress spinner
    #[arg(short, long)]
    pub quiet: bool,
}
