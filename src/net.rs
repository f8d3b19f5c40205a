//! Server side: accept loop, per-connection session handling, and the
//! command dispatcher that maps ls/rm/cp/get onto the store root.
//!
//! Sessions are strictly sequential and blocking. Workers share nothing in
//! memory beyond an aggregate stats counter; the filesystem is the only
//! shared state, and cross-session races on a path surface as I/O errors at
//! the point of access.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::frame::{parse_command, Command, FrameBuffer};
use crate::logger::Logger;
use crate::protocol::{self, IO_CHUNK};

/// Aggregate counters across all sessions since startup
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerStats {
    pub sessions: u64,
    pub commands: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Default)]
struct SessionStats {
    commands: u64,
    bytes_sent: u64,
}

/// Failures a command reports to the client. Each renders to its exact
/// one-line wire message; the session continues after any of these.
#[derive(Debug)]
pub enum CmdError {
    MissingPath,
    MissingSourceDest,
    NotFound,
    SourceNotFound(String),
    CopyDirectory,
    Invalid,
    Failed(io::Error),
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdError::MissingPath => write!(f, "Missing path"),
            CmdError::MissingSourceDest => write!(f, "Missing source/destination"),
            CmdError::NotFound => write!(f, "Path/file not found"),
            CmdError::SourceNotFound(s) => write!(f, "Source {s} not found"),
            CmdError::CopyDirectory => write!(f, "Can't copy directories"),
            CmdError::Invalid => write!(f, "Invalid command"),
            CmdError::Failed(e) => write!(f, "Operation failed: {e}"),
        }
    }
}

impl From<io::Error> for CmdError {
    fn from(e: io::Error) -> Self {
        CmdError::Failed(e)
    }
}

/// Owns the listening endpoint; all other state is per-session
pub struct Server {
    listener: TcpListener,
    root: PathBuf,
    stats: Arc<Mutex<ServerStats>>,
}

impl Server {
    pub fn bind(addr: &str, root: &Path) -> Result<Self> {
        let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
        Ok(Self {
            listener,
            root: root.to_path_buf(),
            stats: Arc::new(Mutex::new(ServerStats::default())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> ServerStats {
        *self.stats.lock()
    }

    /// Accept loop: one thread per connection. A session failure closes
    /// only that connection; accepting continues.
    pub fn run(&self, logger: Arc<dyn Logger>) -> Result<()> {
        eprintln!(
            "stashd listening on {} root={}",
            self.listener.local_addr()?,
            self.root.display()
        );
        for conn in self.listener.incoming() {
            match conn {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    eprintln!("conn from {peer}");
                    logger.connect(&peer);
                    let root = self.root.clone();
                    let stats = Arc::clone(&self.stats);
                    let logger = Arc::clone(&logger);
                    thread::spawn(move || {
                        let mut stream = stream;
                        let mut session = SessionStats::default();
                        if let Err(e) =
                            handle_conn(&mut stream, &root, &peer, &mut session, logger.as_ref())
                        {
                            eprintln!("session {peer} error: {e:#}");
                            logger.error(&peer, &format!("{e:#}"));
                        }
                        let totals = {
                            let mut s = stats.lock();
                            s.sessions += 1;
                            s.commands += session.commands;
                            s.bytes_sent += session.bytes_sent;
                            *s
                        };
                        eprintln!(
                            "conn {peer} closed after {} commands ({} bytes sent); totals: {} sessions, {} commands",
                            session.commands, session.bytes_sent, totals.sessions, totals.commands
                        );
                        logger.disconnect(&peer, session.commands, session.bytes_sent);
                    });
                }
                Err(e) => {
                    eprintln!("accept error: {e}");
                }
            }
        }
        Ok(())
    }
}

/// Session loop: Awaiting Command until the peer disconnects or the
/// connection becomes unusable.
fn handle_conn(
    stream: &mut TcpStream,
    root: &Path,
    peer: &str,
    session: &mut SessionStats,
    logger: &dyn Logger,
) -> Result<()> {
    let _ = stream.set_nodelay(true);
    let mut buf = FrameBuffer::new();
    let mut chunk = vec![0u8; IO_CHUNK];
    loop {
        // Drain complete lines first; one read may carry several commands.
        while let Some(line) = buf.take_line().context("decode command line")? {
            let Some(cmd) = parse_command(&line) else {
                continue; // blank line, keep reading
            };
            logger.command(peer, &line);
            session.commands += 1;
            session.bytes_sent += dispatch(&cmd, root, stream)?;
        }
        let n = stream.read(&mut chunk).context("read command")?;
        if n == 0 {
            return Ok(()); // orderly disconnect
        }
        buf.push(&chunk[..n]);
    }
}

/// Map one command onto the store and write its framed response(s).
/// Returns the number of response bytes written. An `Err` here means the
/// connection itself is unusable and must be dropped.
pub fn dispatch<W: Write>(cmd: &Command, root: &Path, out: &mut W) -> Result<u64> {
    match cmd.verb.as_str() {
        "ls" => respond_text(out, ls(root, &cmd.args)),
        "rm" => respond_text(out, rm(root, &cmd.args)),
        "cp" => respond_text(out, cp(root, &cmd.args)),
        "get" => get(root, &cmd.args, out),
        _ => respond_text(out, Err(CmdError::Invalid)),
    }
}

// Plain responses go out in a single write so concurrent sessions can never
// interleave inside one frame.
fn respond_text<W: Write>(out: &mut W, result: Result<String, CmdError>) -> Result<u64> {
    let text = match result {
        Ok(s) => s,
        Err(e) => protocol::error_line(e),
    };
    out.write_all(text.as_bytes()).context("write response")?;
    Ok(text.len() as u64)
}

// Paths are joined directly under the root; the store is a flat trust
// boundary and `..` escape is an accepted risk of this protocol.
fn ls(root: &Path, args: &[String]) -> Result<String, CmdError> {
    let path = args.first().map(String::as_str).unwrap_or(".");
    let full = root.join(path);
    if !full.exists() {
        return Err(CmdError::NotFound);
    }
    if full.is_file() {
        let size = fs::metadata(&full)?.len();
        return Ok(format!("FILE: {path} Size: {size} bytes\n"));
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&full)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(format!("{}\n", names.join("\n")))
}

fn rm(root: &Path, args: &[String]) -> Result<String, CmdError> {
    let path = args.first().ok_or(CmdError::MissingPath)?;
    let full = root.join(path);
    if !full.exists() {
        return Err(CmdError::NotFound);
    }
    if full.is_file() {
        fs::remove_file(&full)?;
        return Ok("OK: File removed\n".to_string());
    }
    // Directories lose their direct file children only; subdirectories are
    // left untouched and the directory itself stays.
    let mut count = 0u64;
    for entry in fs::read_dir(&full)? {
        let p = entry?.path();
        if p.is_file() {
            fs::remove_file(&p)?;
            count += 1;
        }
    }
    Ok(format!("OK: Removed {count} files\n"))
}

fn cp(root: &Path, args: &[String]) -> Result<String, CmdError> {
    let Some((dest, sources)) = args.split_last().filter(|_| args.len() >= 2) else {
        return Err(CmdError::MissingSourceDest);
    };
    let dest_dir = root.join(dest);
    fs::create_dir_all(&dest_dir)?;
    // Stops at the first bad source; files copied before it stay put.
    for src in sources {
        let src_path = root.join(src);
        if !src_path.exists() {
            return Err(CmdError::SourceNotFound(src.clone()));
        }
        if !src_path.is_file() {
            return Err(CmdError::CopyDirectory);
        }
        let name = src_path
            .file_name()
            .ok_or_else(|| CmdError::SourceNotFound(src.clone()))?;
        fs::copy(&src_path, dest_dir.join(name))?;
    }
    Ok("OK: Files copied\n".to_string())
}

// get failures split by whether any payload bytes went out: setup faults can
// still be reported in-band, a fault mid-payload breaks the framing contract
// and leaves dropping the connection as the only option.
enum SendError {
    Setup(io::Error),
    Stream(io::Error),
}

fn get<W: Write>(root: &Path, args: &[String], out: &mut W) -> Result<u64> {
    // A missing argument is the one get failure reported without END.
    let Some(path) = args.first() else {
        return respond_text(out, Err(CmdError::MissingPath));
    };
    let full = root.join(path);
    let mut sent = 0u64;

    if !full.exists() {
        let line = protocol::error_line(CmdError::NotFound);
        out.write_all(line.as_bytes()).context("write response")?;
        out.write_all(protocol::END_FRAME).context("write terminator")?;
        return Ok((line.len() + protocol::END_FRAME.len()) as u64);
    }

    let outcome = if full.is_file() {
        send_file(out, &full, &mut sent)
    } else {
        send_dir(out, &full, &mut sent)
    };

    match outcome {
        Err(SendError::Stream(e)) => {
            return Err(e).context("stream file payload");
        }
        Err(SendError::Setup(e)) => {
            let line = protocol::error_line(CmdError::Failed(e));
            out.write_all(line.as_bytes()).context("write response")?;
            sent += line.len() as u64;
        }
        Ok(()) => {}
    }
    out.write_all(protocol::END_FRAME).context("write terminator")?;
    Ok(sent + protocol::END_FRAME.len() as u64)
}

// One File Frame per direct file child; subdirectories are skipped.
fn send_dir<W: Write>(out: &mut W, dir: &Path, sent: &mut u64) -> Result<(), SendError> {
    let entries = fs::read_dir(dir).map_err(SendError::Setup)?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let p = entry.map_err(SendError::Setup)?.path();
        if p.is_file() {
            paths.push(p);
        }
    }
    paths.sort();
    for p in paths {
        send_file(out, &p, sent)?;
    }
    Ok(())
}

fn send_file<W: Write>(out: &mut W, path: &Path, sent: &mut u64) -> Result<(), SendError> {
    let mut file = File::open(path).map_err(SendError::Setup)?;
    let size = file.metadata().map_err(SendError::Setup)?.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let header = protocol::file_header(&name, size);
    out.write_all(header.as_bytes()).map_err(SendError::Stream)?;
    *sent += header.len() as u64;

    // The header's declared size is the contract: exactly that many bytes
    // follow, whatever the file does underneath us.
    let mut remaining = size;
    let mut buf = vec![0u8; IO_CHUNK];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want]).map_err(SendError::Stream)?;
        if n == 0 {
            return Err(SendError::Stream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{name} truncated mid-transfer"),
            )));
        }
        out.write_all(&buf[..n]).map_err(SendError::Stream)?;
        remaining -= n as u64;
        *sent += n as u64;
    }
    Ok(())
}
