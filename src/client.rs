//! Client side: connection plumbing and the transfer receiver for `get`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

use crate::frame::{Frame, FrameBuffer};
use crate::log::{TransferLog, TransferLogEntry};
use crate::progress::TransferProgress;
use crate::protocol::IO_CHUNK;

/// What a single `get` ended up doing
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub files: u64,
    pub bytes: u64,
    /// The ERROR line if the server aborted the transfer
    pub aborted: Option<String>,
}

pub fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let stream =
        TcpStream::connect((host, port)).with_context(|| format!("connect {host}:{port}"))?;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// Send one command line; the newline is the request delimiter.
pub fn send_command(stream: &mut TcpStream, line: &str) -> Result<()> {
    stream.write_all(line.as_bytes()).context("send command")?;
    stream.write_all(b"\n").context("send command")?;
    Ok(())
}

/// Read one plain text response. Plain responses carry no framing; the
/// server writes each one in a single piece, so one read returns it whole.
pub fn read_response(stream: &mut TcpStream) -> Result<String> {
    let mut chunk = vec![0u8; IO_CHUNK];
    let n = stream.read(&mut chunk).context("read response")?;
    if n == 0 {
        bail!("connection closed by server");
    }
    Ok(String::from_utf8_lossy(&chunk[..n]).into_owned())
}

/// Consume a `get` response stream, materializing each file frame under
/// `dest`. An ERROR frame aborts the transfer: files already fully written
/// are kept, everything after the error is discarded with the buffer.
pub fn receive_transfer<R: Read>(
    reader: &mut R,
    dest: &Path,
    log: Option<&TransferLog>,
    progress: Option<&TransferProgress>,
) -> Result<TransferSummary> {
    let mut buf = FrameBuffer::new();
    let mut chunk = vec![0u8; IO_CHUNK];
    let mut summary = TransferSummary::default();
    loop {
        while let Some(frame) = buf.next_frame().context("decode transfer stream")? {
            match frame {
                Frame::File { name, data } => {
                    fs::create_dir_all(dest)
                        .with_context(|| format!("create {}", dest.display()))?;
                    let target = dest.join(&name);
                    fs::write(&target, &data)
                        .with_context(|| format!("write {}", target.display()))?;
                    summary.files += 1;
                    summary.bytes += data.len() as u64;
                    if let Some(p) = progress {
                        p.file_done(&name, data.len() as u64);
                    }
                    if let Some(l) = log {
                        l.add_entry(TransferLogEntry::completed(&name, data.len() as u64))?;
                    }
                }
                Frame::Error(msg) => {
                    if let Some(l) = log {
                        l.add_entry(TransferLogEntry::aborted(&msg))?;
                    }
                    summary.aborted = Some(msg);
                    return Ok(summary);
                }
                Frame::End => return Ok(summary),
            }
        }
        let n = reader.read(&mut chunk).context("read transfer stream")?;
        if n == 0 {
            bail!("connection closed mid-transfer");
        }
        buf.push(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn receives_files_until_end() {
        let dest = TempDir::new().unwrap();
        let mut stream: &[u8] = b"FILE a.txt 5\nalphaFILE b.txt 4\nbetaEND\n";

        let summary = receive_transfer(&mut stream, dest.path(), None, None).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.bytes, 9);
        assert_eq!(summary.aborted, None);
        assert_eq!(fs::read(dest.path().join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.path().join("b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn error_aborts_but_keeps_completed_files() {
        let dest = TempDir::new().unwrap();
        let mut stream: &[u8] = b"FILE a.txt 5\nalphaERROR: Operation failed: gone\nEND\n";

        let summary = receive_transfer(&mut stream, dest.path(), None, None).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(
            summary.aborted.as_deref(),
            Some("ERROR: Operation failed: gone")
        );
        assert!(dest.path().join("a.txt").exists());
    }

    #[test]
    fn immediate_error_writes_nothing() {
        let dest = TempDir::new().unwrap();
        let mut stream: &[u8] = b"ERROR: Path/file not found\nEND\n";

        let summary = receive_transfer(&mut stream, dest.path(), None, None).unwrap();
        assert_eq!(summary.files, 0);
        assert!(summary.aborted.is_some());
        // dest is only created when a file frame lands
        assert!(fs::read_dir(dest.path()).unwrap().next().is_none());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let dest = TempDir::new().unwrap();
        let mut stream: &[u8] = b"FILE a.txt 100\nonly a few bytes";

        let err = receive_transfer(&mut stream, dest.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("closed mid-transfer"));
        assert!(!dest.path().join("a.txt").exists());
    }

    #[test]
    fn transfer_log_records_outcomes() {
        let dest = TempDir::new().unwrap();
        let log = TransferLog::new(dest.path());
        let mut stream: &[u8] = b"FILE a.txt 2\nokERROR: boom\nEND\n";

        receive_transfer(&mut stream, dest.path(), Some(&log), None).unwrap();
        let entries = log.read_log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file.as_deref(), Some("a.txt"));
        assert_eq!(entries[1].error.as_deref(), Some("ERROR: boom"));
    }
}
