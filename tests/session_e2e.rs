use anyhow::Result;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stash::client;
use stash::logger::NoopLogger;
use stash::net::Server;

fn write_file(path: &Path, size: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::File::create(path)?;
    if size == 0 {
        return Ok(());
    }
    let mut buf = vec![0u8; 1024 * 64];
    let mut remaining = size;
    let mut val: u8 = 0;
    while remaining > 0 {
        for b in buf.iter_mut() {
            *b = val;
            val = val.wrapping_add(1);
        }
        let n = remaining.min(buf.len());
        f.write_all(&buf[..n])?;
        remaining -= n;
    }
    Ok(())
}

fn start_server(root: &Path) -> Result<SocketAddr> {
    let server = Server::bind("127.0.0.1:0", root)?;
    let addr = server.local_addr()?;
    thread::spawn(move || {
        let _ = server.run(Arc::new(NoopLogger));
    });
    Ok(addr)
}

fn connect(addr: SocketAddr) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)?;
    // fail instead of hanging if a response never arrives
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    Ok(stream)
}

// Responses have no length framing, but every test knows the exact bytes it
// expects, so read exactly that many and compare.
fn expect_response(stream: &mut TcpStream, expected: &str) {
    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).expect("response");
    assert_eq!(String::from_utf8(buf).unwrap(), expected);
}

fn send(stream: &mut TcpStream, line: &str) {
    client::send_command(stream, line).expect("send");
}

#[test]
fn get_round_trips_file_bytes() -> Result<()> {
    let srv = tempfile::tempdir()?;
    let dest = tempfile::tempdir()?;
    write_file(&srv.path().join("data.bin"), 1_100_000)?; // crosses chunk size
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    send(&mut stream, "get data.bin");
    let summary = client::receive_transfer(&mut stream, dest.path(), None, None)?;

    assert_eq!(summary.files, 1);
    assert_eq!(summary.bytes, 1_100_000);
    assert_eq!(summary.aborted, None);
    assert_eq!(
        std::fs::read(dest.path().join("data.bin"))?,
        std::fs::read(srv.path().join("data.bin"))?
    );
    Ok(())
}

#[test]
fn get_missing_dir_reports_error_and_terminates() -> Result<()> {
    let srv = tempfile::tempdir()?;
    let dest = tempfile::tempdir()?;
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    send(&mut stream, "get missingdir");
    let summary = client::receive_transfer(&mut stream, dest.path(), None, None)?;

    assert_eq!(summary.files, 0);
    assert_eq!(summary.aborted.as_deref(), Some("ERROR: Path/file not found"));
    assert!(std::fs::read_dir(dest.path())?.next().is_none());
    Ok(())
}

#[test]
fn session_survives_invalid_command() -> Result<()> {
    let srv = tempfile::tempdir()?;
    write_file(&srv.path().join("a.txt"), 3)?;
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    send(&mut stream, "xyz");
    expect_response(&mut stream, "ERROR: Invalid command\n");

    // same connection keeps working
    send(&mut stream, "ls a.txt");
    expect_response(&mut stream, "FILE: a.txt Size: 3 bytes\n");
    Ok(())
}

#[test]
fn pipelined_commands_each_get_a_response() -> Result<()> {
    let srv = tempfile::tempdir()?;
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    // two commands in one segment; the session drains both lines
    stream.write_all(b"xyz\nxyz\n")?;
    expect_response(&mut stream, "ERROR: Invalid command\nERROR: Invalid command\n");
    Ok(())
}

#[test]
fn ls_empty_dir_returns_empty_listing() -> Result<()> {
    let srv = tempfile::tempdir()?;
    std::fs::create_dir(srv.path().join("fresh"))?;
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    send(&mut stream, "ls fresh");
    expect_response(&mut stream, "\n");
    Ok(())
}

#[test]
fn rm_directory_spares_subdirectories() -> Result<()> {
    let srv = tempfile::tempdir()?;
    let dir = srv.path().join("work");
    write_file(&dir.join("a"), 10)?;
    write_file(&dir.join("b"), 10)?;
    write_file(&dir.join("c"), 10)?;
    write_file(&dir.join("sub/inner"), 10)?;
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    send(&mut stream, "rm work");
    expect_response(&mut stream, "OK: Removed 3 files\n");

    assert!(dir.join("sub/inner").exists());
    assert!(!dir.join("a").exists());
    Ok(())
}

#[test]
fn cp_stops_at_missing_source_keeping_earlier_copies() -> Result<()> {
    let srv = tempfile::tempdir()?;
    write_file(&srv.path().join("a.txt"), 16)?;
    let addr = start_server(srv.path())?;

    let mut stream = connect(addr)?;
    send(&mut stream, "cp a.txt b.txt dest");
    expect_response(&mut stream, "ERROR: Source b.txt not found\n");

    assert!(srv.path().join("dest/a.txt").exists());
    assert!(!srv.path().join("dest/b.txt").exists());
    Ok(())
}

#[test]
fn concurrent_sessions_get_intact_responses() -> Result<()> {
    let srv = tempfile::tempdir()?;
    write_file(&srv.path().join("left/only.txt"), 8)?;
    write_file(&srv.path().join("right/solo.txt"), 8)?;
    let addr = start_server(srv.path())?;

    let mut workers = Vec::new();
    for (dir, expected) in [("left", "only.txt\n"), ("right", "solo.txt\n")] {
        workers.push(thread::spawn(move || -> Result<()> {
            let mut stream = connect(addr)?;
            for _ in 0..50 {
                send(&mut stream, &format!("ls {dir}"));
                expect_response(&mut stream, expected);
            }
            Ok(())
        }));
    }
    for w in workers {
        w.join().unwrap()?;
    }
    Ok(())
}
