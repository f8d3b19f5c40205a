//! Shared protocol constants for the stash text/binary wire format

/// Default TCP port for the daemon
pub const DEFAULT_PORT: u16 = 9999;

// Header vocabulary. All text frames are newline-delimited; a FILE header's
// declared size is authoritative for the raw payload bytes that follow it.
pub const FILE_HEADER: &str = "FILE";
pub const ERROR_PREFIX: &str = "ERROR";
pub const END_LINE: &str = "END";

// Maximum bytes a header/command line may occupy before a newline shows up.
// Caps buffer growth when a peer streams garbage with no delimiter.
pub const MAX_LINE_LEN: usize = 8 * 1024;

// Chunk size for socket reads and streamed file payloads
pub const IO_CHUNK: usize = 64 * 1024;

/// `END\n` terminator frame, one per `get` reply batch
pub const END_FRAME: &[u8] = b"END\n";

/// Build a `FILE <name> <size>\n` header
pub fn file_header(name: &str, size: u64) -> String {
    format!("{FILE_HEADER} {name} {size}\n")
}

/// Build an `ERROR: <msg>\n` text frame
pub fn error_line(msg: impl std::fmt::Display) -> String {
    format!("{ERROR_PREFIX}: {msg}\n")
}
