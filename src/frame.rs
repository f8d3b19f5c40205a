//! Incremental framing for the command channel
//!
//! A `FrameBuffer` owns the bytes accumulated from successive transport
//! reads and hands back complete frames one at a time. Framing never touches
//! the socket, so it behaves identically however the reads were chunked.

use crate::protocol::{END_LINE, ERROR_PREFIX, FILE_HEADER, MAX_LINE_LEN};
use std::fmt;

/// One decoded request line: verb plus whitespace-separated arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub args: Vec<String>,
}

/// Split a request line into verb + arguments. Returns `None` for a line
/// that is empty after trimming; the caller re-reads rather than erroring.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let verb = parts.next()?;
    Some(Command {
        verb,
        args: parts.collect(),
    })
}

/// One frame of a `get` response stream
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// `FILE <name> <size>` header plus exactly `size` payload bytes
    File { name: String, data: Vec<u8> },
    /// `ERROR: ...` line; aborts the transfer it appears in
    Error(String),
    /// `END` terminator
    End,
}

#[derive(Debug)]
pub enum FrameError {
    /// Buffered bytes exceeded `MAX_LINE_LEN` without a newline
    LineTooLong(usize),
    /// Header line was not valid UTF-8
    BadUtf8,
    /// Unrecognized or malformed header line
    Protocol(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::LineTooLong(n) => {
                write!(f, "no line delimiter within {n} bytes (max {MAX_LINE_LEN})")
            }
            FrameError::BadUtf8 => write!(f, "header line is not valid UTF-8"),
            FrameError::Protocol(line) => write!(f, "protocol violation: {line:?}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Growable receive buffer with try-extract semantics: `Ok(None)` always
/// means "feed me more bytes", and nothing is consumed until a whole frame
/// is available.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the result of a transport read
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Extract the next newline-terminated line as trimmed text
    pub fn take_line(&mut self) -> Result<Option<String>, FrameError> {
        match self.peek_line()? {
            Some((line, consumed)) => {
                self.buf.drain(..consumed);
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    // Locate the next line without consuming it. Yields the trimmed text and
    // the byte count it occupies including the newline.
    fn peek_line(&self) -> Result<Option<(String, usize)>, FrameError> {
        let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
            if self.buf.len() > MAX_LINE_LEN {
                return Err(FrameError::LineTooLong(self.buf.len()));
            }
            return Ok(None);
        };
        if pos > MAX_LINE_LEN {
            return Err(FrameError::LineTooLong(pos));
        }
        let line = std::str::from_utf8(&self.buf[..pos]).map_err(|_| FrameError::BadUtf8)?;
        Ok(Some((line.trim().to_string(), pos + 1)))
    }

    /// Try to extract the next response frame. A `FILE` header is not
    /// consumed until its full payload is buffered, so a caller can retry
    /// the same call after the next read.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some((header, header_len)) = self.peek_line()? else {
            return Ok(None);
        };
        if header == END_LINE {
            self.buf.drain(..header_len);
            return Ok(Some(Frame::End));
        }
        if header.starts_with(ERROR_PREFIX) {
            self.buf.drain(..header_len);
            return Ok(Some(Frame::Error(header)));
        }
        if let Some(rest) = header.strip_prefix(FILE_HEADER) {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(FrameError::Protocol(header));
            }
            let size: usize = fields[1]
                .parse()
                .map_err(|_| FrameError::Protocol(header.clone()))?;
            if self.buf.len() < header_len + size {
                return Ok(None);
            }
            let name = fields[0].to_string();
            let data = self.buf[header_len..header_len + size].to_vec();
            self.buf.drain(..header_len + size);
            return Ok(Some(Frame::File { name, data }));
        }
        Err(FrameError::Protocol(header))
    }
}
