use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn connect(&self, _peer: &str) {}
    fn command(&self, _peer: &str, _line: &str) {}
    fn disconnect(&self, _peer: &str, _commands: u64, _bytes_sent: u64) {}
    fn error(&self, _peer: &str, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn connect(&self, peer: &str) {
        self.line(&format!("CONNECT peer={peer}"));
    }
    fn command(&self, peer: &str, line: &str) {
        self.line(&format!("COMMAND peer={peer} line={line}"));
    }
    fn disconnect(&self, peer: &str, commands: u64, bytes_sent: u64) {
        self.line(&format!(
            "DISCONNECT peer={peer} commands={commands} bytes={bytes_sent}"
        ));
    }
    fn error(&self, peer: &str, msg: &str) {
        self.line(&format!("ERROR peer={peer} msg={msg}"));
    }
}
