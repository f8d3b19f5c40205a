use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Aborted,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub file: Option<String>,
    pub bytes: u64,
    pub status: TransferStatus,
    pub error: Option<String>,
}

impl TransferLogEntry {
    pub fn completed(file: &str, bytes: u64) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            file: Some(file.to_string()),
            bytes,
            status: TransferStatus::Completed,
            error: None,
        }
    }

    pub fn aborted(msg: &str) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            file: None,
            bytes: 0,
            status: TransferStatus::Aborted,
            error: Some(msg.to_string()),
        }
    }
}

/// JSONL record of files a `get` materialized, kept next to them in the
/// destination directory
pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new(destination_root: &Path) -> Self {
        let log_file_path = destination_root.join(".stash_transfers.jsonl");
        TransferLog { log_file_path }
    }

    pub fn add_entry(&self, entry: TransferLogEntry) -> Result<()> {
        if let Some(parent) = self.log_file_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
