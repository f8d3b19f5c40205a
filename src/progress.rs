//! Transfer progress display for the interactive client
//!
//! Received files scroll above a fixed spinner line that tracks running
//! totals, finishing with a one-line summary.

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub struct TransferProgress {
    spinner: ProgressBar,
    start: Instant,
    totals: Mutex<(u64, u64)>, // (files, bytes)
}

impl TransferProgress {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));

        Self {
            spinner,
            start: Instant::now(),
            totals: Mutex::new((0, 0)),
        }
    }

    /// Record one fully received file
    pub fn file_done(&self, name: &str, bytes: u64) {
        let (files, total) = {
            let mut t = self.totals.lock();
            t.0 += 1;
            t.1 += bytes;
            *t
        };
        self.spinner
            .suspend(|| println!("  received {name} ({})", HumanBytes(bytes)));
        self.spinner.set_message(format!(
            "{files} files ({}) in {:.1}s",
            HumanBytes(total),
            self.start.elapsed().as_secs_f64()
        ));
    }

    pub fn finish(&self, aborted: Option<&str>) {
        let (files, total) = *self.totals.lock();
        match aborted {
            Some(msg) => self
                .spinner
                .finish_with_message(format!("aborted after {files} files: {msg}")),
            None => self.spinner.finish_with_message(format!(
                "done: {files} files ({}) in {:.1}s",
                HumanBytes(total),
                self.start.elapsed().as_secs_f64()
            )),
        }
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}
