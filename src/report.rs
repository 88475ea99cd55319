//! Run bookkeeping: the per-run log file and the tally of channel outcomes.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;

use crate::assemble::Day;
use crate::error::ConfigError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// How one channel's pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Processed {
        channel: String,
        saved: Vec<String>,
        empty_days: Vec<Day>,
    },
    Failed {
        channel: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    processed: usize,
    saved: usize,
    empty_days: usize,
    failed: Vec<String>,
}

impl RunReport {
    pub fn record(&mut self, outcome: ChannelOutcome) {
        match outcome {
            ChannelOutcome::Processed {
                saved, empty_days, ..
            } => {
                self.processed += 1;
                self.saved += saved.len();
                self.empty_days += empty_days.len();
            }
            ChannelOutcome::Failed { channel, .. } => self.failed.push(channel),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn empty_days(&self) -> usize {
        self.empty_days
    }

    /// Identifiers of the channels that failed, in completion order.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn summary(&self) -> String {
        format!(
            "channels processed: {}, files saved: {}, empty days: {}, failed channels: {}",
            self.processed,
            self.saved,
            self.empty_days,
            self.failed.len()
        )
    }
}

/// The run log file. Opened once at the start of a run and closed with the
/// run's summary; log output is appended through [`RunLog::writer`] in between.
pub struct RunLog {
    path: PathBuf,
    file: Arc<File>,
    timezone: Tz,
}

impl RunLog {
    /// Truncate `path` and write the start line.
    pub fn open(path: impl Into<PathBuf>, timezone: Tz) -> Result<Self, ConfigError> {
        let path = path.into();
        let run_log = |source| ConfigError::RunLog {
            path: path.clone(),
            source,
        };

        let mut file = File::create(&path).map_err(run_log)?;
        writeln!(file, "run started at {}", now(timezone)).map_err(run_log)?;

        Ok(Self {
            path,
            file: Arc::new(file),
            timezone,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn writer(&self) -> Arc<File> {
        Arc::clone(&self.file)
    }

    /// Write the summary line and flush the file to disk.
    pub fn close(self, report: &RunReport) -> std::io::Result<()> {
        let mut file = self.file.as_ref();
        writeln!(
            file,
            "run finished at {}: {}",
            now(self.timezone),
            report.summary()
        )?;
        if !report.failed().is_empty() {
            writeln!(file, "failed channels: {}", report.failed().join(", "))?;
        }

        file.sync_all()
    }
}

fn now(timezone: Tz) -> String {
    Utc::now()
        .with_timezone(&timezone)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
