//! # Telemetry Module
//!
//! Appends what the monitor reads from the driver to a JSONL (JSON Lines)
//! file, one record per line, each stamped with the wall-clock time.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::device::{Readings, Timing};
use crate::error::Result;
use crate::fdc1::protocol::SettingsSnapshot;

/// Payload of one logged record
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    Readings(Readings),
    Settings(SettingsSnapshot),
    Timing {
        running: bool,
        on_time: u32,
        off_time: u32,
    },
}

/// One JSONL line
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub channel: usize,
    #[serde(flatten)]
    pub kind: RecordKind,
}

impl RecordKind {
    pub fn timing(running: bool, timing: Timing) -> Self {
        RecordKind::Timing {
            running,
            on_time: timing.on_time,
            off_time: timing.off_time,
        }
    }
}

impl Record {
    pub fn now(channel: usize, kind: RecordKind) -> Self {
        Self {
            timestamp: Utc::now(),
            channel,
            kind,
        }
    }
}

/// Append-only JSONL writer
pub struct ReadingLogger {
    writer: BufWriter<File>,
    records: u64,
}

impl ReadingLogger {
    /// Open (or create) `path` for appending
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Write one record and flush it to disk
    pub fn log(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Records written since opening
    pub fn records(&self) -> u64 {
        self.records
    }
}
