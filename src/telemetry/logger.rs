//! JSONL status recorder with one file per day

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use super::types::StatusRecord;
use crate::error::{HohError, Result};

/// Appends [`StatusRecord`]s to `status-<date>.jsonl` files
pub struct StatusRecorder {
    dir: PathBuf,
    current: Option<(NaiveDate, BufWriter<File>)>,
    records: u64,
}

impl std::fmt::Debug for StatusRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusRecorder")
            .field("dir", &self.dir)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl StatusRecorder {
    /// Create the recorder, making `dir` if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Recording status telemetry to {}", dir.display());
        Ok(Self {
            dir,
            current: None,
            records: 0,
        })
    }

    /// Path of the file that records dated `date` go to
    pub fn file_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("status-{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Number of records written since creation
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append one record, switching files when the date changes
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be serialized or written
    pub fn record(&mut self, date: NaiveDate, record: &StatusRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| HohError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let writer = self.writer_for(date)?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;

        self.records += 1;
        Ok(())
    }

    fn writer_for(&mut self, date: NaiveDate) -> Result<&mut BufWriter<File>> {
        let stale = !matches!(&self.current, Some((open_date, _)) if *open_date == date);
        if stale {
            let path = self.file_path(date);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!("Opened telemetry file {}", path.display());
            self.current = Some((date, BufWriter::new(file)));
        }

        match &mut self.current {
            Some((_, writer)) => Ok(writer),
            None => Err(HohError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "telemetry file not open",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::MotorStatus;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(count: u32) -> StatusRecord {
        let at = Utc.with_ymd_and_hms(2024, 6, 18, 8, 30, 0).unwrap();
        StatusRecord::new(at, count, &MotorStatus::default(), 0)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_records_are_json_lines() {
        let dir = TempDir::new().unwrap();
        let mut recorder = StatusRecorder::new(dir.path()).unwrap();

        recorder.record(date(18), &record(1)).unwrap();
        recorder.record(date(18), &record(2)).unwrap();
        assert_eq!(recorder.records(), 2);

        let contents = fs::read_to_string(recorder.file_path(date(18))).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["count"], 2);
    }

    #[test]
    fn test_new_file_per_day() {
        let dir = TempDir::new().unwrap();
        let mut recorder = StatusRecorder::new(dir.path().join("logs")).unwrap();

        recorder.record(date(18), &record(1)).unwrap();
        recorder.record(date(19), &record(2)).unwrap();

        assert!(recorder.file_path(date(18)).exists());
        assert!(recorder.file_path(date(19)).exists());
        assert!(recorder
            .file_path(date(19))
            .ends_with("status-2024-06-19.jsonl"));
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        {
            let mut recorder = StatusRecorder::new(dir.path()).unwrap();
            recorder.record(date(18), &record(1)).unwrap();
        }
        let mut recorder = StatusRecorder::new(dir.path()).unwrap();
        recorder.record(date(18), &record(2)).unwrap();

        let contents = fs::read_to_string(recorder.file_path(date(18))).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
