//! Per-host records of open and closed ports.
//!
//! Each host produces one line in the "open" stream and one in the "closed"
//! stream, formatted as `<host>,<timestamp>,<comma-separated ports>`.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::debug;

use crate::address::Address;
use crate::input::{LogMode, ScanConfig};
use crate::observer::iso_timestamp;

/// Destination for the per-host records. Writes are synchronous; a failing
/// write stops the run.
pub trait LogSink {
    /// Appends one line for `host` to each of the open and closed streams.
    fn append_host_record(
        &mut self,
        host: Address,
        timestamp: &DateTime<Utc>,
        open_ports: &[u16],
        closed_ports: &[u16],
    ) -> io::Result<()>;
}

/// Formats one record line, without the trailing newline.
#[must_use]
pub fn format_record(host: Address, timestamp: &DateTime<Utc>, ports: &[u16]) -> String {
    format!("{host},{},{}", iso_timestamp(timestamp), ports.iter().join(","))
}

/// Writes the two record streams to a pair of files.
#[derive(Debug)]
pub struct FileLogSink {
    open: File,
    closed: File,
    open_path: PathBuf,
    closed_path: PathBuf,
}

impl FileLogSink {
    /// Prepares the log files inside `dir`, creating the directory if needed.
    ///
    /// [`LogMode::Overwrite`] and [`LogMode::Append`] use the shared
    /// `openPorts.txt` and `closedPorts.txt`; [`LogMode::New`] names a fresh
    /// pair after the run start time, host range and port range.
    pub fn create(
        dir: &Path,
        mode: LogMode,
        config: &ScanConfig,
        started_at: &DateTime<Utc>,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let (open_name, closed_name) = match mode {
            LogMode::Overwrite | LogMode::Append => {
                ("openPorts.txt".to_owned(), "closedPorts.txt".to_owned())
            }
            LogMode::New => {
                let suffix = format!(
                    "{}_{}_{}_{}_{}",
                    started_at.format("%Y-%m-%dT%H-%M-%S%.3fZ"),
                    config.start_host(),
                    config.end_host(),
                    config.ports().start(),
                    config.ports().end()
                );
                (
                    format!("openPorts_{suffix}.txt"),
                    format!("closedPorts_{suffix}.txt"),
                )
            }
        };

        let open_path = dir.join(open_name);
        let closed_path = dir.join(closed_name);
        let truncate = mode != LogMode::Append;
        debug!(
            "Logging to {} and {} (truncate: {truncate})",
            open_path.display(),
            closed_path.display()
        );

        Ok(Self {
            open: open_log(&open_path, truncate)?,
            closed: open_log(&closed_path, truncate)?,
            open_path,
            closed_path,
        })
    }

    /// File receiving the open-port records.
    pub fn open_path(&self) -> &Path {
        &self.open_path
    }

    /// File receiving the closed-port records.
    pub fn closed_path(&self) -> &Path {
        &self.closed_path
    }
}

fn open_log(path: &Path, truncate: bool) -> io::Result<File> {
    if truncate {
        File::create(path)
    } else {
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl LogSink for FileLogSink {
    fn append_host_record(
        &mut self,
        host: Address,
        timestamp: &DateTime<Utc>,
        open_ports: &[u16],
        closed_ports: &[u16],
    ) -> io::Result<()> {
        writeln!(self.open, "{}", format_record(host, timestamp, open_ports))?;
        writeln!(self.closed, "{}", format_record(host, timestamp, closed_ports))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{format_record, FileLogSink, LogSink};
    use crate::input::{LogMode, ScanConfig};
    use chrono::{DateTime, TimeZone, Utc};
    use std::fs;

    fn started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    fn config() -> ScanConfig {
        ScanConfig::new("10.0.0.1", "10.0.0.2", 20, 25, 300, 10, true).unwrap()
    }

    #[test]
    fn record_line_format() {
        let host = "10.0.0.1".parse().unwrap();
        assert_eq!(
            format_record(host, &started_at(), &[22, 80, 443]),
            "10.0.0.1,2024-05-01T08:30:00.000Z,22,80,443"
        );
        assert_eq!(
            format_record(host, &started_at(), &[]),
            "10.0.0.1,2024-05-01T08:30:00.000Z,"
        );
    }

    #[test]
    fn writes_one_line_per_host_to_each_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            FileLogSink::create(dir.path(), LogMode::Overwrite, &config(), &started_at()).unwrap();

        sink.append_host_record("10.0.0.1".parse().unwrap(), &started_at(), &[22], &[20, 21])
            .unwrap();
        sink.append_host_record("10.0.0.2".parse().unwrap(), &started_at(), &[], &[20])
            .unwrap();

        let open = fs::read_to_string(dir.path().join("openPorts.txt")).unwrap();
        let closed = fs::read_to_string(dir.path().join("closedPorts.txt")).unwrap();
        assert_eq!(
            open,
            "10.0.0.1,2024-05-01T08:30:00.000Z,22\n10.0.0.2,2024-05-01T08:30:00.000Z,\n"
        );
        assert_eq!(
            closed,
            "10.0.0.1,2024-05-01T08:30:00.000Z,20,21\n10.0.0.2,2024-05-01T08:30:00.000Z,20\n"
        );
    }

    #[test]
    fn overwrite_truncates_and_append_keeps() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("openPorts.txt"), "old\n").unwrap();

        FileLogSink::create(dir.path(), LogMode::Append, &config(), &started_at()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("openPorts.txt")).unwrap(),
            "old\n"
        );

        FileLogSink::create(dir.path(), LogMode::Overwrite, &config(), &started_at()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("openPorts.txt")).unwrap(),
            ""
        );
    }

    #[test]
    fn new_mode_names_files_after_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("log");

        let sink = FileLogSink::create(&logs, LogMode::New, &config(), &started_at()).unwrap();

        assert_eq!(
            sink.open_path(),
            logs.join("openPorts_2024-05-01T08-30-00.000Z_10.0.0.1_10.0.0.2_20_25.txt")
        );
        assert_eq!(
            sink.closed_path(),
            logs.join("closedPorts_2024-05-01T08-30-00.000Z_10.0.0.1_10.0.0.2_20_25.txt")
        );
        assert!(sink.open_path().exists());
        assert!(sink.closed_path().exists());
    }
}
