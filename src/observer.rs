//! Progress notifications emitted by the scanner and the run controller.
//!
//! The core never formats or prints anything itself; everything a user sees
//! goes through a [`ScanObserver`].
use std::cell::RefCell;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use serde_derive::Serialize;

use crate::address::Address;
use crate::controller::{RunSummary, TerminationReason};
use crate::scanner::{HostResult, ProbeOutcome};

/// Receives scan progress. Every method defaults to doing nothing.
pub trait ScanObserver {
    /// A probe of `host:port` is about to connect.
    fn on_probe_start(&self, _host: Address, _port: u16) {}

    /// A probe of `host:port` was classified. `service` is only ever set for open ports.
    fn on_probe_result(
        &self,
        _host: Address,
        _port: u16,
        _outcome: ProbeOutcome,
        _service: Option<&str>,
    ) {
    }

    /// Every window of `host` has settled.
    fn on_host_boundary(&self, _host: Address, _result: &HostResult) {}

    /// The run stopped, for whatever reason.
    fn on_run_complete(&self, _summary: &RunSummary) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Human readable console output.
///
/// A progress bar tracks the ports of the host being scanned; open ports are
/// printed as they are found. Greppable mode prints only one
/// `host -> [ports]` line per host, accessible mode drops colors and the
/// progress bar.
#[derive(Debug)]
pub struct ConsoleObserver {
    ports_per_host: u64,
    greppable: bool,
    accessible: bool,
    progress: RefCell<Option<ProgressBar>>,
}

impl ConsoleObserver {
    /// `ports_per_host` sizes the progress bar.
    #[must_use]
    pub const fn new(ports_per_host: u64, greppable: bool, accessible: bool) -> Self {
        Self {
            ports_per_host,
            greppable,
            accessible,
            progress: RefCell::new(None),
        }
    }

    fn progress_bar(&self, host: Address) -> ProgressBar {
        let bar = ProgressBar::new(self.ports_per_host);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(format!("Scanning host {host}"));
        bar
    }

    /// Prints above the progress bar when there is one.
    fn print(&self, line: &str) {
        match self.progress.borrow().as_ref() {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

impl ScanObserver for ConsoleObserver {
    fn on_probe_start(&self, host: Address, _port: u16) {
        if self.greppable || self.accessible {
            return;
        }
        let mut progress = self.progress.borrow_mut();
        if progress.is_none() {
            *progress = Some(self.progress_bar(host));
        }
    }

    fn on_probe_result(
        &self,
        _host: Address,
        port: u16,
        outcome: ProbeOutcome,
        service: Option<&str>,
    ) {
        if let Some(bar) = self.progress.borrow().as_ref() {
            bar.inc(1);
        }
        if self.greppable || outcome == ProbeOutcome::Closed {
            return;
        }

        let line = format!("Port open: {port} service: {}", service.unwrap_or("unknown"));
        if self.accessible {
            self.print(&line);
        } else {
            self.print(&line.green().to_string());
        }
    }

    fn on_host_boundary(&self, host: Address, result: &HostResult) {
        if let Some(bar) = self.progress.borrow_mut().take() {
            bar.finish_and_clear();
        }

        if self.greppable {
            println!("{host} -> [{}]", result.open_ports().iter().join(","));
            return;
        }

        let separator = "-----------------------------------";
        println!(
            "Host {host}: {} open, {} closed",
            result.open_ports().len(),
            result.closed_ports().len()
        );
        if self.accessible {
            println!("{separator}");
        } else {
            println!("{}", separator.yellow());
        }
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        if self.greppable {
            return;
        }

        let mut report = String::new();
        let _ = writeln!(report, "===================================");
        match &summary.termination {
            TerminationReason::Completed => {}
            TerminationReason::Cancelled => {
                let _ = writeln!(report, "Scanning stopped.");
            }
            TerminationReason::Failed(e) => {
                let _ = writeln!(report, "Scanning aborted: {e}");
            }
        }
        let _ = writeln!(report, "End Time: {}", iso_timestamp(&summary.finished_at));
        let _ = writeln!(report, "Total Time: {}", format_elapsed(summary.elapsed));
        let _ = writeln!(report, "Total Hosts Scanned: {}", summary.hosts_scanned);
        let _ = writeln!(report, "Total Open Ports: {}", summary.total_open_ports);
        let _ = write!(report, "===================================");
        println!("{report}");
    }
}

/// Renders a duration the way the summary block shows it, dropping leading
/// zero units: `1 hours 2 minutes 3 seconds 4 milliseconds`, `5 seconds 0 milliseconds`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let millis = total_ms % 1000;
    let total_seconds = total_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours} hours {minutes} minutes {seconds} seconds {millis} milliseconds")
    } else if minutes > 0 {
        format!("{minutes} minutes {seconds} seconds {millis} milliseconds")
    } else if seconds > 0 {
        format!("{seconds} seconds {millis} milliseconds")
    } else {
        format!("{millis} milliseconds")
    }
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2024-05-01T08:00:00.000Z`.
#[must_use]
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
struct HostReport {
    host: String,
    open_ports: Vec<u16>,
    closed_ports: Vec<u16>,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    hosts: &'a [HostReport],
    hosts_scanned: u64,
    total_open_ports: u64,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    elapsed_ms: u64,
    termination: &'static str,
    error: Option<String>,
}

/// Collects every host and prints one JSON document when the run completes.
#[derive(Debug, Default)]
pub struct JsonObserver {
    hosts: RefCell<Vec<HostReport>>,
}

impl JsonObserver {
    /// Observer without any host collected yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The JSON document for `summary` and the hosts seen so far.
    pub fn render(&self, summary: &RunSummary) -> serde_json::Result<String> {
        let (termination, error) = match &summary.termination {
            TerminationReason::Completed => ("completed", None),
            TerminationReason::Cancelled => ("cancelled", None),
            TerminationReason::Failed(e) => ("failed", Some(e.to_string())),
        };
        let hosts = self.hosts.borrow();
        let report = RunReport {
            hosts: &hosts,
            hosts_scanned: summary.hosts_scanned,
            total_open_ports: summary.total_open_ports,
            started_at: summary.started_at,
            finished_at: summary.finished_at,
            elapsed_ms: u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            termination,
            error,
        };
        serde_json::to_string_pretty(&report)
    }
}

impl ScanObserver for JsonObserver {
    fn on_host_boundary(&self, host: Address, result: &HostResult) {
        self.hosts.borrow_mut().push(HostReport {
            host: host.to_string(),
            open_ports: result.open_ports().to_vec(),
            closed_ports: result.closed_ports().to_vec(),
        });
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        match self.render(summary) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("Could not serialize run report: {e}"),
        }
    }
}
