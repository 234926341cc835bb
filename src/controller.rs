//! Drives a scan across the host range and aggregates the results.
//!
//! Hosts are visited one after another in ascending order. After each host
//! the result set is folded into the run statistics, written to the log sink
//! when logging is enabled, handed to the observer and then dropped. The
//! cancellation signal is only looked at between hosts, so a host that has
//! started always finishes.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::error::ScanError;
use crate::log_sink::LogSink;
use crate::observer::{NoopObserver, ScanObserver};
use crate::scanner::{HostResult, Scanner};

/// Cooperative stop request shared with an interrupt handler.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    /// A signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stops at the next host boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`Self::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run stopped.
#[derive(Debug)]
pub enum TerminationReason {
    /// Every host of the range was scanned.
    Completed,
    /// The cancellation signal was observed at a host boundary.
    Cancelled,
    /// A fatal error cut the run short.
    Failed(ScanError),
}

impl TerminationReason {
    /// True for [`Self::Failed`].
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Totals accumulated at host boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Hosts whose every window settled.
    pub hosts_scanned: u64,
    /// Open ports summed over those hosts.
    pub total_open_ports: u64,
}

impl RunStats {
    fn fold(&mut self, result: &HostResult) {
        self.hosts_scanned += 1;
        self.total_open_ports += result.open_ports().len() as u64;
    }
}

/// Final report of a run.
#[derive(Debug)]
pub struct RunSummary {
    /// Hosts scanned before the run stopped.
    pub hosts_scanned: u64,
    /// Open ports found on those hosts.
    pub total_open_ports: u64,
    /// Wall-clock start, also the timestamp of every log record.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Monotonic run duration.
    pub elapsed: Duration,
    /// Why the run stopped.
    pub termination: TerminationReason,
}

/// All mutable state of one run; created fresh by every [`RunController::run`].
struct RunState {
    stats: RunStats,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RunState {
    fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            stats: RunStats::default(),
            started_at,
            started: Instant::now(),
        }
    }

    fn finish(self, termination: TerminationReason) -> RunSummary {
        RunSummary {
            hosts_scanned: self.stats.hosts_scanned,
            total_open_ports: self.stats.total_open_ports,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed: self.started.elapsed(),
            termination,
        }
    }
}

/// Runs a [`Scanner`] over its configured host range.
///
/// ```rust
/// # use rangescan::controller::{CancelSignal, RunController, TerminationReason};
/// # use rangescan::input::ScanConfig;
/// # use rangescan::scanner::Scanner;
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let config = ScanConfig::new("127.0.0.1", "127.0.0.1", 1, 20, 50, 10, false).unwrap();
/// let scanner = Scanner::new(config);
///
/// let summary = RunController::new(&scanner, CancelSignal::new()).run().await;
///
/// assert_eq!(summary.hosts_scanned, 1);
/// assert!(matches!(summary.termination, TerminationReason::Completed));
/// # });
/// ```
pub struct RunController<'a> {
    scanner: &'a Scanner,
    observer: &'a dyn ScanObserver,
    log_sink: Option<&'a mut dyn LogSink>,
    cancel: CancelSignal,
    started_at: Option<DateTime<Utc>>,
}

impl<'a> RunController<'a> {
    /// Controller for `scanner`, stopping between hosts once `cancel` is raised.
    /// Notifications go nowhere until an observer is set.
    pub fn new(scanner: &'a Scanner, cancel: CancelSignal) -> Self {
        Self {
            scanner,
            observer: &NoopObserver,
            log_sink: None,
            cancel,
            started_at: None,
        }
    }

    /// Receives every probe and host notification.
    #[must_use]
    pub fn observer(mut self, observer: &'a dyn ScanObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Sink receiving one record per host. Only used when the configuration
    /// has logging enabled.
    #[must_use]
    pub fn log_sink(mut self, log_sink: &'a mut dyn LogSink) -> Self {
        self.log_sink = Some(log_sink);
        self
    }

    /// Wall-clock start of the run, stamped on every log record and reported
    /// in the summary. Defaults to the moment [`Self::run`] is called.
    #[must_use]
    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Scans every host of the range, stopping early on cancellation or a
    /// fatal error.
    pub async fn run(mut self) -> RunSummary {
        let scanner = self.scanner;
        let config = scanner.config();
        let end = config.end_host();
        let mut state = RunState::start(self.started_at.unwrap_or_else(Utc::now));
        let mut host = config.start_host();

        if config.logging() && self.log_sink.is_none() {
            warn!("Logging is enabled but no log sink is attached; host records are not written");
        }

        info!(
            "Scanning {} hosts ({} - {}), ports {}-{}, batch size {}, timeout {:?}",
            config.host_count(),
            host,
            end,
            config.ports().start(),
            config.ports().end(),
            config.batch_width(),
            config.timeout()
        );

        let termination = loop {
            let result = scanner.scan_host(host, self.observer).await;
            state.stats.fold(&result);

            if let Err(e) = self.write_record(&result, &state.started_at) {
                warn!("Stopping run: {e}");
                break TerminationReason::Failed(e);
            }

            self.observer.on_host_boundary(host, &result);
            drop(result);

            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping after host {host}");
                break TerminationReason::Cancelled;
            }
            if host >= end {
                break TerminationReason::Completed;
            }
            match host.increment() {
                Ok(next) => host = next,
                Err(e) => break TerminationReason::Failed(e),
            }
        };

        let summary = state.finish(termination);
        debug!("Run finished: {summary:?}");
        self.observer.on_run_complete(&summary);
        summary
    }

    fn write_record(
        &mut self,
        result: &HostResult,
        timestamp: &DateTime<Utc>,
    ) -> Result<(), ScanError> {
        if !self.scanner.config().logging() {
            return Ok(());
        }
        let Some(sink) = self.log_sink.as_deref_mut() else {
            return Ok(());
        };
        sink.append_host_record(
            result.host(),
            timestamp,
            result.open_ports(),
            result.closed_ports(),
        )?;
        Ok(())
    }
}
