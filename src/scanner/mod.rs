//! Core functionality for actual scanning behaviour.
use crate::address::Address;
use crate::input::ScanConfig;
use crate::observer::ScanObserver;
use crate::services::{ServiceLookup, ServiceTable};
use log::{debug, warn};

mod host_result;
pub use host_result::HostResult;

use futures::stream::{self, StreamExt};
use std::{
    fmt,
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::{
    io::{self, AsyncWriteExt},
    net::TcpStream,
    time,
};

/// Classification of a single (host, port) probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    /// The connection was established before the timeout.
    Open,
    /// Refused, unreachable, failed or timed out.
    Closed,
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug)]
struct ScannerConnector {
    timeout: Duration,
}

impl ScannerConnector {
    /// Probes one socket with exactly one connection attempt.
    ///
    /// Observers hear about the probe before the attempt and after it is
    /// classified. Open ports carry their service label, if any.
    async fn probe(
        &self,
        host: Address,
        port: u16,
        observer: &dyn ScanObserver,
        services: &dyn ServiceLookup,
    ) -> ProbeOutcome {
        observer.on_probe_start(host, port);

        let socket = SocketAddr::from((Ipv4Addr::from(host), port));
        let outcome = race(TcpStream::connect(socket), self.timeout, socket).await;

        let label = match outcome {
            ProbeOutcome::Open => services.service_name(port),
            ProbeOutcome::Closed => None,
        };
        observer.on_probe_result(host, port, outcome, label);
        outcome
    }
}

/// Races a connection attempt against a timer of `timeout`.
///
/// Whichever finishes first decides the outcome and the other is dropped:
/// a firing timer aborts the pending attempt, an established connection is
/// shut down and closed before returning.
async fn race<F>(attempt: F, timeout: Duration, socket: SocketAddr) -> ProbeOutcome
where
    F: Future<Output = io::Result<TcpStream>>,
{
    tokio::select! {
        connected = attempt => match connected {
            Ok(mut tcp_stream) => {
                debug!("Connection was successful, shutting down stream {socket}");
                if let Err(e) = tcp_stream.shutdown().await {
                    debug!("Shutdown stream error {e}");
                }
                ProbeOutcome::Open
            }
            Err(e) => {
                if e.to_string().to_lowercase().contains("too many open files") {
                    warn!("Too many open files while probing {socket}. Please reduce batch size.");
                } else {
                    debug!("Connection to {socket} failed: {e}");
                }
                ProbeOutcome::Closed
            }
        },
        () = time::sleep(timeout) => {
            debug!("Connection to {socket} timed out after {timeout:?}");
            ProbeOutcome::Closed
        }
    }
}

/// The batch scheduler.
///
/// Every host is scanned window by window: all ports of a window are probed
/// concurrently and the window is joined in full before the next one starts,
/// so at most `batch_width` connection attempts are ever in flight.
pub struct Scanner {
    config: ScanConfig,
    connector: ScannerConnector,
    services: Box<dyn ServiceLookup>,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Scanner labelling open ports from the built-in service table.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            connector: ScannerConnector {
                timeout: config.timeout(),
            },
            config,
            services: Box::new(ServiceTable::builtin()),
        }
    }

    /// Replaces the service table used for open-port labels.
    #[must_use]
    pub fn with_services(mut self, services: impl ServiceLookup + 'static) -> Self {
        self.services = Box::new(services);
        self
    }

    /// The configuration this scanner runs with.
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scans the configured port range of one host.
    ///
    /// The returned [`HostResult`] holds every port of the range in exactly
    /// one of its lists, each sorted in ascending order.
    pub async fn scan_host(&self, host: Address, observer: &dyn ScanObserver) -> HostResult {
        let strategy = self.config.port_strategy();
        let mut result = HostResult::new(host);

        debug!(
            "Start scanning host {}. \nBatch size {}\nNumber of ports {}\nNumber of windows {}",
            host,
            strategy.batch_width(),
            strategy.range().len(),
            strategy.window_count()
        );

        for window in strategy.windows() {
            let services = &*self.services;
            let connector = &self.connector;
            let mut probes = stream::iter(window.start()..=window.end())
                .map(|port| async move {
                    (port, connector.probe(host, port, observer, services).await)
                })
                .buffer_unordered(window.len());

            while let Some((port, outcome)) = probes.next().await {
                result.record(port, outcome);
            }
            debug!(
                "Host {host}: window {}-{} settled",
                window.start(),
                window.end()
            );
        }

        result.sort();
        debug!(
            "Host {host}: {} open, {} closed",
            result.open_ports().len(),
            result.closed_ports().len()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn config(start_port: u16, end_port: u16, batch_width: u16, timeout_ms: u64) -> ScanConfig {
        ScanConfig::new(
            "127.0.0.1",
            "127.0.0.1",
            start_port,
            end_port,
            timeout_ms,
            batch_width,
            false,
        )
        .unwrap()
    }

    fn localhost() -> Address {
        "127.0.0.1".parse().unwrap()
    }

    fn socket(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    /// A port nothing is listening on: bound once to reserve a number, then released.
    fn released_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Event {
        Start(u16),
        Result(u16, ProbeOutcome),
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
        labels: Mutex<Vec<(u16, Option<String>)>>,
    }

    impl ScanObserver for Recorder {
        fn on_probe_start(&self, _host: Address, port: u16) {
            self.events.lock().unwrap().push(Event::Start(port));
        }

        fn on_probe_result(
            &self,
            _host: Address,
            port: u16,
            outcome: ProbeOutcome,
            service: Option<&str>,
        ) {
            self.events.lock().unwrap().push(Event::Result(port, outcome));
            self.labels
                .lock()
                .unwrap()
                .push((port, service.map(str::to_owned)));
        }
    }

    #[tokio::test]
    async fn pending_attempt_is_closed_after_timeout() {
        let started = Instant::now();
        let outcome = race(
            std::future::pending::<io::Result<TcpStream>>(),
            Duration::from_millis(50),
            socket(9),
        )
        .await;

        assert_eq!(outcome, ProbeOutcome::Closed);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn failed_attempt_is_closed_immediately() {
        let started = Instant::now();
        let outcome = race(
            async { Err::<TcpStream, _>(io::Error::from(io::ErrorKind::ConnectionRefused)) },
            Duration::from_secs(5),
            socket(9),
        )
        .await;

        assert_eq!(outcome, ProbeOutcome::Closed);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn listener_is_open_well_under_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connector = ScannerConnector {
            timeout: Duration::from_secs(2),
        };

        let started = Instant::now();
        let outcome = connector
            .probe(localhost(), port, &NoopObserver, &ServiceTable::empty())
            .await;

        assert_eq!(outcome, ProbeOutcome::Open);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn refused_port_is_closed() {
        let port = released_port();
        let connector = ScannerConnector {
            timeout: Duration::from_millis(500),
        };

        let outcome = connector
            .probe(localhost(), port, &NoopObserver, &ServiceTable::empty())
            .await;

        assert_eq!(outcome, ProbeOutcome::Closed);
    }

    #[tokio::test]
    async fn open_ports_carry_service_label() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let services =
            ServiceTable::from_csv(&format!("Port,Service\n{port},test-svc\n")).unwrap();
        let connector = ScannerConnector {
            timeout: Duration::from_secs(2),
        };
        let recorder = Recorder::default();

        connector
            .probe(localhost(), port, &recorder, &services)
            .await;

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![Event::Start(port), Event::Result(port, ProbeOutcome::Open)]
        );
        assert_eq!(
            *recorder.labels.lock().unwrap(),
            vec![(port, Some("test-svc".to_owned()))]
        );
    }

    #[tokio::test]
    async fn web_range_probes_every_port_once() {
        let scanner = Scanner::new(config(80, 443, 10, 100));
        let recorder = Recorder::default();

        let result = scanner.scan_host(localhost(), &recorder).await;

        let events = recorder.events.lock().unwrap();
        let starts = events
            .iter()
            .filter_map(|e| match e {
                Event::Start(port) => Some(*port),
                Event::Result(..) => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(starts.len(), 364);
        assert_eq!(starts.iter().collect::<HashSet<_>>().len(), 364);
        assert_eq!(result.open_ports().len() + result.closed_ports().len(), 364);
    }

    #[tokio::test]
    async fn windows_are_joined_before_the_next_starts() {
        let scanner = Scanner::new(config(20_000, 20_024, 4, 100));
        let recorder = Recorder::default();

        scanner.scan_host(localhost(), &recorder).await;

        let events = recorder.events.lock().unwrap();
        let window_of = |port: u16| (port - 20_000) / 4;
        let mut settled = HashSet::new();
        let mut current_window = 0;
        for event in events.iter() {
            match *event {
                Event::Start(port) => {
                    let window = window_of(port);
                    if window != current_window {
                        // every port of the previous window has settled
                        let previous = (20_000 + current_window * 4)..(20_000 + window * 4);
                        assert!(previous.into_iter().all(|p| settled.contains(&p)));
                        current_window = window;
                    }
                }
                Event::Result(port, _) => {
                    assert_eq!(window_of(port), current_window);
                    settled.insert(port);
                }
            }
        }
        assert_eq!(settled.len(), 25);
    }

    #[tokio::test]
    async fn open_and_closed_lists_partition_the_range() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().port();
        let start = open.saturating_sub(2).max(1);
        let end = open.saturating_add(2);
        let scanner = Scanner::new(config(start, end, 2, 200));

        let result = scanner.scan_host(localhost(), &NoopObserver).await;

        assert!(result.open_ports().contains(&open));
        assert!(!result.closed_ports().contains(&open));
        let mut all = result
            .open_ports()
            .iter()
            .chain(result.closed_ports())
            .copied()
            .collect::<Vec<_>>();
        all.sort_unstable();
        assert_eq!(all, (start..=end).collect::<Vec<_>>());
        assert!(result.closed_ports().windows(2).all(|w| w[0] < w[1]));
    }
}
