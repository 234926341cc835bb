//! This crate exposes the internal functionality of the rangescan TCP port scanner.
//!
//! rangescan walks a contiguous range of IPv4 hosts and, for every host,
//! probes a contiguous range of ports with plain TCP connection attempts. A
//! port is open when the connection is accepted before the timeout and closed
//! otherwise.
//!
//! ## Architecture Overview
//!
//! 1. **Input Processing**: [`input::ScanConfig`] validates the host range,
//!    port range, timeout and batch size.
//! 2. **Port Strategy**: [`port_strategy::PortStrategy`] cuts the port range
//!    into consecutive windows of at most `batch_size` ports.
//! 3. **Socket Scanning**: [`scanner::Scanner`] probes every port of a
//!    window concurrently and joins the whole window before starting the next.
//! 4. **Run Control**: [`controller::RunController`] visits the hosts in
//!    ascending order, aggregates the results and checks for cancellation
//!    between hosts.
//! 5. **Reporting**: observers ([`observer`]) and log sinks ([`log_sink`])
//!    receive the results; the core never prints or writes files itself.
//!
//! ## Basic Usage Example
//!
//! ```rust
//! use rangescan::controller::{CancelSignal, RunController};
//! use rangescan::input::ScanConfig;
//! use rangescan::scanner::Scanner;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Hosts 127.0.0.1 to 127.0.0.2, ports 1 to 100, 50ms timeout,
//!     // 25 ports per batch, no log files.
//!     let config = ScanConfig::new("127.0.0.1", "127.0.0.2", 1, 100, 50, 25, false)?;
//!     let scanner = Scanner::new(config);
//!
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     let summary = runtime.block_on(RunController::new(&scanner, CancelSignal::new()).run());
//!
//!     println!(
//!         "{} hosts scanned, {} open ports",
//!         summary.hosts_scanned, summary.total_open_ports
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Performance Tuning
//!
//! - **Batch Size**: every batch is joined in full, so one host takes up to
//!   `ceil(ports / batch size) * timeout`. The batch size is also the number
//!   of sockets open at once; keep it below the open file limit.
//! - **Timeout**: the only timeout in the system, applied to each probe.
#![allow(clippy::needless_doctest_main)]
#![warn(missing_docs)]

pub mod tui;

pub mod input;

pub mod scanner;

pub mod port_strategy;

pub mod address;

pub mod controller;

pub mod error;

pub mod observer;

pub mod services;

pub mod log_sink;
