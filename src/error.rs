//! Error types shared by configuration validation and the run controller.
use std::io;

use thiserror::Error;

use crate::address::Address;

/// Everything that can stop a scan from starting or from finishing.
///
/// Closed ports are never represented here: refused, reset, unreachable and
/// timed out connections are all ordinary [`ProbeOutcome::Closed`] results.
///
/// [`ProbeOutcome::Closed`]: crate::scanner::ProbeOutcome::Closed
#[derive(Debug, Error)]
pub enum ScanError {
    /// Host text that is not four dot-separated decimal octets.
    #[error("invalid IPv4 address format: {0:?}")]
    InvalidAddressFormat(String),

    /// Attempted to advance past 255.255.255.255.
    #[error("cannot increment IP address beyond 255.255.255.255")]
    AddressOverflow,

    /// The start host sorts after the end host.
    #[error("start host {start} is greater than end host {end}")]
    HostRangeReversed {
        /// First host as given.
        start: Address,
        /// Last host as given.
        end: Address,
    },

    /// Port zero, or a start port above the end port.
    #[error("invalid port range {start}-{end}: ports must satisfy 1 <= start <= end <= 65535")]
    InvalidPortRange {
        /// First port as given.
        start: u16,
        /// Last port as given.
        end: u16,
    },

    /// A batch size of zero.
    #[error("batch size must be at least 1")]
    ZeroBatchWidth,

    /// A timeout of zero milliseconds.
    #[error("timeout must be at least 1 millisecond")]
    ZeroTimeout,

    /// The log sink failed to persist a host record.
    #[error("failed to write host record: {0}")]
    LogSink(#[from] io::Error),
}
