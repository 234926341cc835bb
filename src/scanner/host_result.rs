use crate::address::Address;

use super::ProbeOutcome;

/// Open and closed ports of one host.
///
/// Created empty when the host's scan begins and filled as probes settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResult {
    host: Address,
    open: Vec<u16>,
    closed: Vec<u16>,
}

impl HostResult {
    /// Empty result set for `host`.
    #[must_use]
    pub const fn new(host: Address) -> Self {
        Self {
            host,
            open: Vec::new(),
            closed: Vec::new(),
        }
    }

    /// The host these ports belong to.
    pub const fn host(&self) -> Address {
        self.host
    }

    /// Ports that accepted a connection.
    pub fn open_ports(&self) -> &[u16] {
        &self.open
    }

    /// Ports that refused, failed or timed out.
    pub fn closed_ports(&self) -> &[u16] {
        &self.closed
    }

    /// Number of probes recorded so far.
    pub fn probed(&self) -> usize {
        self.open.len() + self.closed.len()
    }

    pub(crate) fn record(&mut self, port: u16, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Open => self.open.push(port),
            ProbeOutcome::Closed => self.closed.push(port),
        }
    }

    pub(crate) fn sort(&mut self) {
        self.open.sort_unstable();
        self.closed.sort_unstable();
    }
}

#[cfg(test)]
mod tests {
    use super::{HostResult, ProbeOutcome};

    #[test]
    fn records_into_exactly_one_list() {
        let mut result = HostResult::new("10.0.0.1".parse().unwrap());
        result.record(443, ProbeOutcome::Closed);
        result.record(22, ProbeOutcome::Open);
        result.record(80, ProbeOutcome::Open);
        result.record(21, ProbeOutcome::Closed);
        result.sort();

        assert_eq!(result.open_ports(), &[22, 80]);
        assert_eq!(result.closed_ports(), &[21, 443]);
        assert_eq!(result.probed(), 4);
        assert_eq!(result.host().to_string(), "10.0.0.1");
    }
}
