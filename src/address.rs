//! IPv4 address arithmetic over 32-bit ordinals.
//!
//! Hosts are compared, ordered and advanced by their ordinal; dotted-quad text
//! only exists at the parsing and display edges.
//!
//! ```rust
//! # use rangescan::address::Address;
//! let addr: Address = "1.2.3.255".parse().unwrap();
//! assert_eq!(addr.increment().unwrap().to_string(), "1.2.4.0");
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::ScanError;

/// An IPv4 address held as its big-endian ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u32);

impl Address {
    /// The highest address, 255.255.255.255.
    pub const MAX: Self = Self(u32::MAX);

    /// Builds an address directly from its ordinal.
    #[must_use]
    pub const fn from_ordinal(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// Big-endian packing of the four octets.
    #[must_use]
    pub const fn ordinal(self) -> u32 {
        self.0
    }

    /// The four octets, most significant first.
    #[must_use]
    pub const fn octets(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Returns the next address, carrying from the last octet upwards.
    ///
    /// There is no wraparound: advancing past 255.255.255.255 is an
    /// [`ScanError::AddressOverflow`].
    pub fn increment(self) -> Result<Self, ScanError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(ScanError::AddressOverflow)
    }

    /// Number of hosts between `self` and `end`, both inclusive.
    ///
    /// Zero when `end` sorts before `self`.
    #[must_use]
    pub fn host_count(self, end: Self) -> u64 {
        if end < self {
            return 0;
        }
        u64::from(end.0 - self.0) + 1
    }
}

impl FromStr for Address {
    type Err = ScanError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ScanError::InvalidAddressFormat(text.to_owned());

        let mut octets = [0u8; 4];
        let mut parts = text.split('.');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            // u8::from_str tolerates a leading '+', which is not an octet
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *octet = part.parse().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(u32::from_be_bytes(octets)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self(u32::from(addr))
    }
}

impl From<Address> for Ipv4Addr {
    fn from(addr: Address) -> Self {
        Self::from(addr.0)
    }
}
