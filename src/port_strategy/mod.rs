//! Provides a means to split a port range into the windows scanned together.
mod window_iterator;
pub use window_iterator::WindowIterator;

use std::num::NonZeroU16;

use crate::error::ScanError;

/// An inclusive range of ports, both ends in `1..=65535`.
///
/// Only [`PortRange::new`] and the window iterator build one, so
/// `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Validates that `1 <= start <= end`.
    pub fn new(start: u16, end: u16) -> Result<Self, ScanError> {
        if start == 0 || start > end {
            return Err(ScanError::InvalidPortRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First port of the range.
    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Last port of the range, inclusive.
    #[must_use]
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Always false for a validated range; present for clippy's `len_without_is_empty`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Represents how the ports of one host are scheduled.
///
/// The range is cut into consecutive windows of at most `batch_width` ports.
/// Every port of the range lands in exactly one window, in ascending order.
#[derive(Debug, Clone, Copy)]
pub struct PortStrategy {
    range: PortRange,
    batch_width: NonZeroU16,
}

impl PortStrategy {
    /// Windows of `batch_width` ports over `range`.
    pub const fn new(range: PortRange, batch_width: NonZeroU16) -> Self {
        Self { range, batch_width }
    }

    /// The whole range.
    pub const fn range(&self) -> PortRange {
        self.range
    }

    /// Largest window size.
    pub const fn batch_width(&self) -> NonZeroU16 {
        self.batch_width
    }

    /// Iterates over the windows, each an inclusive sub-range of ports.
    pub const fn windows(&self) -> WindowIterator {
        WindowIterator::new(self.range, self.batch_width)
    }

    /// How many windows [`Self::windows`] will yield: `ceil(len / batch_width)`.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.range
            .len()
            .div_ceil(usize::from(self.batch_width.get()))
    }
}
