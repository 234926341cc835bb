use std::num::NonZeroU16;

use super::PortRange;

/// Yields consecutive, non-overlapping inclusive windows over a [`PortRange`].
///
/// Each window holds `width` ports except possibly the last, which holds
/// whatever remains. Arithmetic is done in `u32` so a range ending at 65535
/// terminates cleanly instead of wrapping.
#[derive(Debug, Clone)]
pub struct WindowIterator {
    next_start: u32,
    end: u32,
    width: u32,
}

impl WindowIterator {
    pub(super) const fn new(range: PortRange, width: NonZeroU16) -> Self {
        Self {
            next_start: range.start as u32,
            end: range.end as u32,
            width: width.get() as u32,
        }
    }

    fn remaining(&self) -> usize {
        if self.next_start > self.end {
            return 0;
        }
        let ports = self.end - self.next_start + 1;
        ports.div_ceil(self.width) as usize
    }
}

impl Iterator for WindowIterator {
    type Item = PortRange;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_start > self.end {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.width - 1).min(self.end);
        self.next_start = end + 1;

        // both bounds come from a u16 range, so the conversions cannot fail
        Some(PortRange {
            start: u16::try_from(start).ok()?,
            end: u16::try_from(end).ok()?,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WindowIterator {}
