use std::fmt::{self, Display};

/// Represent a contiguous range from [start, end)
/// Inclusive start, exclusive of end
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy, PartialOrd, Ord)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    #[inline]
    pub fn new(start: u32, end: u32) -> Self {
        Interval { start, end }
    }

    ///
    /// Get the number of positions covered by the interval
    ///
    #[inline]
    pub fn width(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if the interval overlaps the half-open range start .. end
    #[inline]
    pub fn overlap(&self, start: u32, end: u32) -> bool {
        self.start < end && self.end > start
    }

    /// Check if the interval lies entirely within start .. end
    #[inline]
    pub fn contained_in(&self, start: u32, end: u32) -> bool {
        start <= self.start && self.end <= end
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
