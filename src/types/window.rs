use chrono::NaiveDateTime;
use std::fmt;

/// One half-open time interval `[start, end)` covered by a single trend-data
/// request. Windows carry their position in the planned sequence so staged
/// results can be keyed and merged in plan order regardless of completion
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Position of this window in the planned sequence, starting at 0.
    pub index: usize,
    /// Inclusive lower bound.
    pub start: NaiveDateTime,
    /// Exclusive upper bound.
    pub end: NaiveDateTime,
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{} .. {})", self.index, self.start, self.end)
    }
}
