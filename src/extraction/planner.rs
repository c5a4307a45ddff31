//! Splits an absolute time range into the fixed-width windows the fetch
//! phase works through. Pure; re-planning the same range yields the same
//! sequence.

use crate::types::window::TimeWindow;
use chrono::{Duration, NaiveDateTime};

/// Lazily yields contiguous, non-overlapping windows covering
/// `[start, end)`. The final window is clamped to `end` and may be shorter
/// than `width`. An empty range (`start >= end`) yields nothing.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, NaiveDate};
/// use trendpull::plan_windows;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(1, 0, 0).unwrap();
/// let windows: Vec<_> = plan_windows(start, end, Duration::hours(10)).collect();
///
/// assert_eq!(windows.len(), 3);
/// assert_eq!(windows[0].start, start);
/// assert_eq!(windows[2].end, end);
/// ```
pub fn plan_windows(start: NaiveDateTime, end: NaiveDateTime, width: Duration) -> WindowPlan {
    WindowPlan {
        cursor: start,
        end,
        width,
        index: 0,
    }
}

/// Iterator state for [`plan_windows`]. Cloning restarts nothing; clone the
/// plan before iterating if the sequence is needed twice.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    cursor: NaiveDateTime,
    end: NaiveDateTime,
    width: Duration,
    index: usize,
}

impl Iterator for WindowPlan {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        // A non-positive width would loop forever; callers validate, this
        // guards.
        if self.width <= Duration::zero() || self.cursor >= self.end {
            return None;
        }
        let stop = std::cmp::min(self.cursor + self.width, self.end);
        let window = TimeWindow {
            index: self.index,
            start: self.cursor,
            end: stop,
        };
        self.cursor = stop;
        self.index += 1;
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn windows_partition_the_range_exactly() {
        let start = at(1, 4);
        let end = at(2, 4);
        let windows: Vec<_> = plan_windows(start, end, Duration::hours(10)).collect();

        // ceil(24h / 10h) = 3
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap between windows");
        }
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
        }
    }

    #[test]
    fn last_window_is_clamped() {
        let windows: Vec<_> = plan_windows(at(1, 0), at(2, 1), Duration::hours(10)).collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].end - windows[2].start, Duration::hours(5));
        assert_eq!(windows[2].end, at(2, 1));
    }

    #[test]
    fn window_count_matches_ceiling_division() {
        for hours in 1..30 {
            let width = Duration::hours(hours);
            let start = at(1, 0);
            let end = at(2, 0);
            let count = plan_windows(start, end, width).count() as i64;
            let expected = (24 + hours - 1) / hours;
            assert_eq!(count, expected, "width {}h", hours);
        }
    }

    #[test]
    fn degenerate_range_yields_no_windows() {
        assert_eq!(plan_windows(at(2, 0), at(1, 0), Duration::hours(1)).count(), 0);
        assert_eq!(plan_windows(at(1, 0), at(1, 0), Duration::hours(1)).count(), 0);
    }

    #[test]
    fn non_positive_width_yields_no_windows() {
        assert_eq!(plan_windows(at(1, 0), at(2, 0), Duration::zero()).count(), 0);
        assert_eq!(plan_windows(at(1, 0), at(2, 0), Duration::hours(-1)).count(), 0);
    }

    #[test]
    fn plan_is_restartable() {
        let plan = plan_windows(at(1, 0), at(2, 0), Duration::hours(7));
        let first: Vec<_> = plan.clone().collect();
        let second: Vec<_> = plan.collect();
        assert_eq!(first, second);
    }
}
