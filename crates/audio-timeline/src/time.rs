//! Microsecond time intervals used throughout the timeline model.

/// Half-open time interval `[start, end)` in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// A range is usable for edits only when it starts at or after zero and
    /// does not run backwards.
    pub fn is_valid(&self) -> bool {
        0 <= self.start && self.start <= self.end
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Whether `time` falls inside the interval (`end` itself is excluded).
    pub fn contains(&self, time: i64) -> bool {
        self.start <= time && time < self.end
    }
}

/// Map `time` in `target` onto the proportional position in `source`.
///
/// Intermediate math is f64 and the result truncates toward zero. Repeated
/// splits of the same segment can therefore drift by a microsecond; callers
/// tolerate that rather than rounding.
pub fn map_time(time: i64, source: TimeRange, target: TimeRange) -> i64 {
    if target.duration() <= 0 {
        return source.start;
    }
    ((time - target.start) as f64 * source.duration() as f64 / target.duration() as f64) as i64
        + source.start
}
