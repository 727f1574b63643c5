//! Track segments: one linear time mapping from a source onto the timeline.

use crate::source::AudioSource;
use crate::time::TimeRange;

/// Maps `source_range` of one source track onto `target_range` of the
/// composed timeline. Source and target durations may differ; their ratio is
/// the playback speed for the segment.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrackSegment {
    pub source: AudioSource,
    pub source_track_id: u32,
    pub source_range: TimeRange,
    pub target_range: TimeRange,
}

impl AudioTrackSegment {
    pub fn new(
        source: AudioSource,
        source_track_id: u32,
        source_range: TimeRange,
        target_range: TimeRange,
    ) -> Self {
        Self {
            source,
            source_track_id,
            source_range,
            target_range,
        }
    }

    /// Placeholder that fills `target_range` with silence.
    pub fn empty(target_range: TimeRange) -> Self {
        Self {
            source: AudioSource::Empty,
            source_track_id: 0,
            source_range: TimeRange::new(0, 0),
            target_range,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.source_range.duration() == 0
    }

    /// `source duration / target duration`; > 1 plays time-compressed.
    pub fn speed(&self) -> f64 {
        if self.target_range.duration() <= 0 {
            return 1.0;
        }
        self.source_range.duration() as f64 / self.target_range.duration() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segment_is_silence() {
        let seg = AudioTrackSegment::empty(TimeRange::new(0, 5_000));
        assert!(seg.is_empty());
        assert_eq!(seg.target_range.duration(), 5_000);
        assert_eq!(seg.source_range.duration(), 0);
    }

    #[test]
    fn speed_is_source_over_target() {
        let seg = AudioTrackSegment::new(
            AudioSource::from_path("/tmp/a.wav"),
            0,
            TimeRange::new(0, 2_000),
            TimeRange::new(0, 1_000),
        );
        assert_eq!(seg.speed(), 2.0);
    }
}
