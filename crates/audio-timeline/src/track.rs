//! Tracks and the timeline edit algebra.
//!
//! A track is an ordered, contiguous, gap-free sequence of segments covering
//! `[0, duration())`; gaps are represented by explicit empty segments.
//! [`AudioCompositionTrack`] adds the non-destructive edit operations
//! (insert / remove / rescale of target ranges) and per-range volume ramps.
//!
//! Edits rebuild the segment list in target order and then renumber target
//! ranges sequentially, so segment positions are never referenced across an
//! edit. Invalid arguments make every edit a silent no-op.

use crate::segment::AudioTrackSegment;
use crate::time::{TimeRange, map_time};

/// Read side of a timeline track.
#[derive(Clone, Debug, Default)]
pub struct AudioTrack {
    track_id: u32,
    segments: Vec<AudioTrackSegment>,
}

impl AudioTrack {
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            segments: Vec::new(),
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn segments(&self) -> &[AudioTrackSegment] {
        &self.segments
    }

    /// End of the last segment's target range; 0 for an empty track.
    pub fn duration(&self) -> i64 {
        self.segments
            .last()
            .map(|seg| seg.target_range.end)
            .unwrap_or(0)
    }

    /// Append a segment without renumbering. The caller is responsible for
    /// keeping target ranges contiguous.
    pub fn add_segment(&mut self, segment: AudioTrackSegment) {
        self.segments.push(segment);
    }

    /// Clip every segment intersecting `range` to the intersection, with
    /// source bounds interpolated proportionally. One output segment is
    /// emitted per intersecting original, so multi-segment subranges keep
    /// their internal boundaries.
    pub fn segments_for_time_range(&self, range: TimeRange) -> Vec<AudioTrackSegment> {
        let mut result = Vec::new();
        if self.segments.is_empty() || !range.is_valid() {
            return result;
        }
        if self.duration() < range.start {
            return result;
        }
        for seg in &self.segments {
            if range.end <= seg.target_range.start || seg.target_range.end <= range.start {
                continue;
            }
            let target = TimeRange::new(
                range.start.max(seg.target_range.start),
                range.end.min(seg.target_range.end),
            );
            let source = TimeRange::new(
                map_time(target.start, seg.source_range, seg.target_range),
                map_time(target.end, seg.source_range, seg.target_range),
            );
            result.push(AudioTrackSegment::new(
                seg.source.clone(),
                seg.source_track_id,
                source,
                target,
            ));
        }
        result
    }
}

/// One declared linear volume transition over a target time interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeRamp {
    pub range: TimeRange,
    pub start_volume: f32,
    pub end_volume: f32,
}

/// Editable track: segment edit algebra plus volume ramps.
#[derive(Clone, Debug, Default)]
pub struct AudioCompositionTrack {
    base: AudioTrack,
    volume_ramps: Vec<VolumeRamp>,
}

impl AudioCompositionTrack {
    pub fn new(track_id: u32) -> Self {
        Self {
            base: AudioTrack::new(track_id),
            volume_ramps: Vec::new(),
        }
    }

    pub fn track(&self) -> &AudioTrack {
        &self.base
    }

    pub fn track_id(&self) -> u32 {
        self.base.track_id()
    }

    pub fn duration(&self) -> i64 {
        self.base.duration()
    }

    pub fn segments(&self) -> &[AudioTrackSegment] {
        self.base.segments()
    }

    pub fn add_segment(&mut self, segment: AudioTrackSegment) {
        self.base.add_segment(segment);
    }

    pub fn segments_for_time_range(&self, range: TimeRange) -> Vec<AudioTrackSegment> {
        self.base.segments_for_time_range(range)
    }

    pub fn volume_ramps(&self) -> &[VolumeRamp] {
        &self.volume_ramps
    }

    /// Extract the sub-segments of `of_track` overlapping `time_range` and
    /// splice them into this track at `at_time`, splitting the segment under
    /// the insertion point when needed.
    pub fn insert_time_range(&mut self, time_range: TimeRange, of_track: &AudioTrack, at_time: i64) {
        if !time_range.is_valid() || at_time < 0 {
            return;
        }
        let segments = of_track.segments_for_time_range(time_range);
        if segments.is_empty() {
            return;
        }
        insert_segments(&mut self.base.segments, segments, at_time);
    }

    /// Delete the target interval `time_range`, closing the gap by
    /// renumbering the survivors.
    pub fn remove_time_range(&mut self, time_range: TimeRange) {
        if !time_range.is_valid() || self.base.segments.is_empty() {
            return;
        }
        if self.base.duration() < time_range.start {
            return;
        }

        let mut result = Vec::with_capacity(self.base.segments.len() + 1);
        for seg in self.base.segments.drain(..) {
            let target = seg.target_range;
            if time_range.end <= target.start || target.end <= time_range.start {
                result.push(seg);
            } else if time_range.start <= target.start && target.end <= time_range.end {
                // target inside time_range: erased
            } else if target.start <= time_range.start && time_range.end <= target.end {
                let (left, _, right) = split_contained(&seg, time_range, false);
                result.push(left);
                result.push(right);
            } else {
                let (kept, _) = split_overlapping(&seg, time_range, false);
                result.push(kept);
            }
        }
        self.base.segments = result;
        sort_segments(&mut self.base.segments);
    }

    /// Rescale the target interval `time_range` to last `to_duration`
    /// microseconds. Segments straddling a boundary are split first; only the
    /// inside portions change speed.
    pub fn scale_time_range(&mut self, time_range: TimeRange, to_duration: i64) {
        if !time_range.is_valid() || self.base.segments.is_empty() {
            return;
        }
        if to_duration <= 0 || time_range.duration() == to_duration {
            return;
        }
        if self.base.duration() < time_range.start {
            return;
        }

        let ratio = time_range.duration() as f64 / to_duration as f64;
        let mut result = Vec::with_capacity(self.base.segments.len() + 2);
        for seg in self.base.segments.drain(..) {
            let target = seg.target_range;
            if time_range.end <= target.start || target.end <= time_range.start {
                result.push(seg);
            } else if time_range.start <= target.start && target.end <= time_range.end {
                let mut seg = seg;
                scale_segment(&mut seg, ratio);
                result.push(seg);
            } else if target.start <= time_range.start && time_range.end <= target.end {
                let (left, middle, right) = split_contained(&seg, time_range, true);
                let mut middle = middle.expect("middle requested");
                scale_segment(&mut middle, ratio);
                result.push(left);
                result.push(middle);
                result.push(right);
            } else {
                let (kept, middle) = split_overlapping(&seg, time_range, true);
                let mut middle = middle.expect("middle requested");
                scale_segment(&mut middle, ratio);
                if kept.target_range.start < middle.target_range.start {
                    result.push(kept);
                    result.push(middle);
                } else {
                    result.push(middle);
                    result.push(kept);
                }
            }
        }
        self.base.segments = result;
        sort_segments(&mut self.base.segments);
    }

    /// Declare a linear volume ramp over `for_time_range`, truncating or
    /// splitting any previously declared ramps it overlaps. Volumes are not
    /// clamped here; the envelope stage clamps negatives at playback.
    pub fn set_volume_ramp(
        &mut self,
        from_start_volume: f32,
        to_end_volume: f32,
        for_time_range: TimeRange,
    ) {
        if !for_time_range.is_valid() {
            return;
        }
        let mut result = Vec::with_capacity(self.volume_ramps.len() + 2);
        for mut ramp in self.volume_ramps.drain(..) {
            let range = ramp.range;
            if for_time_range.end <= range.start || range.end <= for_time_range.start {
                result.push(ramp);
            } else if for_time_range.start <= range.start && range.end <= for_time_range.end {
                // fully covered by the new ramp: dropped
            } else if range.start < for_time_range.start && for_time_range.end < range.end {
                // new ramp punches a hole; both pieces keep the old volumes
                let tail = VolumeRamp {
                    range: TimeRange::new(for_time_range.end, range.end),
                    ..ramp
                };
                ramp.range.end = for_time_range.start;
                result.push(ramp);
                result.push(tail);
            } else if range.start < for_time_range.start && for_time_range.start < range.end {
                ramp.range.end = for_time_range.start;
                result.push(ramp);
            } else {
                ramp.range.start = for_time_range.end;
                result.push(ramp);
            }
        }
        result.push(VolumeRamp {
            range: for_time_range,
            start_volume: from_start_volume,
            end_volume: to_end_volume,
        });
        result.sort_by_key(|ramp| ramp.range.start);
        self.volume_ramps = result;
    }
}

/// Reassign target ranges sequentially from zero, preserving durations and
/// order. This is what closes gaps after removals and spreads rescales.
fn sort_segments(segments: &mut [AudioTrackSegment]) {
    let mut start = 0;
    for seg in segments.iter_mut() {
        let duration = seg.target_range.duration();
        seg.target_range = TimeRange::new(start, start + duration);
        start = seg.target_range.end;
    }
}

fn scale_segment(seg: &mut AudioTrackSegment, ratio: f64) {
    let target = seg.target_range;
    let duration = target.duration() as f64 / ratio;
    seg.target_range = TimeRange::new(target.start, (target.start as f64 + duration) as i64);
}

/// Split `seg` (whose target contains `range`) into the part before `range`,
/// optionally the part inside it, and the part after it.
fn split_contained(
    seg: &AudioTrackSegment,
    range: TimeRange,
    with_middle: bool,
) -> (
    AudioTrackSegment,
    Option<AudioTrackSegment>,
    AudioTrackSegment,
) {
    let source = seg.source_range;
    let target = seg.target_range;
    let part = |part_target: TimeRange| {
        AudioTrackSegment::new(
            seg.source.clone(),
            seg.source_track_id,
            TimeRange::new(
                map_time(part_target.start, source, target),
                map_time(part_target.end, source, target),
            ),
            part_target,
        )
    };
    let left = part(TimeRange::new(target.start, range.start));
    let middle = with_middle.then(|| part(range));
    let right = part(TimeRange::new(range.end, target.end));
    (left, middle, right)
}

/// Truncate `seg` (whose target overlaps one edge of `range`) to the part
/// outside `range`, optionally also producing the overlapping part.
fn split_overlapping(
    seg: &AudioTrackSegment,
    range: TimeRange,
    with_middle: bool,
) -> (AudioTrackSegment, Option<AudioTrackSegment>) {
    let source = seg.source_range;
    let target = seg.target_range;
    let part = |part_target: TimeRange| {
        AudioTrackSegment::new(
            seg.source.clone(),
            seg.source_track_id,
            TimeRange::new(
                map_time(part_target.start, source, target),
                map_time(part_target.end, source, target),
            ),
            part_target,
        )
    };
    let overlaps_start = target.start < range.start && range.start < target.end;
    let kept = if overlaps_start {
        part(TimeRange::new(target.start, range.start))
    } else {
        part(TimeRange::new(range.end, target.end))
    };
    let middle = with_middle.then(|| {
        if overlaps_start {
            part(TimeRange::new(range.start, target.end))
        } else {
            part(TimeRange::new(target.start, range.end))
        }
    });
    (kept, middle)
}

fn insert_segments(
    segments: &mut Vec<AudioTrackSegment>,
    new_segments: Vec<AudioTrackSegment>,
    at_time: i64,
) {
    if segments.is_empty() {
        if at_time > 0 {
            segments.push(AudioTrackSegment::empty(TimeRange::new(0, at_time)));
        }
        segments.extend(new_segments);
        sort_segments(segments);
        return;
    }
    if at_time == 0 {
        let mut merged = new_segments;
        merged.append(segments);
        *segments = merged;
        sort_segments(segments);
        return;
    }
    let last_end = segments.last().expect("non-empty").target_range.end;
    if last_end == at_time {
        segments.extend(new_segments);
        sort_segments(segments);
        return;
    }
    if last_end < at_time {
        segments.push(AudioTrackSegment::empty(TimeRange::new(last_end, at_time)));
        segments.extend(new_segments);
        sort_segments(segments);
        return;
    }
    // at_time lands inside an existing segment
    let Some(index) = segments
        .iter()
        .position(|seg| seg.target_range.contains(at_time))
    else {
        return;
    };
    let mut insert_at = index;
    if segments[index].target_range.start < at_time {
        let seg = segments[index].clone();
        let split_source = map_time(at_time, seg.source_range, seg.target_range);
        segments[index].source_range = TimeRange::new(seg.source_range.start, split_source);
        segments[index].target_range = TimeRange::new(seg.target_range.start, at_time);
        segments.insert(
            index + 1,
            AudioTrackSegment::new(
                seg.source.clone(),
                seg.source_track_id,
                TimeRange::new(split_source, seg.source_range.end),
                TimeRange::new(at_time, seg.target_range.end),
            ),
        );
        insert_at = index + 1;
    }
    let tail = segments.split_off(insert_at);
    segments.extend(new_segments);
    segments.extend(tail);
    sort_segments(segments);
}
