//! Per-segment playback: one segment's worth of (possibly speed-shifted)
//! PCM, clipped to the segment's target window.
//!
//! The reading strategy is fixed at construction: direct pass-through when
//! source and target durations match, shifted through [`AudioShifting`] when
//! they differ, and a degenerate silent reader when the source is missing or
//! unreadable, so a bad segment never stalls the timeline.

use std::collections::VecDeque;

use audio_timeline::segment::AudioTrackSegment;
use audio_timeline::time::{TimeRange, map_time};

use crate::config::AudioOutputConfig;
use crate::pcm;
use crate::shifting::AudioShifting;
use crate::source_reader::AudioSourceReader;

enum Strategy {
    Direct {
        source: AudioSourceReader,
    },
    Shifted {
        source: AudioSourceReader,
        shifting: AudioShifting,
        source_eos: bool,
    },
    Silent,
}

pub struct AudioSegmentReader {
    config: AudioOutputConfig,
    source_range: TimeRange,
    target_range: TimeRange,
    /// Absolute timeline byte offsets derived from the target range.
    start_offset: u64,
    end_offset: u64,
    current_offset: u64,
    pending: VecDeque<u8>,
    strategy: Strategy,
}

impl AudioSegmentReader {
    /// Never fails: unreadable sources fall back to the silent strategy.
    pub fn new(segment: &AudioTrackSegment, config: &AudioOutputConfig) -> Self {
        let start_offset = config.time_to_bytes(segment.target_range.start);
        let end_offset = config.time_to_bytes(segment.target_range.end);
        let strategy = build_strategy(segment, config);
        Self {
            config: *config,
            source_range: segment.source_range,
            target_range: segment.target_range,
            start_offset,
            end_offset,
            current_offset: start_offset,
            pending: VecDeque::new(),
            strategy,
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Next span of PCM, at most one chunk, clipped to the segment end.
    ///
    /// Always yields data while inside the segment: source underruns are
    /// zero-filled so the timeline keeps advancing. `None` marks the end of
    /// the segment, not an error.
    pub fn read_next(&mut self) -> Option<Vec<u8>> {
        if self.current_offset >= self.end_offset {
            return None;
        }
        let remaining = (self.end_offset - self.current_offset) as usize;
        let want = remaining.min(self.config.chunk_bytes());
        if self.pending.is_empty() {
            self.refill(want);
        }
        let take = want.min(self.pending.len());
        let out: Vec<u8> = self.pending.drain(..take).collect();
        self.current_offset += out.len() as u64;
        Some(out)
    }

    /// Reposition inside the segment. The target time maps linearly to
    /// source time; underlying decode and shifting state start over.
    pub fn seek(&mut self, time_us: i64) {
        let clamped = time_us.clamp(self.target_range.start, self.target_range.end);
        self.seek_to_offset(self.config.time_to_bytes(clamped));
    }

    pub(crate) fn seek_to_offset(&mut self, offset: u64) {
        self.current_offset = offset.clamp(self.start_offset, self.end_offset);
        self.pending.clear();
        let target_time = self
            .config
            .bytes_to_time(self.current_offset)
            .clamp(self.target_range.start, self.target_range.end);
        let source_time = map_time(target_time, self.source_range, self.target_range);
        match &mut self.strategy {
            Strategy::Direct { source } => source.seek(source_time),
            Strategy::Shifted {
                source,
                shifting,
                source_eos,
            } => {
                shifting.reset();
                *source_eos = false;
                source.seek(source_time);
            }
            Strategy::Silent => {}
        }
    }

    fn refill(&mut self, want: usize) {
        match &mut self.strategy {
            Strategy::Silent => self.pending.extend(pcm::silence(want)),
            Strategy::Direct { source } => match source.next_frame() {
                Some(frame) if !frame.data.is_empty() => self.pending.extend(frame.data),
                _ => self.pending.extend(pcm::silence(want)),
            },
            Strategy::Shifted {
                source,
                shifting,
                source_eos,
            } => loop {
                if let Some(bytes) = shifting.read_audio_bytes() {
                    if !bytes.is_empty() {
                        self.pending.extend(bytes);
                        break;
                    }
                }
                if *source_eos {
                    self.pending.extend(pcm::silence(want));
                    break;
                }
                match source.next_frame() {
                    Some(frame) => {
                        shifting.send_audio_bytes(&frame.data);
                    }
                    None => {
                        *source_eos = true;
                        shifting.send_input_eos();
                    }
                }
            },
        }
    }
}

fn build_strategy(segment: &AudioTrackSegment, config: &AudioOutputConfig) -> Strategy {
    if segment.is_empty() || segment.source.is_empty() {
        return Strategy::Silent;
    }
    match AudioSourceReader::new(&segment.source, segment.source_track_id, config) {
        Ok(mut source) => {
            source.seek(segment.source_range.start);
            if segment.source_range.duration() == segment.target_range.duration() {
                Strategy::Direct { source }
            } else {
                let mut shifting = AudioShifting::new(config);
                shifting.set_speed(segment.speed());
                Strategy::Shifted {
                    source,
                    shifting,
                    source_eos: false,
                }
            }
        }
        Err(err) => {
            tracing::warn!("segment source unavailable, substituting silence: {err:#}");
            Strategy::Silent
        }
    }
}
