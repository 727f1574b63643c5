//! Track-level chunk production: stitches segment output into fixed-size
//! chunks and applies the volume envelope.
//!
//! The reader never holds an index into the track's segment list. Before
//! every pull it re-resolves the segment covering the current position under
//! the track lock, so edits made between chunks are picked up and a stale
//! segment reader is rebuilt. The byte cache smooths uneven segment-reader
//! output into exact chunk slices.

use std::collections::VecDeque;

use audio_timeline::asset::SharedTrack;
use audio_timeline::segment::AudioTrackSegment;

use crate::config::AudioOutputConfig;
use crate::segment_reader::AudioSegmentReader;
use crate::smooth_volume::AudioSmoothVolume;

/// Cache depth in output chunks.
const CACHE_CHUNKS: usize = 6;

struct CurrentSegment {
    segment: AudioTrackSegment,
    reader: AudioSegmentReader,
}

pub struct AudioTrackReader {
    track: SharedTrack,
    config: AudioOutputConfig,
    cache: VecDeque<u8>,
    /// Byte position up to which segment data has been pulled.
    read_position: u64,
    /// Byte position of the next chunk handed to the caller.
    emit_position: u64,
    current: Option<CurrentSegment>,
    smooth_volume: Option<AudioSmoothVolume>,
}

impl AudioTrackReader {
    pub fn new(track: SharedTrack, config: &AudioOutputConfig) -> Self {
        let smooth_volume = {
            let guard = track.lock().unwrap();
            AudioSmoothVolume::make(guard.volume_ramps(), config)
        };
        Self {
            track,
            config: *config,
            cache: VecDeque::with_capacity(config.chunk_bytes() * CACHE_CHUNKS),
            read_position: 0,
            emit_position: 0,
            current: None,
            smooth_volume,
        }
    }

    /// Produce the next chunk, volume-shaped when the track declares ramps.
    ///
    /// Returns a short final chunk at the end of the track, and `None` once
    /// no segment covers the current position and the cache is drained; the
    /// track is exhausted, which is not an error.
    pub fn get_next_sample(&mut self) -> Option<Vec<u8>> {
        let chunk = self.config.chunk_bytes();
        while self.cache.len() < chunk {
            if !self.fill_once() {
                break;
            }
        }
        if self.cache.is_empty() {
            return None;
        }
        let take = chunk.min(self.cache.len());
        let mut out: Vec<u8> = self.cache.drain(..take).collect();
        let time = self.config.bytes_to_time(self.emit_position);
        self.emit_position += take as u64;
        if let Some(volume) = &mut self.smooth_volume {
            volume.process(time, &mut out);
        }
        Some(out)
    }

    /// Reposition the whole reader; segment and envelope state rebuild from
    /// the new time.
    pub fn seek(&mut self, time_us: i64) {
        let position = self.config.time_to_bytes(time_us.max(0));
        self.read_position = position;
        self.emit_position = position;
        self.cache.clear();
        self.current = None;
        if let Some(volume) = &mut self.smooth_volume {
            volume.seek(time_us.max(0));
        }
    }

    /// Timeline position of the next chunk to be emitted.
    pub fn current_time(&self) -> i64 {
        self.config.bytes_to_time(self.emit_position)
    }

    /// Pull one span from the segment under `read_position` into the cache.
    /// Returns `false` when no segment covers the position.
    fn fill_once(&mut self) -> bool {
        let Some(segment) = self.resolve_segment() else {
            return false;
        };
        let stale = match &self.current {
            Some(current) => current.segment != segment,
            None => true,
        };
        if stale {
            let mut reader = AudioSegmentReader::new(&segment, &self.config);
            reader.seek_to_offset(self.read_position);
            self.current = Some(CurrentSegment { segment, reader });
        }
        let current = self.current.as_mut().expect("resolved above");
        match current.reader.read_next() {
            Some(data) => {
                self.read_position += data.len() as u64;
                self.cache.extend(data);
            }
            None => {
                // segment drained: step past it, keeping forward progress
                self.read_position = current
                    .reader
                    .end_offset()
                    .max(self.read_position + self.config.bytes_per_frame() as u64);
                self.current = None;
            }
        }
        true
    }

    /// Find the segment whose target byte range covers `read_position`.
    /// Positions only move forward between seeks, so earlier segments are
    /// never replayed.
    fn resolve_segment(&self) -> Option<AudioTrackSegment> {
        let guard = self.track.lock().unwrap();
        guard
            .segments()
            .iter()
            .find(|seg| {
                let start = self.config.time_to_bytes(seg.target_range.start);
                let end = self.config.time_to_bytes(seg.target_range.end);
                start <= self.read_position && self.read_position < end
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm;
    use audio_timeline::source::{AudioSource, PcmFrame, PcmStream};
    use audio_timeline::time::TimeRange;
    use audio_timeline::track::AudioCompositionTrack;
    use std::sync::{Arc, Mutex};

    fn config() -> AudioOutputConfig {
        AudioOutputConfig {
            sample_rate: 50_000,
            channels: 2,
            output_samples_count: 1_000,
        }
    }

    struct ConstStream {
        total_frames: u64,
        position: u64,
        value: i16,
    }

    impl PcmStream for ConstStream {
        fn sample_rate(&self) -> u32 {
            50_000
        }
        fn channels(&self) -> u16 {
            2
        }
        fn duration(&self) -> i64 {
            self.total_frames as i64 * 1_000_000 / 50_000
        }
        fn seek(&mut self, time_us: i64) {
            self.position = (time_us.max(0) as u64) * 50_000 / 1_000_000;
        }
        fn next_frame(&mut self) -> Option<PcmFrame> {
            if self.position >= self.total_frames {
                return None;
            }
            let frames = 400.min(self.total_frames - self.position);
            let pts = self.position as i64 * 1_000_000 / 50_000;
            self.position += frames;
            Some(PcmFrame {
                data: pcm::encode_s16(&vec![self.value; frames as usize * 2]),
                pts,
            })
        }
    }

    fn const_source(value: i16, frames: u64) -> AudioSource {
        AudioSource::from_stream(Arc::new(Mutex::new(ConstStream {
            total_frames: frames,
            position: 0,
            value,
        })))
    }

    fn shared(track: AudioCompositionTrack) -> SharedTrack {
        Arc::new(Mutex::new(track))
    }

    #[test]
    fn empty_track_yields_no_data() {
        let cfg = config();
        let mut reader = AudioTrackReader::new(shared(AudioCompositionTrack::new(0)), &cfg);
        assert!(reader.get_next_sample().is_none());
    }

    #[test]
    fn chunks_cover_the_track_then_none() {
        let cfg = config();
        // 50ms of audio = 2.5 chunks
        let mut track = AudioCompositionTrack::new(0);
        track.add_segment(audio_timeline::segment::AudioTrackSegment::new(
            const_source(900, 2_500),
            0,
            TimeRange::new(0, 50_000),
            TimeRange::new(0, 50_000),
        ));
        let mut reader = AudioTrackReader::new(shared(track), &cfg);

        let first = reader.get_next_sample().unwrap();
        assert_eq!(first.len(), cfg.chunk_bytes());
        assert!(pcm::decode_s16(&first).iter().all(|s| *s == 900));
        let second = reader.get_next_sample().unwrap();
        assert_eq!(second.len(), cfg.chunk_bytes());
        let tail = reader.get_next_sample().unwrap();
        assert_eq!(tail.len(), cfg.chunk_bytes() / 2);
        assert!(reader.get_next_sample().is_none());
    }

    #[test]
    fn placeholder_gap_plays_silence_between_segments() {
        let cfg = config();
        let mut track = AudioCompositionTrack::new(0);
        track.add_segment(audio_timeline::segment::AudioTrackSegment::new(
            const_source(700, 1_000),
            0,
            TimeRange::new(0, 20_000),
            TimeRange::new(0, 20_000),
        ));
        track.add_segment(audio_timeline::segment::AudioTrackSegment::empty(
            TimeRange::new(20_000, 40_000),
        ));
        track.add_segment(audio_timeline::segment::AudioTrackSegment::new(
            const_source(300, 1_000),
            0,
            TimeRange::new(0, 20_000),
            TimeRange::new(40_000, 60_000),
        ));
        let mut reader = AudioTrackReader::new(shared(track), &cfg);

        let first = reader.get_next_sample().unwrap();
        assert!(pcm::decode_s16(&first).iter().all(|s| *s == 700));
        let gap = reader.get_next_sample().unwrap();
        assert!(gap.iter().all(|b| *b == 0));
        let third = reader.get_next_sample().unwrap();
        assert!(pcm::decode_s16(&third).iter().all(|s| *s == 300));
        assert!(reader.get_next_sample().is_none());
    }

    #[test]
    fn seek_restarts_from_the_new_position() {
        let cfg = config();
        let mut track = AudioCompositionTrack::new(0);
        track.add_segment(audio_timeline::segment::AudioTrackSegment::new(
            const_source(550, 3_000),
            0,
            TimeRange::new(0, 60_000),
            TimeRange::new(0, 60_000),
        ));
        let mut reader = AudioTrackReader::new(shared(track), &cfg);
        let _ = reader.get_next_sample().unwrap();
        reader.seek(40_000);
        assert_eq!(reader.current_time(), 40_000);
        let chunk = reader.get_next_sample().unwrap();
        assert_eq!(chunk.len(), cfg.chunk_bytes());
        assert!(reader.get_next_sample().is_none());
    }

    #[test]
    fn flat_ramp_scales_chunks() {
        let cfg = config();
        let mut track = AudioCompositionTrack::new(0);
        track.add_segment(audio_timeline::segment::AudioTrackSegment::new(
            const_source(10_000, 1_000),
            0,
            TimeRange::new(0, 20_000),
            TimeRange::new(0, 20_000),
        ));
        track.set_volume_ramp(0.5, 0.5, TimeRange::new(0, 20_000));
        let mut reader = AudioTrackReader::new(shared(track), &cfg);
        let chunk = reader.get_next_sample().unwrap();
        assert!(pcm::decode_s16(&chunk).iter().all(|s| *s == 5_000));
    }

    #[test]
    fn edits_after_reader_creation_are_picked_up() {
        let cfg = config();
        let mut track = AudioCompositionTrack::new(0);
        track.add_segment(audio_timeline::segment::AudioTrackSegment::new(
            const_source(123, 2_000),
            0,
            TimeRange::new(0, 40_000),
            TimeRange::new(0, 40_000),
        ));
        let track = shared(track);
        let mut reader = AudioTrackReader::new(track.clone(), &cfg);
        let _ = reader.get_next_sample().unwrap();
        // drop the unread tail of the track mid-playback
        track
            .lock()
            .unwrap()
            .remove_time_range(TimeRange::new(20_000, 40_000));
        let _ = reader.get_next_sample();
        assert!(reader.get_next_sample().is_none());
    }
}
