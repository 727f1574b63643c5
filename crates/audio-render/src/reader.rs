//! Fan-in across an asset's tracks.

use std::sync::Arc;

use audio_timeline::asset::AudioAsset;

use crate::config::AudioOutputConfig;
use crate::mixer;
use crate::pcm;
use crate::track_reader::AudioTrackReader;

/// Pulls one chunk per track per tick and mixes them down.
///
/// A tick always yields one full chunk: tracks that produce nothing are
/// omitted from the sum, and when every track is exhausted the output is a
/// full silent chunk, so callers never receive a zero-length buffer.
pub struct AudioReader {
    config: AudioOutputConfig,
    track_readers: Vec<AudioTrackReader>,
    duration_us: i64,
}

impl AudioReader {
    pub fn new(asset: &Arc<AudioAsset>, config: &AudioOutputConfig) -> Self {
        let duration_us = asset.duration();
        let track_readers = asset
            .tracks()
            .into_iter()
            .map(|track| AudioTrackReader::new(track, config))
            .collect();
        Self {
            config: *config,
            track_readers,
            duration_us,
        }
    }

    pub fn config(&self) -> &AudioOutputConfig {
        &self.config
    }

    /// Composition duration at reader construction, microseconds.
    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    pub fn track_count(&self) -> usize {
        self.track_readers.len()
    }

    /// Mix the next chunk across all tracks. Always `chunk_bytes()` long.
    pub fn read_next_chunk(&mut self) -> Vec<u8> {
        let chunks: Vec<Vec<u8>> = self
            .track_readers
            .iter_mut()
            .filter_map(|reader| reader.get_next_sample())
            .collect();
        if chunks.is_empty() {
            return pcm::silence(self.config.chunk_bytes());
        }
        mixer::mix_chunks(&chunks, self.config.chunk_bytes())
    }

    pub fn seek(&mut self, time_us: i64) {
        for reader in &mut self.track_readers {
            reader.seek(time_us);
        }
    }
}
