//! Output format shared by every pipeline stage.

/// PCM format produced by the read pipeline: interleaved s16le at a fixed
/// sample rate and channel count, sliced into fixed-size chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioOutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per output chunk.
    pub output_samples_count: usize,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            output_samples_count: 1024,
        }
    }
}

impl AudioOutputConfig {
    pub const BYTES_PER_SAMPLE: usize = 2;

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * Self::BYTES_PER_SAMPLE
    }

    /// Size of one output chunk in bytes.
    pub fn chunk_bytes(&self) -> usize {
        self.output_samples_count * self.bytes_per_frame()
    }

    /// Duration of one output chunk in microseconds.
    pub fn chunk_duration_us(&self) -> i64 {
        self.output_samples_count as i64 * 1_000_000 / self.sample_rate as i64
    }

    /// Frame-aligned byte offset for a timeline position. Negative times
    /// clamp to zero; sub-frame remainders truncate.
    pub fn time_to_bytes(&self, time_us: i64) -> u64 {
        let frames = time_us.max(0) * self.sample_rate as i64 / 1_000_000;
        frames as u64 * self.bytes_per_frame() as u64
    }

    /// Timeline position for a frame-aligned byte offset.
    pub fn bytes_to_time(&self, bytes: u64) -> i64 {
        let frames = bytes / self.bytes_per_frame() as u64;
        (frames as i64) * 1_000_000 / self.sample_rate as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioOutputConfig {
        AudioOutputConfig {
            sample_rate: 50_000,
            channels: 2,
            output_samples_count: 1_000,
        }
    }

    #[test]
    fn chunk_sizes() {
        let cfg = config();
        assert_eq!(cfg.bytes_per_frame(), 4);
        assert_eq!(cfg.chunk_bytes(), 4_000);
        assert_eq!(cfg.chunk_duration_us(), 20_000);
    }

    #[test]
    fn time_byte_round_trip_on_frame_boundaries() {
        let cfg = config();
        // 50 kHz: one frame every 20us
        assert_eq!(cfg.time_to_bytes(20_000), 1_000 * 4);
        assert_eq!(cfg.bytes_to_time(1_000 * 4), 20_000);
        assert_eq!(cfg.bytes_to_time(cfg.time_to_bytes(123_460)), 123_460);
    }

    #[test]
    fn time_to_bytes_truncates_and_clamps() {
        let cfg = config();
        // 19us is below one frame at 50 kHz
        assert_eq!(cfg.time_to_bytes(19), 0);
        assert_eq!(cfg.time_to_bytes(-5_000), 0);
    }

    #[test]
    fn default_is_cd_like_stereo() {
        let cfg = AudioOutputConfig::default();
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.channels, 2);
        assert_eq!(cfg.chunk_bytes(), 1024 * 4);
    }
}
