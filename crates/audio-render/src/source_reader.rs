//! Per-source PCM pull.
//!
//! Wraps either a demuxed file/byte source or a raw [`PcmStream`] handle and
//! emits interleaved s16le at the output config: decoded frames are channel
//! mapped, rate converted when the source rate differs, and front-truncated
//! after a seek to compensate decoder pre-roll.
//!
//! [`PcmStream`]: audio_timeline::source::PcmStream

use anyhow::{Result, anyhow};

use audio_timeline::source::{AudioSource, SharedPcmStream};

use crate::config::AudioOutputConfig;
use crate::decode::SourceDecoder;
use crate::pcm;
use crate::resample::StreamResampler;

/// One block of converted PCM handed to the segment layer.
#[derive(Clone, Debug)]
pub struct SampleFrame {
    /// Interleaved s16le at the output config.
    pub data: Vec<u8>,
    /// Presentation time of the first frame, microseconds of source time.
    pub pts: i64,
}

enum SourceInput {
    Demuxed(SourceDecoder),
    Stream(SharedPcmStream),
}

pub struct AudioSourceReader {
    input: SourceInput,
    config: AudioOutputConfig,
    src_channels: usize,
    resampler: Option<StreamResampler>,
    anchor_pts: Option<i64>,
    emitted_frames: u64,
    seek_target: Option<i64>,
    input_done: bool,
}

impl AudioSourceReader {
    pub fn new(
        source: &AudioSource,
        source_track_id: u32,
        config: &AudioOutputConfig,
    ) -> Result<Self> {
        let (input, src_rate, src_channels) = match source {
            AudioSource::File(_) | AudioSource::Bytes(_) => {
                let decoder = SourceDecoder::open(source, source_track_id)?;
                let rate = decoder.sample_rate();
                let channels = decoder.channels();
                (SourceInput::Demuxed(decoder), rate, channels)
            }
            AudioSource::Stream(stream) => {
                let (rate, channels) = {
                    let guard = stream.lock().unwrap();
                    (guard.sample_rate(), guard.channels() as usize)
                };
                (SourceInput::Stream(stream.clone()), rate, channels)
            }
            AudioSource::Empty => return Err(anyhow!("empty source")),
        };

        let resampler = if src_rate != config.sample_rate {
            Some(StreamResampler::new(
                config.sample_rate as f64 / src_rate as f64,
                config.channels as usize,
                config.output_samples_count,
            )?)
        } else {
            None
        };

        Ok(Self {
            input,
            config: *config,
            src_channels,
            resampler,
            anchor_pts: None,
            emitted_frames: 0,
            seek_target: None,
            input_done: false,
        })
    }

    pub fn seek(&mut self, time_us: i64) {
        let time_us = time_us.max(0);
        match &mut self.input {
            SourceInput::Demuxed(decoder) => decoder.seek(time_us),
            SourceInput::Stream(stream) => stream.lock().unwrap().seek(time_us),
        }
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
        self.anchor_pts = None;
        self.emitted_frames = 0;
        self.seek_target = Some(time_us);
        self.input_done = false;
    }

    /// Next block of converted PCM, or `None` once the source is drained.
    pub fn next_frame(&mut self) -> Option<SampleFrame> {
        loop {
            let (samples, pts) = self.next_converted()?;
            if samples.is_empty() {
                continue;
            }
            let mut data = pcm::f32_to_s16_bytes(&samples);
            let mut pts = pts;
            if let Some(target) = self.seek_target.take() {
                // Pre-roll compensation: decoders land before the seek point;
                // drop the lead-in when it is under one output chunk.
                if pts < target && target - pts < self.config.chunk_duration_us() {
                    let cut = self.config.time_to_bytes(target - pts) as usize;
                    if cut >= data.len() {
                        self.seek_target = Some(target);
                        continue;
                    }
                    data.drain(..cut);
                    pts = target;
                }
            }
            return Some(SampleFrame { data, pts });
        }
    }

    /// Pull converted interleaved `f32` at the output rate and channels.
    fn next_converted(&mut self) -> Option<(Vec<f32>, i64)> {
        loop {
            let converted = self.resampler.as_mut().and_then(|r| r.take_output());
            if let Some(samples) = converted {
                let pts = self.output_pts();
                self.emitted_frames += (samples.len() / self.config.channels as usize) as u64;
                return Some((samples, pts));
            }
            if self.input_done {
                return None;
            }
            match self.pull_input() {
                Some((samples, pts)) => {
                    if self.anchor_pts.is_none() {
                        self.anchor_pts = Some(pts);
                    }
                    match &mut self.resampler {
                        Some(resampler) => resampler.push(&samples),
                        None => {
                            self.emitted_frames +=
                                (samples.len() / self.config.channels as usize) as u64;
                            return Some((samples, pts));
                        }
                    }
                }
                None => {
                    self.input_done = true;
                    if let Some(resampler) = &mut self.resampler {
                        resampler.flush();
                        continue;
                    }
                    return None;
                }
            }
        }
    }

    /// Output pts after rate conversion: anchored at the first input frame
    /// since the last seek, advanced by emitted output frames.
    fn output_pts(&self) -> i64 {
        self.anchor_pts.unwrap_or(0)
            + self.emitted_frames as i64 * 1_000_000 / self.config.sample_rate as i64
    }

    /// One block of source input mapped to the output channel layout, still
    /// at the source rate.
    fn pull_input(&mut self) -> Option<(Vec<f32>, i64)> {
        let out_channels = self.config.channels as usize;
        match &mut self.input {
            SourceInput::Demuxed(decoder) => {
                let frame = decoder.next_frame()?;
                Some((
                    map_channels(&frame.samples, self.src_channels, out_channels),
                    frame.pts,
                ))
            }
            SourceInput::Stream(stream) => {
                let frame = stream.lock().unwrap().next_frame()?;
                let samples = pcm::s16_to_f32(&frame.data);
                Some((
                    map_channels(&samples, self.src_channels, out_channels),
                    frame.pts,
                ))
            }
        }
    }
}

/// Mono↔stereo mapping, best-effort clamp for other layouts.
fn map_channels(samples: &[f32], src_channels: usize, dst_channels: usize) -> Vec<f32> {
    if src_channels == dst_channels || src_channels == 0 {
        return samples.to_vec();
    }
    let frames = samples.len() / src_channels;
    let mut out = Vec::with_capacity(frames * dst_channels);
    for frame in 0..frames {
        let base = frame * src_channels;
        for ch in 0..dst_channels {
            let sample = match (src_channels, dst_channels) {
                (2, 1) => 0.5 * (samples[base] + samples[base + 1]),
                (1, 2) => samples[base],
                _ => samples[base + ch.min(src_channels - 1)],
            };
            out.push(sample);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_timeline::source::{PcmFrame, PcmStream};
    use std::sync::{Arc, Mutex};

    fn config() -> AudioOutputConfig {
        AudioOutputConfig {
            sample_rate: 50_000,
            channels: 2,
            output_samples_count: 1_000,
        }
    }

    /// Stereo stream whose sample value equals its frame index, delivered in
    /// fixed blocks. Seeks snap back to a block boundary to exercise the
    /// pre-roll truncation path.
    struct BlockStream {
        rate: u32,
        total_frames: u64,
        block_frames: u64,
        position: u64,
    }

    impl BlockStream {
        fn new(rate: u32, total_frames: u64, block_frames: u64) -> Self {
            Self {
                rate,
                total_frames,
                block_frames,
                position: 0,
            }
        }
    }

    impl PcmStream for BlockStream {
        fn sample_rate(&self) -> u32 {
            self.rate
        }
        fn channels(&self) -> u16 {
            2
        }
        fn duration(&self) -> i64 {
            self.total_frames as i64 * 1_000_000 / self.rate as i64
        }
        fn seek(&mut self, time_us: i64) {
            let frame = (time_us.max(0) as u64) * self.rate as u64 / 1_000_000;
            self.position = (frame / self.block_frames) * self.block_frames;
        }
        fn next_frame(&mut self) -> Option<PcmFrame> {
            if self.position >= self.total_frames {
                return None;
            }
            let frames = self.block_frames.min(self.total_frames - self.position);
            let mut data = Vec::with_capacity(frames as usize * 4);
            for index in 0..frames {
                let value = (self.position + index) as i16;
                data.extend_from_slice(&value.to_le_bytes());
                data.extend_from_slice(&value.to_le_bytes());
            }
            let pts = self.position as i64 * 1_000_000 / self.rate as i64;
            self.position += frames;
            Some(PcmFrame { data, pts })
        }
    }

    fn stream_source(stream: BlockStream) -> AudioSource {
        AudioSource::from_stream(Arc::new(Mutex::new(stream)))
    }

    #[test]
    fn passthrough_preserves_samples_and_pts() {
        let cfg = config();
        let source = stream_source(BlockStream::new(cfg.sample_rate, 1_000, 500));
        let mut reader = AudioSourceReader::new(&source, 0, &cfg).unwrap();

        let first = reader.next_frame().unwrap();
        assert_eq!(first.pts, 0);
        assert_eq!(first.data.len(), 500 * 4);
        let samples = pcm::decode_s16(&first.data);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[2], 1);

        let second = reader.next_frame().unwrap();
        assert_eq!(second.pts, 10_000);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn seek_truncates_pre_roll() {
        let cfg = config();
        let source = stream_source(BlockStream::new(cfg.sample_rate, 2_000, 500));
        let mut reader = AudioSourceReader::new(&source, 0, &cfg).unwrap();

        // 15ms lands mid-block; the stream snaps back to 10ms.
        reader.seek(15_000);
        let frame = reader.next_frame().unwrap();
        assert_eq!(frame.pts, 15_000);
        assert_eq!(frame.data.len(), 250 * 4);
        let samples = pcm::decode_s16(&frame.data);
        assert_eq!(samples[0], 750);
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(AudioSourceReader::new(&AudioSource::Empty, 0, &config()).is_err());
    }

    #[test]
    fn map_channels_mono_to_stereo_duplicates() {
        let out = map_channels(&[0.1, 0.2], 1, 2);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn map_channels_stereo_to_mono_averages() {
        let out = map_channels(&[0.2, 0.4, -0.2, -0.4], 2, 1);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] + 0.3).abs() < 1e-6);
    }
}
