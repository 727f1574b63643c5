//! Speed/pitch/volume shifting of a PCM stream.
//!
//! Contract mirrors the DSP kernel it stands in for: set the factors, feed
//! PCM bytes, flush at end of stream, pull shifted bytes back out. A speed
//! factor above 1.0 compresses time (fewer output samples). Implemented over
//! the shared [`StreamResampler`]; volume is a saturating scale on output.

use crate::config::AudioOutputConfig;
use crate::pcm;
use crate::resample::StreamResampler;

pub struct AudioShifting {
    config: AudioOutputConfig,
    speed: f64,
    pitch: f64,
    volume: f32,
    resampler: Option<StreamResampler>,
    init_failed: bool,
}

impl AudioShifting {
    pub fn new(config: &AudioOutputConfig) -> Self {
        Self {
            config: *config,
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            resampler: None,
            init_failed: false,
        }
    }

    /// Non-positive factors are ignored. Takes effect from the next sent
    /// bytes; already-buffered output is unaffected.
    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
            self.resampler = None;
            self.init_failed = false;
        }
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        if pitch > 0.0 {
            self.pitch = pitch;
            self.resampler = None;
            self.init_failed = false;
        }
    }

    /// Negative volumes clamp to silence.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Queue s16le input; returns the number of shifted samples now ready.
    pub fn send_audio_bytes(&mut self, pcm_bytes: &[u8]) -> usize {
        let samples = pcm::s16_to_f32(pcm_bytes);
        match self.resampler() {
            Some(resampler) => {
                resampler.push(&samples);
                resampler.ready_samples()
            }
            None => 0,
        }
    }

    /// Flush the trailing partial block; returns ready sample count.
    pub fn send_input_eos(&mut self) -> usize {
        match self.resampler() {
            Some(resampler) => {
                resampler.flush();
                resampler.ready_samples()
            }
            None => 0,
        }
    }

    /// Drain shifted output as s16le bytes, `None` when nothing is ready.
    pub fn read_audio_bytes(&mut self) -> Option<Vec<u8>> {
        let volume = self.volume;
        let samples = self.resampler.as_mut()?.take_output()?;
        if (volume - 1.0).abs() < f32::EPSILON {
            Some(pcm::f32_to_s16_bytes(&samples))
        } else {
            let scaled: Vec<f32> = samples.iter().map(|s| s * volume).collect();
            Some(pcm::f32_to_s16_bytes(&scaled))
        }
    }

    pub fn available_samples(&self) -> usize {
        self.resampler
            .as_ref()
            .map(|r| r.ready_samples())
            .unwrap_or(0)
    }

    /// Discard buffered state so the stream can continue from a new position.
    pub fn reset(&mut self) {
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
    }

    fn ratio(&self) -> f64 {
        1.0 / (self.speed * self.pitch)
    }

    fn resampler(&mut self) -> Option<&mut StreamResampler> {
        if self.resampler.is_none() && !self.init_failed {
            match StreamResampler::new(
                self.ratio(),
                self.config.channels as usize,
                self.config.output_samples_count,
            ) {
                Ok(resampler) => self.resampler = Some(resampler),
                Err(err) => {
                    tracing::error!("shifting resampler init error: {err:#}");
                    self.init_failed = true;
                }
            }
        }
        self.resampler.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioOutputConfig {
        AudioOutputConfig {
            sample_rate: 50_000,
            channels: 2,
            output_samples_count: 256,
        }
    }

    #[test]
    fn double_speed_roughly_halves_output() {
        let mut shifting = AudioShifting::new(&config());
        shifting.set_speed(2.0);
        let input = pcm::silence(256 * 4 * 16); // 4096 frames
        shifting.send_audio_bytes(&input);
        shifting.send_input_eos();
        let mut out_frames = 0usize;
        while let Some(bytes) = shifting.read_audio_bytes() {
            assert!(bytes.iter().all(|b| *b == 0));
            out_frames += bytes.len() / 4;
        }
        assert!(out_frames > 0);
        // 4096 input frames at speed 2 target ~2048 output frames; the sinc
        // filter keeps some tail latency inside.
        assert!(out_frames <= 2048 + 256, "too many frames: {out_frames}");
        assert!(out_frames >= 2048 - 512, "too few frames: {out_frames}");
    }

    #[test]
    fn read_before_send_yields_nothing() {
        let mut shifting = AudioShifting::new(&config());
        shifting.set_speed(2.0);
        assert!(shifting.read_audio_bytes().is_none());
        assert_eq!(shifting.available_samples(), 0);
    }

    #[test]
    fn non_positive_factors_are_ignored() {
        let mut shifting = AudioShifting::new(&config());
        shifting.set_speed(0.0);
        shifting.set_speed(-1.0);
        assert_eq!(shifting.speed(), 1.0);
    }

    #[test]
    fn negative_volume_clamps_to_silence() {
        let mut shifting = AudioShifting::new(&config());
        shifting.set_volume(-0.5);
        shifting.set_speed(1.0);
        let input = pcm::encode_s16(&vec![8_000i16; 256 * 2 * 8]);
        shifting.send_audio_bytes(&input);
        shifting.send_input_eos();
        let bytes = shifting.read_audio_bytes().unwrap();
        assert!(pcm::decode_s16(&bytes).iter().all(|s| *s == 0));
    }
}
