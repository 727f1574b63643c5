//! Gain envelope across a track's volume ramps.
//!
//! Built once per track reader from the sorted ramp list. Each output chunk
//! asks the state machine for a `(current, target)` gain pair: outside all
//! ramps the gain holds flat, inside a ramp it advances one linear step per
//! chunk until the ramp's target is reached. Gains are applied per sample
//! with rounding and saturation to the 16-bit range; a ramp whose start and
//! end volumes match collapses to a single flat step ("fast mode").

use audio_timeline::track::VolumeRamp;

use crate::config::AudioOutputConfig;

const VOLUME_EPSILON: f32 = 1e-6;

fn float_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < VOLUME_EPSILON
}

/// Gains of exactly 1.0 (and invalid negatives) skip processing entirely.
fn gain_applies(gain: f32) -> bool {
    gain >= 0.0 && !float_eq(gain, 1.0)
}

#[derive(Clone, Copy, Debug)]
struct VolumeControlInfo {
    start_time: i64,
    end_time: i64,
    start_volume: f32,
    target_volume: f32,
    total_frame_number: i32,
}

pub struct AudioSmoothVolume {
    infos: Vec<VolumeControlInfo>,
    channels: usize,
    current_volume_index: usize,
    current_volume: f32,
    update_gain_gap: bool,
    volume_gap_in_frame: f32,
}

impl AudioSmoothVolume {
    /// `None` when the track declares no ramps (no envelope to apply).
    pub fn make(ramps: &[VolumeRamp], config: &AudioOutputConfig) -> Option<Self> {
        if ramps.is_empty() {
            return None;
        }
        let frame_duration =
            config.output_samples_count as f64 * 1_000_000.0 / config.sample_rate as f64;
        let infos = ramps
            .iter()
            .map(|ramp| {
                let mut total =
                    (ramp.range.duration() as f64 / frame_duration) as i32;
                if total <= 0 {
                    total = 1;
                }
                if float_eq(ramp.start_volume, ramp.end_volume) {
                    // fast mode: no interpolation worth doing
                    total = 1;
                }
                VolumeControlInfo {
                    start_time: ramp.range.start,
                    end_time: ramp.range.end,
                    start_volume: ramp.start_volume.max(0.0),
                    target_volume: ramp.end_volume.max(0.0),
                    total_frame_number: total,
                }
            })
            .collect();
        Some(Self {
            infos,
            channels: config.channels as usize,
            current_volume_index: 0,
            current_volume: 1.0,
            update_gain_gap: true,
            volume_gap_in_frame: 0.0,
        })
    }

    /// Apply the envelope to one chunk starting at `time`.
    pub fn process(&mut self, time: i64, data: &mut [u8]) {
        if data.is_empty() || time < 0 {
            return;
        }
        let (current_gain, target_gain) = self.advance(time);
        apply_gain_range(data, self.channels, current_gain, target_gain);
    }

    /// Recompute the envelope position for `time` from the ramp list instead
    /// of replaying history.
    pub fn seek(&mut self, time: i64) {
        self.current_volume_index = 0;
        self.current_volume = 1.0;
        self.update_gain_gap = true;
        self.volume_gap_in_frame = 0.0;
        if time < 0 {
            return;
        }
        for (index, info) in self.infos.iter().enumerate() {
            if info.end_time < time {
                self.current_volume_index = (index + 1).min(self.infos.len() - 1);
                self.current_volume = info.target_volume;
            } else if info.start_time <= time && info.end_time > info.start_time {
                self.current_volume = (info.target_volume - info.start_volume)
                    * (time - info.start_time) as f32
                    / (info.end_time - info.start_time) as f32
                    + info.start_volume;
                self.volume_gap_in_frame =
                    (info.target_volume - info.start_volume) / info.total_frame_number as f32;
                self.update_gain_gap = false;
            }
        }
    }

    /// One state-machine step; returns the `(current, target)` gain pair for
    /// the chunk at `input_pts`.
    fn advance(&mut self, input_pts: i64) -> (f32, f32) {
        let last = self.infos.len() - 1;
        if input_pts < self.infos[self.current_volume_index].start_time
            || input_pts > self.infos[last].end_time
        {
            return (self.current_volume, self.current_volume);
        }

        let mut in_active_ramp = false;
        if input_pts > self.infos[self.current_volume_index].end_time {
            // guarded above: input_pts <= last ramp's end, so index+1 exists
            self.current_volume_index += 1;
            if input_pts >= self.infos[self.current_volume_index].start_time {
                in_active_ramp = true;
                self.update_gain_gap = true;
            }
        } else if input_pts >= self.infos[self.current_volume_index].start_time {
            in_active_ramp = true;
        }

        if !in_active_ramp {
            self.update_gain_gap = true;
            return (self.current_volume, self.current_volume);
        }

        let info = self.infos[self.current_volume_index];
        if !self.update_gain_gap && float_eq(info.target_volume, self.current_volume) {
            // ramp already reached its target
            self.update_gain_gap = true;
            return (self.current_volume, self.current_volume);
        }
        if self.update_gain_gap {
            self.current_volume = info.start_volume;
            self.volume_gap_in_frame =
                (info.target_volume - self.current_volume) / info.total_frame_number as f32;
            self.update_gain_gap = false;
        }
        let current_gain = self.current_volume;
        let target_gain = (self.current_volume + self.volume_gap_in_frame).max(0.0);
        self.current_volume = target_gain;
        (current_gain, target_gain)
    }
}

/// Apply a flat or linearly interpolated gain across one chunk.
fn apply_gain_range(data: &mut [u8], channels: usize, current_gain: f32, target_gain: f32) {
    if float_eq(current_gain, target_gain) {
        if current_gain == 1.0 {
            return;
        }
        apply_flat_gain(current_gain, data);
        return;
    }
    let sample_count = data.len() / 2;
    let frames = sample_count / channels.max(1);
    if frames == 0 {
        return;
    }
    let gain_step = (target_gain - current_gain) as f64 / frames as f64;
    if float_eq(gain_step as f32, 0.0) {
        apply_flat_gain(target_gain, data);
        return;
    }
    for frame in 0..frames {
        let gain = current_gain as f64 + (frame as f64 + 1.0) * gain_step;
        for ch in 0..channels {
            let index = (frame * channels + ch) * 2;
            let sample = i16::from_le_bytes([data[index], data[index + 1]]);
            let scaled = (sample as f64 * gain) as i32;
            let clamped = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            data[index..index + 2].copy_from_slice(&clamped.to_le_bytes());
        }
    }
}

/// Saturating rounded multiply of every sample by `gain`.
fn apply_flat_gain(gain: f32, data: &mut [u8]) {
    if !gain_applies(gain) {
        return;
    }
    for pair in data.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let rounding = if sample >= 0 { 0.5f32 } else { -0.5f32 };
        let scaled = (sample as f32 * gain + rounding) as i32;
        let clamped = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        pair.copy_from_slice(&clamped.to_le_bytes());
    }
}
