//! CPAL output stream fed from a [`SharedPcm`] queue.
//!
//! The callback refills a small local buffer without blocking, maps the
//! pipeline channel count to the device layout, and converts s16 pipeline
//! samples to the device sample format. Underruns are filled with silence
//! and counted; the callback never waits on a condition variable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::SharedPcm;

/// Knobs and counters for the output callback.
#[derive(Clone, Default)]
pub struct PlaybackOptions {
    /// Maximum frames pulled from the queue per refill.
    pub refill_max_frames: usize,
    /// Incremented by output frames produced.
    pub played_frames: Option<Arc<AtomicU64>>,
    /// Incremented when the callback has to output silence.
    pub underrun_frames: Option<Arc<AtomicU64>>,
    pub underrun_events: Option<Arc<AtomicU64>>,
}

/// Build a CPAL output stream that plays s16 audio from `queue`.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SharedPcm>,
    opts: PlaybackOptions,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, opts),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, opts),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, opts),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, opts),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Local refill buffer so the callback touches the queue mutex once per
/// burst instead of once per sample.
struct CallbackState {
    pos: usize,
    src_channels: usize,
    src: Vec<i16>,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SharedPcm>,
    opts: PlaybackOptions,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let refill_max_frames = opts.refill_max_frames.max(1);

    let state = Arc::new(Mutex::new(CallbackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    }));

    let queue_cb = queue.clone();
    let played_frames = opts.played_frames.clone();
    let underrun_frames = opts.underrun_frames.clone();
    let underrun_events = opts.underrun_events.clone();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let state_cb = state.clone();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut st = state_cb.lock().unwrap();

            let frames = data.len() / channels_out;
            let mut filled_frames = 0usize;

            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    match queue_cb.pop_frames(refill_max_frames) {
                        Some(samples) => st.src = samples,
                        None => {
                            if let Some(events) = &underrun_events {
                                events.fetch_add(1, Ordering::Relaxed);
                            }
                            if let Some(counter) = &underrun_frames {
                                let remaining = frames.saturating_sub(frame);
                                counter.fetch_add(remaining as u64, Ordering::Relaxed);
                            }
                            for slot in data[frame * channels_out..].iter_mut() {
                                *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
                            }
                            break;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = next_sample_mapped(&mut st, channels_out, ch);
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                filled_frames += 1;
            }

            if filled_frames > 0 {
                if let Some(counter) = &played_frames {
                    counter.fetch_add(filled_frames as u64, Ordering::Relaxed);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Read one output sample for `dst_ch`, applying mono↔stereo mapping.
/// `st.pos` advances once per destination frame, after its last channel.
fn next_sample_mapped(st: &mut CallbackState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }
    let frame_start = st.pos;
    let get_src = |ch: usize, st: &CallbackState| -> f32 {
        if ch < st.src_channels && frame_start + ch < st.src.len() {
            st.src[frame_start + ch] as f32 / 32_768.0
        } else {
            0.0
        }
    };

    let out = match (st.src_channels, dst_channels) {
        (1, 1) => get_src(0, st),
        (2, 2) => get_src(dst_ch.min(1), st),
        (2, 1) => 0.5 * (get_src(0, st) + get_src(1, st)),
        (1, 2) => get_src(0, st),
        _ => get_src(dst_ch.min(st.src_channels.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_to_stereo_passthrough() {
        let mut st = CallbackState {
            pos: 0,
            src_channels: 2,
            src: vec![16_384, -16_384, 8_192, -8_192],
        };
        let left = next_sample_mapped(&mut st, 2, 0);
        let right = next_sample_mapped(&mut st, 2, 1);
        assert!((left - 0.5).abs() < 1e-4);
        assert!((right + 0.5).abs() < 1e-4);
        assert_eq!(st.pos, 2);
    }

    #[test]
    fn mono_to_stereo_duplicates() {
        let mut st = CallbackState {
            pos: 0,
            src_channels: 1,
            src: vec![16_384],
        };
        let left = next_sample_mapped(&mut st, 2, 0);
        let right = next_sample_mapped(&mut st, 2, 1);
        assert_eq!(left, right);
        assert_eq!(st.pos, 1);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let mut st = CallbackState {
            pos: 0,
            src_channels: 2,
            src: vec![16_384, 0],
        };
        let out = next_sample_mapped(&mut st, 1, 0);
        assert!((out - 0.25).abs() < 1e-4);
    }

    #[test]
    fn drained_buffer_yields_silence() {
        let mut st = CallbackState {
            pos: 0,
            src_channels: 2,
            src: Vec::new(),
        };
        assert_eq!(next_sample_mapped(&mut st, 2, 0), 0.0);
    }
}
