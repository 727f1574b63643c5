//! Session wiring: render loop → queue → output stream.
//!
//! A background thread pulls mixed chunks from an [`AudioReader`] until the
//! composition duration is covered, pushing them into a bounded [`SharedPcm`]
//! queue drained by the CPAL callback. Cancellation closes the queue early;
//! the call blocks until the queue drains or is cancelled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use cpal::traits::{DeviceTrait, StreamTrait};

use audio_timeline::asset::AudioAsset;

use crate::config::AudioOutputConfig;
use crate::device;
use crate::pcm;
use crate::playback::{self, PlaybackOptions};
use crate::queue::{self, SharedPcm};
use crate::reader::AudioReader;
use crate::status::RenderStatus;

/// Session tuning parameters.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Preferred output sample rate; the device may negotiate another, and
    /// the pipeline renders at whatever is chosen.
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per pipeline chunk.
    pub chunk_frames: usize,
    /// Queue depth in chunks.
    pub buffer_chunks: usize,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Output device substring match; default device when unset.
    pub device: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            chunk_frames: 1024,
            buffer_chunks: 8,
            refill_max_frames: 4096,
            device: None,
        }
    }
}

/// Progress signals sent by the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    Progress { position_us: i64 },
    Finished,
    Cancelled,
}

/// Optional per-session hooks.
#[derive(Clone, Default)]
pub struct PlaySessionOptions {
    /// Early-termination flag (checked once per chunk).
    pub cancel: Option<Arc<AtomicBool>>,
    /// Receives progress/completion events.
    pub events: Option<crossbeam_channel::Sender<PlayerEvent>>,
}

/// Play a composition to an output device, blocking until it finishes or is
/// cancelled.
pub fn play_asset(
    asset: &Arc<AudioAsset>,
    config: &PlayerConfig,
    opts: PlaySessionOptions,
) -> Result<RenderStatus> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, config.device.as_deref())?;
    let supported = device::pick_output_config(&device, Some(config.sample_rate))?;
    let mut stream_config: cpal::StreamConfig = supported.clone().into();
    if let Some(buffer) = device::pick_buffer_size(&supported) {
        stream_config.buffer_size = buffer;
    }
    tracing::info!(
        device = %device.description()?,
        rate_hz = stream_config.sample_rate,
        buffer_size = ?stream_config.buffer_size,
        "output device"
    );

    // Render at the negotiated device rate; source readers resample to it.
    let output = AudioOutputConfig {
        sample_rate: stream_config.sample_rate,
        channels: config.channels,
        output_samples_count: config.chunk_frames.max(1),
    };
    let mut reader = AudioReader::new(asset, &output);
    let duration_us = reader.duration_us();
    let chunk_duration = output.chunk_duration_us().max(1);
    let total_chunks = ((duration_us + chunk_duration - 1) / chunk_duration).max(0) as u64;
    tracing::info!(
        duration_us,
        tracks = reader.track_count(),
        total_chunks,
        "composition ready"
    );

    let chunk_samples = output.output_samples_count * output.channels as usize;
    let queue = Arc::new(SharedPcm::new(
        output.channels as usize,
        chunk_samples * config.buffer_chunks.max(2),
    ));

    let cancel = opts
        .cancel
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

    let render_queue = queue.clone();
    let render_cancel = cancel.clone();
    let events = opts.events;
    let render = thread::spawn(move || {
        for index in 0..total_chunks {
            if render_cancel.load(Ordering::Relaxed) {
                break;
            }
            let chunk = reader.read_next_chunk();
            let samples = pcm::decode_s16(&chunk);
            render_queue.push_blocking(&samples);
            if let Some(events) = &events {
                let position_us = ((index + 1) as i64 * chunk_duration).min(duration_us);
                let _ = events.send(PlayerEvent::Progress { position_us });
            }
        }
        render_queue.close();
        if let Some(events) = &events {
            let event = if render_cancel.load(Ordering::Relaxed) {
                PlayerEvent::Cancelled
            } else {
                PlayerEvent::Finished
            };
            let _ = events.send(event);
        }
    });

    let played_frames = Arc::new(AtomicU64::new(0));
    let underrun_frames = Arc::new(AtomicU64::new(0));
    let underrun_events = Arc::new(AtomicU64::new(0));

    let stream = playback::build_output_stream(
        &device,
        &stream_config,
        supported.sample_format(),
        &queue,
        PlaybackOptions {
            refill_max_frames: config.refill_max_frames,
            played_frames: Some(played_frames.clone()),
            underrun_frames: Some(underrun_frames.clone()),
            underrun_events: Some(underrun_events.clone()),
        },
    )?;
    stream.play()?;

    let finished = queue::wait_until_drained_or_cancelled(&queue, &cancel);
    if !finished {
        queue.close();
    }
    render.join().ok();
    drop(stream);

    Ok(RenderStatus {
        duration_us,
        sample_rate: output.sample_rate,
        channels: output.channels,
        played_frames: played_frames.load(Ordering::Relaxed),
        underrun_frames: underrun_frames.load(Ordering::Relaxed),
        underrun_events: underrun_events.load(Ordering::Relaxed),
        cancelled: !finished,
    })
}
