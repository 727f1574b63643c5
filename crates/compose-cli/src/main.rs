//! Timeline compositor CLI.
//!
//! `play` builds an in-memory composition from the input files (one
//! composition track per source track, placed back to back or overlaid),
//! optionally rescales it and declares fade ramps, then mixes everything
//! down to one PCM stream played via CPAL. `probe` prints track metadata.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use audio_render::device;
use audio_render::player::{self, PlaySessionOptions, PlayerConfig, PlayerEvent};
use audio_timeline::asset::AudioAsset;
use audio_timeline::cache::AssetCache;
use audio_timeline::probe::probe_source;
use audio_timeline::source::AudioSource;
use audio_timeline::time::TimeRange;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match &args.cmd {
        cli::Command::Devices => device::list_devices(&cpal::default_host()),
        cli::Command::Probe { path } => probe_one(path),
        cli::Command::Play {
            files,
            overlay,
            speed,
            fade_in,
            fade_out,
            json,
        } => play(
            &args,
            files,
            *overlay,
            *speed,
            *fade_in,
            *fade_out,
            *json,
        ),
    }
}

fn probe_one(path: &PathBuf) -> Result<()> {
    let source = AudioSource::from_path(path);
    let tracks = probe_source(&source).with_context(|| format!("probe {path:?}"))?;
    if tracks.is_empty() {
        println!("no audio tracks");
        return Ok(());
    }
    for info in tracks {
        println!(
            "track #{}: {} {} Hz, {} ch, {:.3} s",
            info.track_id,
            info.codec.as_deref().unwrap_or("unknown"),
            info.sample_rate.unwrap_or(0),
            info.channels.unwrap_or(0),
            info.duration_us as f64 / 1_000_000.0
        );
    }
    Ok(())
}

fn play(
    args: &cli::Args,
    files: &[PathBuf],
    overlay: bool,
    speed: Option<f64>,
    fade_in: Option<f64>,
    fade_out: Option<f64>,
    json: bool,
) -> Result<()> {
    anyhow::ensure!(!files.is_empty(), "no input files");

    let cache = AssetCache::new();
    let composition = build_composition(&cache, files, overlay)?;
    anyhow::ensure!(
        composition.track_count() > 0,
        "none of the inputs produced audio tracks"
    );

    if let Some(speed) = speed {
        apply_speed(&composition, speed);
    }
    apply_fades(&composition, fade_in, fade_out);
    tracing::info!(
        tracks = composition.track_count(),
        duration_s = composition.duration() as f64 / 1_000_000.0,
        "composition built"
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || {
            cancel.store(true, Ordering::Relaxed);
        });
    }

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let progress = std::thread::spawn(move || {
        let mut last_logged = -1i64;
        while let Ok(event) = events_rx.recv() {
            match event {
                PlayerEvent::Progress { position_us } => {
                    let second = position_us / 1_000_000;
                    if second != last_logged {
                        last_logged = second;
                        tracing::info!(position_s = second, "playing");
                    }
                }
                PlayerEvent::Finished => {
                    tracing::info!("playback finished");
                    break;
                }
                PlayerEvent::Cancelled => {
                    tracing::info!("playback cancelled");
                    break;
                }
            }
        }
    });

    let config = PlayerConfig {
        sample_rate: args.sample_rate,
        channels: args.channels,
        chunk_frames: args.chunk_frames,
        buffer_chunks: args.buffer_chunks,
        refill_max_frames: args.refill_max_frames,
        device: args.device.clone(),
    };
    let status = player::play_asset(
        &composition,
        &config,
        PlaySessionOptions {
            cancel: Some(cancel),
            events: Some(events_tx),
        },
    )?;
    progress.join().ok();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Ok(())
}

/// One composition track per source track of every input, placed back to
/// back (or all at zero with `overlay`). Inputs that cannot be read are
/// skipped with a warning; the mix still plays.
fn build_composition(
    cache: &AssetCache,
    files: &[PathBuf],
    overlay: bool,
) -> Result<Arc<AudioAsset>> {
    let composition = AudioAsset::empty();
    let mut at_time = 0i64;
    for path in files {
        let source = AudioSource::from_path(path);
        let Some(asset) = cache.get_or_create(&source) else {
            continue;
        };
        if asset.track_count() == 0 {
            tracing::warn!(path = ?path, "no decodable audio, skipping");
            continue;
        }
        for src_track in asset.tracks() {
            let guard = src_track.lock().unwrap();
            let target = composition.add_track();
            target.lock().unwrap().insert_time_range(
                TimeRange::new(0, guard.duration()),
                guard.track(),
                at_time,
            );
        }
        if !overlay {
            at_time += asset.duration();
        }
    }
    Ok(composition)
}

fn apply_speed(composition: &Arc<AudioAsset>, speed: f64) {
    if speed <= 0.0 {
        tracing::warn!(speed, "ignoring non-positive speed");
        return;
    }
    for track in composition.tracks() {
        let mut guard = track.lock().unwrap();
        let duration = guard.duration();
        if duration == 0 {
            continue;
        }
        let scaled = (duration as f64 / speed) as i64;
        guard.scale_time_range(TimeRange::new(0, duration), scaled);
    }
}

fn apply_fades(composition: &Arc<AudioAsset>, fade_in: Option<f64>, fade_out: Option<f64>) {
    let duration = composition.duration();
    if duration == 0 {
        return;
    }
    for track in composition.tracks() {
        let mut guard = track.lock().unwrap();
        if let Some(seconds) = fade_in {
            let fade = ((seconds * 1_000_000.0) as i64).clamp(0, duration);
            if fade > 0 {
                guard.set_volume_ramp(0.0, 1.0, TimeRange::new(0, fade));
            }
        }
        if let Some(seconds) = fade_out {
            let fade = ((seconds * 1_000_000.0) as i64).clamp(0, duration);
            if fade > 0 {
                guard.set_volume_ramp(1.0, 0.0, TimeRange::new(duration - fade, duration));
            }
        }
    }
}
