use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "compose", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Preferred output sample rate in Hz
    #[arg(long, default_value_t = 44_100)]
    pub sample_rate: u32,

    /// Output channel count
    #[arg(long, default_value_t = 2)]
    pub channels: u16,

    /// Pipeline chunk size in frames
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Output queue depth in chunks
    #[arg(long, default_value_t = 8)]
    pub buffer_chunks: usize,

    /// Playback callback refill cap (frames)
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose input files on a timeline and play the mix
    Play {
        /// Audio files placed on the timeline
        files: Vec<PathBuf>,

        /// Start all files at time zero instead of back to back
        #[arg(long)]
        overlay: bool,

        /// Playback speed factor applied to every track (>1 is faster)
        #[arg(long)]
        speed: Option<f64>,

        /// Fade-in duration in seconds
        #[arg(long)]
        fade_in: Option<f64>,

        /// Fade-out duration in seconds
        #[arg(long)]
        fade_out: Option<f64>,

        /// Print the session summary as JSON when playback ends
        #[arg(long)]
        json: bool,
    },

    /// Print the audio tracks found in a file
    Probe {
        path: PathBuf,
    },

    /// List output devices and exit
    Devices,
}
