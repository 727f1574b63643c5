use serde::{Deserialize, Serialize};

/// Summary of one render/playback session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderStatus {
    /// Composition duration in microseconds.
    pub duration_us: i64,
    /// Output sample rate actually used (Hz).
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Frames delivered to the output device.
    pub played_frames: u64,
    /// Frames of silence inserted on underrun.
    pub underrun_frames: u64,
    /// Number of underrun events.
    pub underrun_events: u64,
    /// `true` when the session was cancelled before the end.
    pub cancelled: bool,
}
