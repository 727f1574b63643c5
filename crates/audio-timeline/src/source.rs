//! Audio source identities.
//!
//! A source names where PCM ultimately comes from: a file on disk, a shared
//! in-memory byte buffer, or a live [`PcmStream`] handle. Sources are cheap
//! to clone and compared by identity (not content), which is what the asset
//! cache keys on.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One decoded frame delivered by a [`PcmStream`].
#[derive(Clone, Debug)]
pub struct PcmFrame {
    /// Interleaved 16-bit little-endian samples.
    pub data: Vec<u8>,
    /// Presentation time of the first frame in `data`, microseconds.
    pub pts: i64,
}

/// A caller-provided raw PCM producer.
///
/// Implementations deliver interleaved s16le frames in presentation order.
/// `seek` repositions the stream; the next `next_frame` may start slightly
/// before the requested time (the reader compensates).
pub trait PcmStream: Send {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    /// Total stream duration in microseconds.
    fn duration(&self) -> i64;
    fn seek(&mut self, time_us: i64);
    fn next_frame(&mut self) -> Option<PcmFrame>;
}

/// Shared handle to a PCM stream, usable from multiple segments.
pub type SharedPcmStream = Arc<Mutex<dyn PcmStream>>;

/// Identifies a PCM-producing origin. Exactly one variant carries a payload;
/// [`AudioSource::Empty`] marks placeholder segments.
#[derive(Clone)]
pub enum AudioSource {
    Empty,
    File(PathBuf),
    Bytes(Arc<Vec<u8>>),
    Stream(SharedPcmStream),
}

impl AudioSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        AudioSource::File(path.into())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        AudioSource::Bytes(Arc::new(bytes))
    }

    pub fn from_stream(stream: SharedPcmStream) -> Self {
        AudioSource::Stream(stream)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AudioSource::Empty)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            AudioSource::File(p) => Some(p),
            _ => None,
        }
    }

    /// Stable identity key used for decoded-asset dedup.
    pub fn key(&self) -> Option<SourceKey> {
        match self {
            AudioSource::Empty => None,
            AudioSource::File(p) => Some(SourceKey::Path(p.clone())),
            AudioSource::Bytes(b) => Some(SourceKey::Bytes(Arc::as_ptr(b) as usize)),
            AudioSource::Stream(s) => Some(SourceKey::Stream(Arc::as_ptr(s) as *const () as usize)),
        }
    }
}

impl PartialEq for AudioSource {
    /// Identity comparison: same variant and same payload identity.
    /// Byte buffers and streams compare by shared-handle pointer, not content.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AudioSource::Empty, AudioSource::Empty) => true,
            (AudioSource::File(a), AudioSource::File(b)) => a == b,
            (AudioSource::Bytes(a), AudioSource::Bytes(b)) => Arc::ptr_eq(a, b),
            (AudioSource::Stream(a), AudioSource::Stream(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioSource::Empty => write!(f, "AudioSource::Empty"),
            AudioSource::File(p) => write!(f, "AudioSource::File({p:?})"),
            AudioSource::Bytes(b) => write!(f, "AudioSource::Bytes({} bytes)", b.len()),
            AudioSource::Stream(_) => write!(f, "AudioSource::Stream"),
        }
    }
}

/// Hashable cache key derived from a source's identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Path(PathBuf),
    Bytes(usize),
    Stream(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullStream;

    impl PcmStream for NullStream {
        fn sample_rate(&self) -> u32 {
            44_100
        }
        fn channels(&self) -> u16 {
            2
        }
        fn duration(&self) -> i64 {
            0
        }
        fn seek(&mut self, _time_us: i64) {}
        fn next_frame(&mut self) -> Option<PcmFrame> {
            None
        }
    }

    #[test]
    fn file_sources_compare_by_path() {
        let a = AudioSource::from_path("/tmp/a.flac");
        let b = AudioSource::from_path("/tmp/a.flac");
        let c = AudioSource::from_path("/tmp/c.flac");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn byte_sources_compare_by_identity() {
        let a = AudioSource::from_bytes(vec![1, 2, 3]);
        let b = a.clone();
        let c = AudioSource::from_bytes(vec![1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn stream_sources_compare_by_identity() {
        let s: SharedPcmStream = Arc::new(Mutex::new(NullStream));
        let a = AudioSource::from_stream(s.clone());
        let b = AudioSource::from_stream(s);
        let c = AudioSource::from_stream(Arc::new(Mutex::new(NullStream)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_source_has_no_key() {
        assert!(AudioSource::Empty.is_empty());
        assert!(AudioSource::Empty.key().is_none());
    }
}
