//! Assets: lazily loaded bundles of composition tracks for one source.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::probe::probe_source;
use crate::segment::AudioTrackSegment;
use crate::source::AudioSource;
use crate::time::TimeRange;
use crate::track::AudioCompositionTrack;

/// Shared, editable track handle. Readers re-resolve segments through this
/// lock on every pull, so edits stay safe while a composition is playing.
pub type SharedTrack = Arc<Mutex<AudioCompositionTrack>>;

/// One logical audio input: a source plus the tracks found in it.
///
/// Tracks are loaded on first access to [`duration`](AudioAsset::duration) or
/// [`tracks`](AudioAsset::tracks). Sources that cannot be probed yield an
/// empty track set rather than an error; playback then degrades to silence.
pub struct AudioAsset {
    source: AudioSource,
    tracks: Mutex<Option<Vec<SharedTrack>>>,
}

impl AudioAsset {
    /// Wrap a non-empty source. Returns `None` for [`AudioSource::Empty`].
    pub fn make(source: AudioSource) -> Option<Arc<AudioAsset>> {
        if source.is_empty() {
            return None;
        }
        Some(Arc::new(Self {
            source,
            tracks: Mutex::new(None),
        }))
    }

    /// A source-less composition target. Tracks are added with
    /// [`add_track`](AudioAsset::add_track) and filled by inserting ranges
    /// from other assets' tracks.
    pub fn empty() -> Arc<AudioAsset> {
        Arc::new(Self {
            source: AudioSource::Empty,
            tracks: Mutex::new(Some(Vec::new())),
        })
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    /// Longest track duration, microseconds.
    pub fn duration(&self) -> i64 {
        self.tracks()
            .iter()
            .map(|track| track.lock().unwrap().duration())
            .max()
            .unwrap_or(0)
    }

    pub fn tracks(&self) -> Vec<SharedTrack> {
        self.lock_loaded().as_ref().expect("loaded").clone()
    }

    pub fn track_count(&self) -> usize {
        self.lock_loaded().as_ref().expect("loaded").len()
    }

    /// Append a new empty composition track and return its handle.
    pub fn add_track(&self) -> SharedTrack {
        let mut guard = self.lock_loaded();
        let tracks = guard.as_mut().expect("loaded");
        let next_id = tracks
            .iter()
            .map(|track| track.lock().unwrap().track_id())
            .max()
            .map(|id| id + 1)
            .unwrap_or(0);
        let track = Arc::new(Mutex::new(AudioCompositionTrack::new(next_id)));
        tracks.push(track.clone());
        track
    }

    fn lock_loaded(&self) -> MutexGuard<'_, Option<Vec<SharedTrack>>> {
        let mut guard = self.tracks.lock().unwrap();
        if guard.is_none() {
            *guard = Some(load_tracks(&self.source));
        }
        guard
    }
}

/// Build one full-length composition track per audio track in the source.
fn load_tracks(source: &AudioSource) -> Vec<SharedTrack> {
    match source {
        AudioSource::Empty => Vec::new(),
        AudioSource::Stream(stream) => {
            let duration = stream.lock().unwrap().duration();
            vec![full_length_track(source.clone(), 0, 0, duration)]
        }
        AudioSource::File(_) | AudioSource::Bytes(_) => match probe_source(source) {
            Ok(infos) => infos
                .iter()
                .enumerate()
                .map(|(index, info)| {
                    full_length_track(
                        source.clone(),
                        index as u32,
                        info.track_id,
                        info.duration_us,
                    )
                })
                .collect(),
            Err(err) => {
                tracing::warn!("asset probe failed, track set is empty: {err:#}");
                Vec::new()
            }
        },
    }
}

fn full_length_track(
    source: AudioSource,
    track_id: u32,
    source_track_id: u32,
    duration_us: i64,
) -> SharedTrack {
    let mut track = AudioCompositionTrack::new(track_id);
    if duration_us > 0 {
        track.add_segment(AudioTrackSegment::new(
            source,
            source_track_id,
            TimeRange::new(0, duration_us),
            TimeRange::new(0, duration_us),
        ));
    }
    Arc::new(Mutex::new(track))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{PcmFrame, PcmStream};

    struct ToneStream {
        duration_us: i64,
    }

    impl PcmStream for ToneStream {
        fn sample_rate(&self) -> u32 {
            44_100
        }
        fn channels(&self) -> u16 {
            2
        }
        fn duration(&self) -> i64 {
            self.duration_us
        }
        fn seek(&mut self, _time_us: i64) {}
        fn next_frame(&mut self) -> Option<PcmFrame> {
            None
        }
    }

    #[test]
    fn make_rejects_empty_source() {
        assert!(AudioAsset::make(AudioSource::Empty).is_none());
    }

    #[test]
    fn missing_file_yields_empty_track_set() {
        let asset = AudioAsset::make(AudioSource::from_path("/nonexistent/audio.flac")).unwrap();
        assert_eq!(asset.track_count(), 0);
        assert_eq!(asset.duration(), 0);
    }

    #[test]
    fn stream_source_yields_one_full_length_track() {
        let stream: crate::source::SharedPcmStream =
            Arc::new(Mutex::new(ToneStream { duration_us: 2_000_000 }));
        let asset = AudioAsset::make(AudioSource::from_stream(stream)).unwrap();
        assert_eq!(asset.track_count(), 1);
        assert_eq!(asset.duration(), 2_000_000);
        let track = asset.tracks()[0].clone();
        let track = track.lock().unwrap();
        assert_eq!(track.segments().len(), 1);
        assert_eq!(track.segments()[0].target_range, TimeRange::new(0, 2_000_000));
    }

    #[test]
    fn empty_asset_grows_by_add_track() {
        let asset = AudioAsset::empty();
        assert_eq!(asset.track_count(), 0);
        let a = asset.add_track();
        let b = asset.add_track();
        assert_eq!(asset.track_count(), 2);
        assert_ne!(
            a.lock().unwrap().track_id(),
            b.lock().unwrap().track_id()
        );
        assert_eq!(asset.duration(), 0);
    }
}
