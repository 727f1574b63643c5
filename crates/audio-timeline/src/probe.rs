//! Symphonia probing of file and byte-buffer sources.
//!
//! Only container/codec metadata is read here; decoding is the render
//! pipeline's job. Probing is also the shared "open" path for the decoder.

use std::fs::File;
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use symphonia::core::codecs::CodecParameters;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::{formats::FormatOptions, meta::MetadataOptions, probe::Hint};

use crate::source::AudioSource;

/// Metadata for one audio track found in a probed source.
#[derive(Clone, Debug)]
pub struct SourceTrackInfo {
    /// Container-level track id, used to select the track when decoding.
    pub track_id: u32,
    /// Best-effort duration in microseconds (0 when the container omits it).
    pub duration_us: i64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Codec label (best-effort).
    pub codec: Option<String>,
}

/// Byte-buffer wrapper so a shared `Arc<Vec<u8>>` can back a symphonia
/// `Cursor` without copying the payload.
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Open a file or byte-buffer source as a symphonia [`MediaSource`] with an
/// extension hint when one is available.
pub fn open_media_source(source: &AudioSource) -> Result<(Box<dyn MediaSource>, Hint)> {
    match source {
        AudioSource::File(path) => {
            let file = File::open(path).with_context(|| format!("open {path:?}"))?;
            let mut hint = Hint::new();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                hint.with_extension(ext);
            }
            Ok((Box::new(file), hint))
        }
        AudioSource::Bytes(bytes) => Ok((
            Box::new(Cursor::new(SharedBytes(bytes.clone()))),
            Hint::new(),
        )),
        _ => Err(anyhow!("source has no demuxable payload")),
    }
}

/// Probe a source and list its audio tracks.
pub fn probe_source(source: &AudioSource) -> Result<Vec<SourceTrackInfo>> {
    let (media, hint) = open_media_source(source)?;
    let mss = MediaSourceStream::new(media, Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut tracks = Vec::new();
    for track in probed.format.tracks() {
        let params = &track.codec_params;
        if params.sample_rate.is_none() {
            continue;
        }
        tracks.push(SourceTrackInfo {
            track_id: track.id,
            duration_us: duration_us_from_codec_params(params).unwrap_or(0),
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count() as u16),
            codec: codec_name_from_params(params),
        });
    }
    Ok(tracks)
}

/// Best-effort duration in microseconds from codec metadata.
fn duration_us_from_codec_params(params: &CodecParameters) -> Option<i64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some((frames.saturating_mul(1_000_000) / rate) as i64)
}

/// Best-effort codec label used for probe output.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::codecs::*;

    #[test]
    fn duration_us_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_us_from_codec_params(&params).is_none());
    }

    #[test]
    fn duration_us_computes() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        params.n_frames = Some(96_000);
        assert_eq!(duration_us_from_codec_params(&params), Some(2_000_000));
    }

    #[test]
    fn codec_name_maps_known_codecs() {
        let mut params = CodecParameters::new();
        params.codec = CODEC_TYPE_FLAC;
        assert_eq!(codec_name_from_params(&params), Some("FLAC".to_string()));
        params.codec = CODEC_TYPE_PCM_S16LE;
        assert_eq!(codec_name_from_params(&params), Some("PCM_S16".to_string()));
    }

    #[test]
    fn probing_missing_file_fails() {
        let source = AudioSource::from_path("/nonexistent/missing.flac");
        assert!(probe_source(&source).is_err());
    }

    #[test]
    fn probing_empty_source_fails() {
        assert!(probe_source(&AudioSource::Empty).is_err());
    }

    #[test]
    fn probing_garbage_bytes_fails() {
        let source = AudioSource::from_bytes(vec![0u8; 64]);
        assert!(probe_source(&source).is_err());
    }
}
