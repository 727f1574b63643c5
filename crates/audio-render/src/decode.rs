//! Demux + decode wrapper around Symphonia.
//!
//! One [`SourceDecoder`] owns the format reader and decoder for a single
//! audio track of a file or byte-buffer source. Transient decode errors are
//! retried up to a fixed bound per call; terminal errors latch the decoder
//! exhausted so playback degrades to silence instead of stalling.

use anyhow::{Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::{Time, TimeBase};

use audio_timeline::probe::open_media_source;
use audio_timeline::source::AudioSource;

/// Bound on decode attempts per `next_frame` call.
const MAX_DECODE_ATTEMPTS: usize = 100;

/// One decoded packet worth of audio at the source's native format.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    /// Interleaved `f32` samples, source channel layout and rate.
    pub samples: Vec<f32>,
    /// Presentation time of the first frame, microseconds.
    pub pts: i64,
}

pub struct SourceDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
    channels: usize,
    exhausted: bool,
}

impl SourceDecoder {
    /// Probe `source` and set up a decoder for the container track
    /// `source_track_id` (falling back to the default track).
    pub fn open(source: &AudioSource, source_track_id: u32) -> Result<Self> {
        let (media, hint) = open_media_source(source)?;
        let mss = MediaSourceStream::new(media, Default::default());
        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.id == source_track_id)
            .or_else(|| format.default_track())
            .ok_or_else(|| anyhow!("no audio track in source"))?;

        let params = track.codec_params.clone();
        let track_id = track.id;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| anyhow!("unknown sample rate"))?;
        let channels = params
            .channels
            .ok_or_else(|| anyhow!("unknown channel layout"))?
            .count();

        let decoder = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

        Ok(Self {
            format,
            decoder,
            track_id,
            time_base: params.time_base,
            sample_rate,
            channels,
            exhausted: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Seek the demuxer and reset decoder state. Compressed formats may land
    /// slightly before the target; callers compensate via frame pts.
    pub fn seek(&mut self, time_us: i64) {
        let time_us = time_us.max(0);
        let time = Time::new(
            (time_us / 1_000_000) as u64,
            (time_us % 1_000_000) as f64 / 1_000_000.0,
        );
        if let Err(err) = self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(self.track_id),
            },
        ) {
            tracing::warn!("decoder seek failed: {err}");
        }
        self.decoder.reset();
        self.exhausted = false;
    }

    /// Decode the next frame of the selected track, or `None` on end of
    /// stream, terminal error, or retry exhaustion.
    pub fn next_frame(&mut self) -> Option<DecodedFrame> {
        if self.exhausted {
            return None;
        }
        for _ in 0..MAX_DECODE_ATTEMPTS {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(_) => {
                    // EOF and transport failures end the stream the same way
                    self.exhausted = true;
                    return None;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            let pts = self.packet_time_us(packet.ts());
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let mut buf =
                        SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
                    buf.copy_interleaved_ref(decoded);
                    return Some(DecodedFrame {
                        samples: buf.samples().to_vec(),
                        pts,
                    });
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    tracing::debug!("transient decode error, retrying: {err}");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(err) => {
                    tracing::warn!("terminal decode error, track goes silent: {err}");
                    self.exhausted = true;
                    return None;
                }
            }
        }
        tracing::warn!("decode retry limit reached, no frame this call");
        None
    }

    fn packet_time_us(&self, ts: u64) -> i64 {
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                time.seconds as i64 * 1_000_000 + (time.frac * 1_000_000.0) as i64
            }
            // without a time base, timestamps are assumed to count frames
            None => (ts as i64).saturating_mul(1_000_000) / self.sample_rate as i64,
        }
    }
}
