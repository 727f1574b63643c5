//! Streaming sample-rate conversion built on Rubato's sinc resampler.
//!
//! Both rate conversion in the source reader and speed shifting share this
//! wrapper: interleaved `f32` goes in, converted interleaved `f32` comes out
//! of an internal ready queue. Input is processed in fixed-size chunks; the
//! trailing partial chunk is flushed with `partial_len` at end of stream.

use anyhow::Result;
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use std::collections::VecDeque;

pub struct StreamResampler {
    resampler: Async<f32>,
    channels: usize,
    chunk_in_frames: usize,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    ready: VecDeque<f32>,
    flushed: bool,
}

impl StreamResampler {
    /// `ratio` is output rate over input rate (equivalently `1/speed`).
    pub fn new(ratio: f64, channels: usize, chunk_in_frames: usize) -> Result<Self> {
        let chunk_in_frames = chunk_in_frames.max(1);

        let sinc_len = 128;
        let oversampling_factor = 256;
        let interpolation = SincInterpolationType::Cubic;
        let window = WindowFunction::BlackmanHarris2;
        let f_cutoff = calculate_cutoff(sinc_len, window);

        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff,
            interpolation,
            oversampling_factor,
            window,
        };

        let resampler = Async::<f32>::new_sinc(
            ratio,
            1.1,
            &params,
            chunk_in_frames,
            channels,
            FixedAsync::Input,
        )?;
        let scratch = vec![0.0f32; resampler.output_frames_max() * channels];

        Ok(Self {
            resampler,
            channels,
            chunk_in_frames,
            pending: Vec::new(),
            scratch,
            ready: VecDeque::new(),
            flushed: false,
        })
    }

    /// Queue interleaved input samples and convert every complete chunk.
    pub fn push(&mut self, samples: &[f32]) {
        if self.flushed {
            return;
        }
        self.pending.extend_from_slice(samples);
        let chunk_samples = self.chunk_in_frames * self.channels;
        while self.pending.len() >= chunk_samples {
            self.process_block(self.chunk_in_frames, None);
            self.pending.drain(..chunk_samples);
        }
    }

    /// Convert the trailing partial chunk. Further pushes are ignored until
    /// [`reset`](StreamResampler::reset).
    pub fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        let frames = self.pending.len() / self.channels;
        if frames > 0 {
            self.process_block(frames, Some(frames));
        }
        self.pending.clear();
    }

    /// Converted samples waiting to be taken.
    pub fn ready_samples(&self) -> usize {
        self.ready.len()
    }

    /// Drain all converted output, or `None` when nothing is ready.
    pub fn take_output(&mut self) -> Option<Vec<f32>> {
        if self.ready.is_empty() {
            return None;
        }
        Some(self.ready.drain(..).collect())
    }

    /// Drop pending and converted data and clear the filter history, for
    /// reuse after a seek.
    pub fn reset(&mut self) {
        self.resampler.reset();
        self.pending.clear();
        self.ready.clear();
        self.flushed = false;
    }

    fn process_block(&mut self, frames: usize, partial_len: Option<usize>) {
        let input =
            match InterleavedSlice::new(&self.pending[..frames * self.channels], self.channels, frames) {
                Ok(adapter) => adapter,
                Err(err) => {
                    tracing::error!("interleaved slice (input) error: {err:#}");
                    return;
                }
            };

        let capacity_frames = self.scratch.len() / self.channels;
        let mut output =
            match InterleavedSlice::new_mut(&mut self.scratch, self.channels, capacity_frames) {
                Ok(adapter) => adapter,
                Err(err) => {
                    tracing::error!("interleaved slice (output) error: {err:#}");
                    return;
                }
            };

        let indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len,
        };

        match self
            .resampler
            .process_into_buffer(&input, &mut output, Some(&indexing))
        {
            Ok((_consumed, produced_frames)) => {
                self.ready
                    .extend(self.scratch[..produced_frames * self.channels].iter().copied());
            }
            Err(err) => {
                tracing::error!("resampler process error: {err:#}");
            }
        }
    }
}
