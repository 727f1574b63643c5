//! Bounded queue between the render loop and the output callback.
//!
//! The render thread pushes mixed s16 chunks with backpressure; the CPAL
//! callback drains without blocking. `close()` plus draining semantics make
//! shutdown deterministic. The `done` flag lives under the same mutex as the
//! queue to avoid close/push races.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

pub struct SharedPcm {
    channels: usize,
    inner: Mutex<SharedInner>,
    cv: Condvar,
    max_samples: usize,
}

struct SharedInner {
    queue: VecDeque<i16>,
    done: bool,
}

impl SharedPcm {
    /// `max_samples` caps buffered samples (not frames).
    pub fn new(channels: usize, max_samples: usize) -> Self {
        Self {
            channels: channels.max(1),
            inner: Mutex::new(SharedInner {
                queue: VecDeque::new(),
                done: false,
            }),
            cv: Condvar::new(),
            max_samples: max_samples.max(1),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len_samples(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().unwrap().done
    }

    /// Mark the queue finished and wake all waiters. Buffered samples remain
    /// poppable until drained. Idempotent.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.done = true;
        drop(guard);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full. Returns
    /// early (dropping the remainder) if the queue is closed while waiting.
    pub fn push_blocking(&self, samples: &[i16]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut guard = self.inner.lock().unwrap();
            while guard.queue.len() >= self.max_samples && !guard.done {
                guard = self.cv.wait(guard).unwrap();
            }
            if guard.done {
                return;
            }
            while offset < samples.len() && guard.queue.len() < self.max_samples {
                guard.queue.push_back(samples[offset]);
                offset += 1;
            }
            drop(guard);
            self.cv.notify_all();
        }
    }

    /// Pop up to `max_frames` whole frames without blocking. `None` when the
    /// queue is currently empty (closed or not).
    pub fn pop_frames(&self, max_frames: usize) -> Option<Vec<i16>> {
        let mut guard = self.inner.lock().unwrap();
        let available_frames = guard.queue.len() / self.channels;
        let take_samples = available_frames.min(max_frames) * self.channels;
        if take_samples == 0 {
            return None;
        }
        let out: Vec<i16> = guard.queue.drain(..take_samples).collect();
        drop(guard);
        self.cv.notify_all();
        Some(out)
    }
}

/// Block until `queue` is closed and fully drained, or `cancel` flips.
///
/// Returns `true` when the queue drained normally, `false` on cancel.
pub fn wait_until_drained_or_cancelled(queue: &Arc<SharedPcm>, cancel: &Arc<AtomicBool>) -> bool {
    let mut guard = queue.inner.lock().unwrap();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        if guard.done && guard.queue.is_empty() {
            return true;
        }
        let (next, _timeout) = queue
            .cv
            .wait_timeout(guard, Duration::from_millis(50))
            .unwrap();
        guard = next;
    }
}
