//! Audio frames and the lock-free playback sample queue

use bytes::{BufMut, Bytes, BytesMut};
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::{BYTES_PER_SAMPLE, FRAME_SAMPLES};

/// One frame of 16-bit mono samples
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A frame of `len` zero samples
    pub fn silence(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// Parse little-endian PCM. A trailing odd byte is ignored.
    pub fn from_pcm_bytes(pcm: &[u8]) -> Self {
        let samples = pcm
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples)
    }

    /// Little-endian PCM, as carried by ClientData
    pub fn to_pcm_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.samples.len() * BYTES_PER_SAMPLE);
        for sample in &self.samples {
            buf.put_i16_le(*sample);
        }
        buf.freeze()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Root-mean-square energy in sample units (0 for an empty frame)
    pub fn rms(&self) -> f64 {
        rms(&self.samples)
    }
}

impl Default for AudioFrame {
    fn default() -> Self {
        Self::silence(FRAME_SAMPLES)
    }
}

/// Root-mean-square of 16-bit samples
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt()
}

/// Lock-free sample queue between the receive loop and the output callback
pub struct SampleQueue {
    queue: ArrayQueue<i16>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl SampleQueue {
    /// Create a new queue holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push samples, dropping whatever does not fit.
    /// Returns the number of samples accepted.
    pub fn push_samples(&self, samples: &[i16]) -> usize {
        let mut accepted = 0;
        for &sample in samples {
            if self.queue.push(sample).is_err() {
                self.overflow_count
                    .fetch_add(samples.len() - accepted, Ordering::Relaxed);
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Pop one sample, counting an underrun when empty
    pub fn pop(&self) -> Option<i16> {
        match self.queue.pop() {
            Some(sample) => Some(sample),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Samples dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Pops attempted on an empty queue
    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a sample queue
pub type SharedSampleQueue = Arc<SampleQueue>;
