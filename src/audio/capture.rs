//! Microphone capture
//!
//! The cpal stream lives on its own thread (streams are not `Send` on every
//! host); samples cross to the transmit loop over a bounded channel and are
//! re-chunked into fixed-size frames by [`MicrophoneCapture::read_frame`].

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer::AudioFrame;
use crate::audio::device::{find_input_device, mono_config};
use crate::audio::AudioSource;
use crate::error::AudioError;

/// Callback chunks buffered before the callback starts dropping
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Longest `read_frame` waits before reporting a timeout
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Captures mono 16-bit frames from an input device
pub struct MicrophoneCapture {
    /// Whether the stream thread should keep running
    running: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    /// Sample chunks delivered by the cpal callback
    chunks: Receiver<Vec<i16>>,

    /// Samples received but not yet handed out as a frame
    pending: Vec<i16>,

    /// Samples per frame
    frame_samples: usize,

    /// Chunks dropped because the channel was full
    dropped_chunks: Arc<AtomicU64>,
}

impl MicrophoneCapture {
    /// Open `device_name` (or the default input) and start capturing
    pub fn start(
        device_name: Option<&str>,
        sample_rate: u32,
        frame_samples: usize,
    ) -> Result<Self, AudioError> {
        let device = find_input_device(device_name)?;
        let device_label = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let config = mono_config(sample_rate);

        let (chunk_tx, chunk_rx) = bounded::<Vec<i16>>(CHUNK_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();
        let dropped_chunks = Arc::new(AtomicU64::new(0));
        let dropped_for_callback = dropped_chunks.clone();

        let handle = thread::Builder::new()
            .name("voice-capture".to_string())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let chunk: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                        if chunk_tx.try_send(chunk).is_err() {
                            dropped_for_callback.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    move |err| {
                        tracing::warn!("Capture stream error: {}", err);
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream is dropped here, stopping capture
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let started = ready_rx.recv().unwrap_or(Err(AudioError::Disconnected));
        if let Err(e) = started {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!(
            "Capturing from '{}' at {} Hz, {} samples/frame",
            device_label,
            sample_rate,
            frame_samples
        );

        Ok(Self {
            running,
            thread_handle: Some(handle),
            chunks: chunk_rx,
            pending: Vec::with_capacity(frame_samples * 2),
            frame_samples,
            dropped_chunks,
        })
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(
                "Capture stopped: {} chunks dropped on a full channel",
                self.dropped_chunks.load(Ordering::Relaxed)
            );
        }
    }
}

impl AudioSource for MicrophoneCapture {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        while self.pending.len() < self.frame_samples {
            match self.chunks.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => return Err(AudioError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::Disconnected),
            }
        }

        let samples: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
        Ok(AudioFrame::new(samples))
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert a normalized float sample to 16-bit PCM
pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
