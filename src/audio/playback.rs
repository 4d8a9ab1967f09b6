//! Speaker playback
//!
//! `write_frame` never blocks: samples go into a lock-free queue that the
//! output callback drains, padding with silence on underrun.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer::{AudioFrame, SampleQueue, SharedSampleQueue};
use crate::audio::device::{find_output_device, mono_config};
use crate::audio::AudioSink;
use crate::error::AudioError;

/// Plays received PCM on an output device
pub struct SpeakerPlayback {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    queue: SharedSampleQueue,
}

impl SpeakerPlayback {
    /// Open `device_name` (or the default output) and start playback
    pub fn start(
        device_name: Option<&str>,
        sample_rate: u32,
        queue_samples: usize,
    ) -> Result<Self, AudioError> {
        if queue_samples == 0 {
            return Err(AudioError::StreamError(
                "playback queue must hold at least one sample".to_string(),
            ));
        }

        let device = find_output_device(device_name)?;
        let device_label = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let config = mono_config(sample_rate);

        let queue: SharedSampleQueue = Arc::new(SampleQueue::new(queue_samples));
        let queue_for_callback = queue.clone();
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("voice-playback".to_string())
            .spawn(move || {
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for out in data.iter_mut() {
                            *out = queue_for_callback
                                .pop()
                                .map(|s| s as f32 / i16::MAX as f32)
                                .unwrap_or(0.0);
                        }
                    },
                    move |err| {
                        tracing::warn!("Playback stream error: {}", err);
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

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let started = ready_rx.recv().unwrap_or(Err(AudioError::Disconnected));
        if let Err(e) = started {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!("Playing on '{}' at {} Hz", device_label, sample_rate);

        Ok(Self {
            running,
            thread_handle: Some(handle),
            queue,
        })
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(
                "Playback stopped: {} samples dropped on overflow, {} underruns",
                self.queue.overflow_count(),
                self.queue.underrun_count()
            );
        }
    }
}

impl AudioSink for SpeakerPlayback {
    fn write_frame(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        let frame = AudioFrame::from_pcm_bytes(pcm);
        let accepted = self.queue.push_samples(frame.samples());

        if accepted < frame.len() {
            return Err(AudioError::BufferOverflow);
        }
        Ok(())
    }
}

impl Drop for SpeakerPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
