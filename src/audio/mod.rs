//! Audio subsystem module
//!
//! The network loops only see the [`AudioSource`] and [`AudioSink`] seams;
//! the cpal-backed devices live behind them.

pub mod buffer;
pub mod capture;
pub mod device;
pub mod playback;

pub use buffer::{AudioFrame, SampleQueue};
pub use capture::MicrophoneCapture;
pub use device::{list_devices, AudioDeviceInfo};
pub use playback::SpeakerPlayback;

use crate::error::AudioError;

/// Produces fixed-size captured frames. `read_frame` blocks until one is ready.
pub trait AudioSource: Send {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError>;
}

/// Consumes raw little-endian 16-bit PCM for playback.
pub trait AudioSink: Send {
    fn write_frame(&mut self, pcm: &[u8]) -> Result<(), AudioError>;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        (**self).read_frame()
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn write_frame(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        (**self).write_frame(pcm)
    }
}
