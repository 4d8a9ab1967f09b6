//! Application configuration
//!
//! Read from `config.toml` in the platform config directory. Every field
//! has a default, so a missing file or a partial one is fine.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::network::TransmitSettings;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub network: NetworkConfig,
    pub audio: AudioConfig,
}

/// Identity and endpoint; prompted for when absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub name: Option<String>,
    /// `host:port` of the relay endpoint
    pub server: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local bind address; unspecified address of the server's family if unset
    pub bind_address: Option<SocketAddr>,
    pub handshake_timeout_ms: u64,
    /// How often the receive loop wakes to re-check the session state
    pub receive_poll_ms: u64,
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
}

impl NetworkConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn receive_poll(&self) -> Duration {
        Duration::from_millis(self.receive_poll_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
            receive_poll_ms: DEFAULT_RECEIVE_POLL.as_millis() as u64,
            recv_buffer_size: None,
            send_buffer_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_samples: usize,
    /// RMS level at which a frame counts as speech
    pub vad_threshold: f64,
    /// Captured frames between liveness probes
    pub liveness_interval: u32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub playback_queue_frames: usize,
}

impl AudioConfig {
    pub fn transmit_settings(&self) -> TransmitSettings {
        TransmitSettings {
            vad_threshold: self.vad_threshold,
            liveness_interval: self.liveness_interval,
        }
    }

    /// Playback queue capacity in samples
    pub fn playback_queue_samples(&self) -> Result<usize> {
        self.playback_queue_frames
            .checked_mul(self.frame_samples)
            .filter(|&samples| samples > 0)
            .ok_or_else(|| {
                Error::Config(format!(
                    "audio.playback_queue_frames {} x frame_samples {} is not a usable queue size",
                    self.playback_queue_frames, self.frame_samples
                ))
            })
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_samples: FRAME_SAMPLES,
            vad_threshold: DEFAULT_VAD_THRESHOLD,
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            input_device: None,
            output_device: None,
            playback_queue_frames: PLAYBACK_QUEUE_FRAMES,
        }
    }
}

impl AppConfig {
    /// `<config dir>/lan-voice-chat/config.toml`, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lan-voice-chat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default path, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the loops cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".into()));
        }
        if self.audio.frame_samples == 0 {
            return Err(Error::Config("audio.frame_samples must be positive".into()));
        }
        if self.audio.vad_threshold.is_nan() || self.audio.vad_threshold < 0.0 {
            return Err(Error::Config("audio.vad_threshold must be a non-negative number".into()));
        }
        if self.audio.playback_queue_frames == 0 {
            return Err(Error::Config("audio.playback_queue_frames must be positive".into()));
        }
        self.audio.playback_queue_samples()?;
        if self.network.handshake_timeout_ms == 0 || self.network.receive_poll_ms == 0 {
            return Err(Error::Config("network timeouts must be positive".into()));
        }
        Ok(())
    }
}
