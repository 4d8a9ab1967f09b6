//! Voice Chat Client
//!
//! Joins a relay endpoint, streams the microphone while you speak and plays
//! what the endpoint relays back. Ctrl+C leaves the session cleanly.
//!
//! Usage: `client [NAME] [HOST:PORT] [--config PATH] [--list-devices]`

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_voice_chat::{
    audio::{list_devices, MicrophoneCapture, SpeakerPlayback},
    client::ClientOptions,
    config::AppConfig,
    network::{resolve, UdpTransport},
    roster::Roster,
    VoiceClient,
};

/// Command line, all optional
#[derive(Debug, Default)]
struct Args {
    name: Option<String>,
    server: Option<String>,
    config_path: Option<PathBuf>,
    list_devices: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--list-devices" => parsed.list_devices = true,
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config_path = Some(PathBuf::from(path));
                }
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        parsed.name = positional.next();
        parsed.server = positional.next();
        if let Some(extra) = positional.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(parsed)
    }
}

/// Ask on stdin until a non-empty line arrives
fn prompt(question: &str) -> Result<String> {
    let stdin = io::stdin();
    loop {
        print!("{}", question);
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            bail!("stdin closed");
        }
        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
}

/// Handshake until an endpoint accepts us, re-prompting for the address
/// after every failure.
fn connect_interactively(
    name: &str,
    mut server: Option<String>,
    config: &AppConfig,
) -> Result<VoiceClient<UdpTransport>> {
    let options = ClientOptions::from(config);

    loop {
        let address = match server.take() {
            Some(address) => address,
            None => prompt("Enter server address (host:port) --> ")?,
        };

        let server_addr = match resolve(&address) {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!("{}", e);
                println!("Couldn't connect to server...");
                continue;
            }
        };

        let transport = Arc::new(UdpTransport::bind_for(server_addr, &config.network)?);
        match VoiceClient::connect(name, server_addr, transport, options) {
            Ok(client) => {
                println!("Connected to server successfully!");
                return Ok(client);
            }
            Err(e) => {
                tracing::warn!("Handshake with {} failed: {}", server_addr, e);
                println!("Couldn't connect to server...");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    let config = match &args.config_path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    if args.list_devices {
        println!("\n=== Available Audio Devices ===");
        for device in list_devices() {
            let device_type = match (device.is_input, device.is_output) {
                (true, true) => "Input/Output",
                (true, false) => "Input",
                (false, true) => "Output",
                _ => "Unknown",
            };
            let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {} ({}){}:", device.name, device_type, default_marker);
            println!("    Sample rates: {:?}", device.sample_rates);
            println!("    Channels: {:?}", device.channels);
        }
        return Ok(());
    }

    tracing::info!("Starting voice chat client");

    let setup_config = config.clone();
    let client = tokio::task::spawn_blocking(move || -> Result<VoiceClient<UdpTransport>> {
        let name = match args.name.or(setup_config.client.name.clone()) {
            Some(name) => name,
            None => prompt("Enter the name of the client --> ")?,
        };
        let server = args.server.or(setup_config.client.server.clone());
        connect_interactively(&name, server, &setup_config)
    })
    .await??;

    let audio = &config.audio;
    let capture = MicrophoneCapture::start(
        audio.input_device.as_deref(),
        audio.sample_rate,
        audio.frame_samples,
    )
    .context("Failed to open microphone")?;
    let playback = SpeakerPlayback::start(
        audio.output_device.as_deref(),
        audio.sample_rate,
        audio.playback_queue_samples()?,
    )
    .context("Failed to open speaker")?;

    let token = client.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("EXIT");
            token.cancel();
        }
    });

    tracing::info!("Streaming - press Ctrl+C to leave");

    let stats = tokio::task::spawn_blocking(move || {
        client.run(capture, playback, |payload: &[u8]| {
            println!("{}", Roster::parse(payload));
        })
    })
    .await??;

    tracing::info!(
        "Stats: {} datagrams sent ({:.1} KB), {} probes, {} received, {} played, {} send errors",
        stats.datagrams_sent,
        stats.bytes_sent as f64 / 1024.0,
        stats.probes_sent,
        stats.datagrams_received,
        stats.frames_played,
        stats.send_errors
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_positional_args() {
        let args = parse(&["alice", "10.0.0.1:5000"]).unwrap();
        assert_eq!(args.name.as_deref(), Some("alice"));
        assert_eq!(args.server.as_deref(), Some("10.0.0.1:5000"));
        assert!(!args.list_devices);
    }

    #[test]
    fn test_flags() {
        let args = parse(&["--config", "/tmp/c.toml", "--list-devices"]).unwrap();
        assert_eq!(args.config_path, Some(PathBuf::from("/tmp/c.toml")));
        assert!(args.list_devices);
        assert!(args.name.is_none());
    }

    #[test]
    fn test_rejects_bad_args() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["a", "b", "c"]).is_err());
    }
}
