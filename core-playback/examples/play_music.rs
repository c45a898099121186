//! # Music Playback Example
//!
//! Plays a music file on the default output device through the desktop
//! bridge, then fades it out and shuts down.
//!
//! Run with:
//! ```bash
//! cargo run --example play_music --package core-playback -- path/to/track.ogg
//!
//! # Decode the whole track up front and loop on the device
//! cargo run --example play_music --package core-playback -- path/to/track.wav full
//! ```

use core_playback::{LoadPhase, MusicPlayer, PlaybackConfig};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(LoggingConfig::default().with_thread_info(true)) {
        eprintln!("Failed to initialize logging: {e}");
        return;
    }

    let args: Vec<String> = env::args().collect();
    let Some(track) = args.get(1).map(PathBuf::from) else {
        eprintln!("usage: play_music <file> [full]");
        return;
    };

    let config = match args.get(2).map(String::as_str) {
        Some("full") => PlaybackConfig::full_decode(),
        _ => PlaybackConfig::default(),
    };

    let Some(file_name) = track.file_name().map(PathBuf::from) else {
        eprintln!("not a file: {}", track.display());
        return;
    };
    let root = track
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let core = match CoreConfig::builder().content_root(root).build() {
        Ok(core) => core,
        Err(e) => {
            error!(error = %e, "Core configuration failed");
            return;
        }
    };

    let player = match MusicPlayer::new(core, config) {
        Ok(player) => player,
        Err(e) => {
            error!(error = %e, "Player setup failed");
            return;
        }
    };

    // Resolved against the content root, which is the track's directory.
    let music = player.play(&file_name);
    music.set_looping(true);

    if music.wait_until_loaded().await != LoadPhase::Ready {
        error!("Track could not be loaded");
        return;
    }
    info!(state = ?music.state(), "Playing");

    tokio::time::sleep(Duration::from_secs(10)).await;

    for volume in (0..=100).rev().step_by(10) {
        music.set_volume(volume);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    info!(stats = ?music.feed_stats(), "Stopping");
    player.shutdown();
}
