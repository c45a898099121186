//! # Music Instance
//!
//! One rendering of a [`MusicSource`]: a background load, a device voice, and
//! the play/pause/stop/volume/loop controls the game drives.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──► Loading ──load ok──► Playing | Paused | Stopped ──dispose──► Disposed
//!              │                                                           ▲
//!              └──────────── load failed / disposed while loading ────────┘
//! ```
//!
//! Commands issued while loading only record the deferred target; the last
//! one wins and is applied once when the voice comes up. Control calls never
//! fail: device and decode errors are logged and the instance degrades to
//! silence.

use crate::context::PlaybackContext;
use crate::error::{PlaybackError, Result};
use crate::feeder::{build_feeder, FeedStats, FeedStatus};
use crate::registry::MusicRegistry;
use crate::source::MusicSource;
use bridge_traits::{AssetKind, DeviceVoice, UserNotice, VoiceState, MAX_VOLUME};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Unique identifier for a music instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Loading,
    Playing,
    Paused,
    Stopped,
    Disposed,
}

/// Last play/pause/stop requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TargetState {
    Playing = 0,
    Paused = 1,
    Stopped = 2,
}

impl TargetState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Playing),
            1 => Some(Self::Paused),
            2 => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Outcome of the background load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    Pending,
    Ready,
    Failed,
    Cancelled,
}

impl LoadPhase {
    pub fn is_finished(self) -> bool {
        self != LoadPhase::Pending
    }
}

/// Combined gain in `0.0..=1.0` for an instance volume and the global music
/// volume, both on a `0..=100` scale.
pub fn compose_volume(instance_volume: u32, music_volume: u32) -> f32 {
    let scale = MAX_VOLUME as f32;
    let instance = instance_volume.min(MAX_VOLUME) as f32 / scale;
    let music = music_volume.min(MAX_VOLUME) as f32 / scale;
    instance * music
}

/// Map a `0.0..=1.0` gain into a device's volume range, clamped to it.
pub fn device_volume(gain: f32, range: &RangeInclusive<f32>) -> f32 {
    let (start, end) = (*range.start(), *range.end());
    let gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
    if !start.is_finite() || !end.is_finite() {
        return gain;
    }
    (start + gain * (end - start)).clamp(start.min(end), start.max(end))
}

fn resolve_target(raw: u8) -> Result<TargetState> {
    TargetState::from_u8(raw)
        .ok_or_else(|| PlaybackError::InvariantViolation(format!("unknown target state {raw}")))
}

/// A playing (or loading) piece of music.
///
/// Created through [`MusicSource::create_instance`] or
/// [`MusicPlayer::play`](crate::MusicPlayer::play). Construction registers the
/// instance as the active music and returns before the file is decoded.
pub struct MusicInstance {
    inner: Arc<InstanceInner>,
}

struct InstanceInner {
    id: InstanceId,
    source: Arc<MusicSource>,
    ctx: PlaybackContext,
    registry: Weak<MusicRegistry>,
    voice: Mutex<Option<Arc<dyn DeviceVoice>>>,
    device_loops: AtomicBool,
    target: AtomicU8,
    volume: AtomicU32,
    looping: AtomicBool,
    loading: AtomicBool,
    disposed: AtomicBool,
    cancel: CancellationToken,
    feed: Arc<FeedStatus>,
    load_tx: watch::Sender<LoadPhase>,
}

impl MusicInstance {
    pub(crate) fn new(
        source: Arc<MusicSource>,
        ctx: PlaybackContext,
        registry: &Arc<MusicRegistry>,
    ) -> Arc<Self> {
        let (load_tx, _) = watch::channel(LoadPhase::Pending);
        let inner = Arc::new(InstanceInner {
            id: InstanceId::new(),
            volume: AtomicU32::new(ctx.config.default_volume.min(MAX_VOLUME)),
            looping: AtomicBool::new(ctx.config.default_looping),
            source,
            registry: Arc::downgrade(registry),
            voice: Mutex::new(None),
            device_loops: AtomicBool::new(false),
            target: AtomicU8::new(TargetState::Stopped.as_u8()),
            loading: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            feed: FeedStatus::new(),
            load_tx,
            ctx,
        });

        let instance = Arc::new(Self {
            inner: inner.clone(),
        });

        // The previous music must be gone before this one touches the source.
        registry.set_active(instance.clone());
        info!(id = %inner.id, track = %inner.source.name(), "Created music instance");

        let runtime = inner.ctx.runtime.clone();
        let _load_task = runtime.spawn_blocking(move || inner.run_load());

        instance
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn source(&self) -> &Arc<MusicSource> {
        &self.inner.source
    }

    pub fn play(&self) {
        self.inner.command(TargetState::Playing);
    }

    pub fn pause(&self) {
        self.inner.command(TargetState::Paused);
    }

    pub fn stop(&self) {
        self.inner.command(TargetState::Stopped);
    }

    /// Current state, read from the live voice when there is one.
    pub fn state(&self) -> InstanceState {
        self.inner.reap_failure();
        self.inner.state()
    }

    /// The recorded target, or `None` if the slot holds an invalid value.
    pub fn deferred_state(&self) -> Option<TargetState> {
        TargetState::from_u8(self.inner.target.load(Ordering::SeqCst))
    }

    /// Set the instance volume on a `0..=100` scale (values above clamp).
    pub fn set_volume(&self, volume: u32) {
        let volume = volume.min(MAX_VOLUME);
        self.inner.volume.store(volume, Ordering::SeqCst);
        self.inner.reap_failure();

        let slot = self.inner.voice.lock();
        if let Some(voice) = live(&slot) {
            self.inner.sync_volume(voice);
        }
    }

    pub fn volume(&self) -> u32 {
        self.inner.volume.load(Ordering::SeqCst)
    }

    /// Re-apply the volume after the global music volume changed.
    pub fn refresh_volume(&self) {
        self.set_volume(self.volume());
    }

    /// Set the loop flag. Only full-decode voices forward it to the device;
    /// streaming voices always loop at the feeder.
    pub fn set_looping(&self, looping: bool) {
        self.inner.looping.store(looping, Ordering::SeqCst);
        self.inner.reap_failure();

        let slot = self.inner.voice.lock();
        if let Some(voice) = live(&slot) {
            self.inner.sync_loop(voice);
        }
    }

    pub fn is_looping(&self) -> bool {
        self.inner.looping.load(Ordering::SeqCst)
    }

    /// Current load phase without waiting.
    pub fn load_phase(&self) -> LoadPhase {
        *self.inner.load_tx.borrow()
    }

    /// Wait for the background load to finish.
    pub async fn wait_until_loaded(&self) -> LoadPhase {
        let mut rx = self.inner.load_tx.subscribe();
        let phase = match rx.wait_for(|phase| phase.is_finished()).await {
            Ok(phase) => *phase,
            Err(_) => LoadPhase::Cancelled,
        };
        phase
    }

    pub fn feed_stats(&self) -> FeedStats {
        self.inner.feed.stats()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Stop and release the voice and decoder, and leave the registry.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Stop and tear down without touching the registry.
    pub(crate) fn retire(&self) {
        self.inner
            .target
            .store(TargetState::Stopped.as_u8(), Ordering::SeqCst);
        self.inner.teardown();
    }
}

impl Drop for MusicInstance {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl fmt::Debug for MusicInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MusicInstance")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source.path())
            .field("target", &self.deferred_state())
            .field("volume", &self.volume())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn live(slot: &Option<Arc<dyn DeviceVoice>>) -> Option<&Arc<dyn DeviceVoice>> {
    slot.as_ref().filter(|voice| !voice.is_disposed())
}

impl InstanceInner {
    #[instrument(skip_all, fields(id = %self.id, track = %self.source.name()))]
    fn run_load(&self) {
        let phase = self.load();
        self.loading.store(false, Ordering::SeqCst);
        self.load_tx.send_if_modified(|current| {
            if *current == LoadPhase::Pending {
                *current = phase;
                true
            } else {
                false
            }
        });
        debug!(?phase, "Load finished");
    }

    fn load(&self) -> LoadPhase {
        if self.cancel.is_cancelled() {
            return LoadPhase::Cancelled;
        }

        let loaded = match self.source.load(&self.ctx, &self.cancel) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return LoadPhase::Cancelled,
            Err(PlaybackError::EmptySourcePath) => {
                debug!("No music file configured");
                return LoadPhase::Failed;
            }
            Err(e) => {
                self.report_load_failure(&e);
                return LoadPhase::Failed;
            }
        };

        let decoder = loaded.decoder.clone();
        let feeder = build_feeder(
            &self.ctx.config,
            loaded.decoder,
            self.feed.clone(),
            self.cancel.clone(),
            self.source.name(),
        );
        let device_loops = feeder.loops_on_device();

        // Install outside the voice lock: it may decode the whole track.
        if let Err(e) = feeder.install(&loaded.voice) {
            *decoder.lock() = None;
            loaded.voice.dispose();
            if self.cancel.is_cancelled() {
                return LoadPhase::Cancelled;
            }
            self.report_load_failure(&e);
            return LoadPhase::Failed;
        }

        let mut slot = self.voice.lock();
        if self.cancel.is_cancelled() {
            drop(slot);
            *decoder.lock() = None;
            loaded.voice.dispose();
            debug!("Disposed while loading; dropping voice");
            return LoadPhase::Cancelled;
        }

        self.device_loops.store(device_loops, Ordering::SeqCst);
        *slot = Some(loaded.voice.clone());
        self.loading.store(false, Ordering::SeqCst);
        self.sync_loop(&loaded.voice);
        self.sync_volume(&loaded.voice);
        let applied = self.apply_target(&loaded.voice);
        drop(slot);

        if let Err(e) = applied {
            error!(error = %e, "Could not apply deferred state; disposing");
            self.dispose();
            return LoadPhase::Failed;
        }

        info!(
            sample_rate = loaded.format.sample_rate,
            channels = loaded.format.channels.channel_count(),
            mode = ?self.ctx.config.feed_mode,
            "Music loaded"
        );
        LoadPhase::Ready
    }

    fn report_load_failure(&self, e: &PlaybackError) {
        error!(error = %e, "Failed to load music");
        self.ctx.notifier.notify(UserNotice::LoadFailed {
            asset: AssetKind::Music,
            name: self.source.name().to_string(),
        });
    }

    fn command(&self, target: TargetState) {
        self.reap_failure();
        self.target.store(target.as_u8(), Ordering::SeqCst);

        let slot = self.voice.lock();
        let Some(voice) = live(&slot) else {
            debug!(id = %self.id, ?target, "Recorded deferred state");
            return;
        };

        let result = match target {
            TargetState::Playing => voice.play(),
            TargetState::Paused => voice.pause(),
            TargetState::Stopped => voice.stop(),
        };
        if let Err(e) = result {
            warn!(id = %self.id, ?target, error = %e, "Voice rejected command");
        }
    }

    fn apply_target(&self, voice: &Arc<dyn DeviceVoice>) -> Result<()> {
        let target = resolve_target(self.target.load(Ordering::SeqCst))?;
        let result = match target {
            TargetState::Playing => voice.play(),
            TargetState::Paused => voice.pause(),
            TargetState::Stopped => voice.stop(),
        };
        if let Err(e) = result {
            warn!(?target, error = %e, "Voice rejected deferred state");
        }
        Ok(())
    }

    fn state(&self) -> InstanceState {
        if self.disposed.load(Ordering::SeqCst) {
            return InstanceState::Disposed;
        }

        let slot = self.voice.lock();
        match live(&slot) {
            Some(voice) => match voice.state() {
                Ok(VoiceState::Playing) => InstanceState::Playing,
                Ok(VoiceState::Paused) => InstanceState::Paused,
                Ok(VoiceState::Stopped) => InstanceState::Stopped,
                Err(e) => {
                    debug!(id = %self.id, error = %e, "Voice state unavailable");
                    InstanceState::Disposed
                }
            },
            None if slot.is_none() && self.loading.load(Ordering::SeqCst) => {
                InstanceState::Loading
            }
            None => InstanceState::Disposed,
        }
    }

    fn sync_volume(&self, voice: &Arc<dyn DeviceVoice>) {
        let gain = compose_volume(
            self.volume.load(Ordering::SeqCst),
            self.ctx.settings.music_volume(),
        );
        let volume = device_volume(gain, &self.ctx.device.volume_range());
        if let Err(e) = voice.set_volume(volume) {
            warn!(id = %self.id, error = %e, "Could not set voice volume");
        }
    }

    fn sync_loop(&self, voice: &Arc<dyn DeviceVoice>) {
        if !self.device_loops.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = voice.set_looped(self.looping.load(Ordering::SeqCst)) {
            warn!(id = %self.id, error = %e, "Could not set voice loop flag");
        }
    }

    fn reap_failure(&self) {
        if let Some(reason) = self.feed.take_failure() {
            error!(id = %self.id, %reason, "Feeding failed; disposing instance");
            self.dispose();
        }
    }

    fn dispose(&self) {
        self.teardown();
        if let Some(registry) = self.registry.upgrade() {
            registry.clear_active(self.id);
        }
    }

    fn teardown(&self) {
        self.cancel.cancel();
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let voice = self.voice.lock().take();
        if let Some(voice) = voice {
            if !voice.is_disposed() {
                if let Err(e) = voice.stop() {
                    warn!(id = %self.id, error = %e, "Voice stop failed during teardown");
                }
                voice.dispose();
            }
        }

        self.source.close();
        self.loading.store(false, Ordering::SeqCst);
        self.load_tx.send_if_modified(|current| {
            if *current == LoadPhase::Pending {
                *current = LoadPhase::Cancelled;
                true
            } else {
                false
            }
        });
        info!(id = %self.id, "Disposed music instance");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_volume() {
        assert_eq!(compose_volume(50, 80), 0.4);
        assert_eq!(compose_volume(100, 100), 1.0);
        assert_eq!(compose_volume(0, 100), 0.0);
        assert_eq!(compose_volume(250, 100), 1.0);
    }

    #[test]
    fn test_device_volume_maps_into_range() {
        assert_eq!(device_volume(0.4, &(0.0..=1.0)), 0.4);
        assert_eq!(device_volume(0.5, &(0.0..=2.0)), 1.0);
        assert_eq!(device_volume(1.5, &(0.0..=1.0)), 1.0);
        assert_eq!(device_volume(f32::NAN, &(0.0..=1.0)), 0.0);
    }

    #[test]
    fn test_target_state_roundtrip() {
        for target in [
            TargetState::Playing,
            TargetState::Paused,
            TargetState::Stopped,
        ] {
            assert_eq!(TargetState::from_u8(target.as_u8()), Some(target));
        }
        assert_eq!(TargetState::from_u8(7), None);
    }

    #[test]
    fn test_invalid_target_is_invariant_violation() {
        let err = resolve_target(9).unwrap_err();
        assert!(matches!(err, PlaybackError::InvariantViolation(_)));
    }

    #[test]
    fn test_instance_ids_unique() {
        assert_ne!(InstanceId::new(), InstanceId::new());
    }
}
