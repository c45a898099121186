//! Tests for the music instance state machine and the active-music registry.
//!
//! This test suite verifies:
//! - Background load and deferred play/pause/stop application
//! - Volume composition with the global music volume
//! - Loop flag handling per feed mode
//! - Load failures, feed failures and user notices
//! - Single-active-music replacement and idempotent dispose

mod common;

use bridge_desktop::{JsonSettingsStore, TracingNotificationSink};
use bridge_traits::{
    AssetKind, AudioSettings, DeviceVoice, NotificationSink, StaticAudioSettings, UserNotice,
};
use common::{
    context, eventually, small_buffers, FakeDecoder, FakeDecoderFactory, FakeDevice, Gate,
};
use core_playback::{
    InstanceState, LoadPhase, MusicRegistry, MusicSource, PlaybackConfig, PlaybackContext,
    PlaybackError, TargetState,
};
use mockall::mock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Notifier {}

    impl NotificationSink for Notifier {
        fn notify(&self, notice: UserNotice);
    }
}

mock! {
    pub Settings {}

    impl AudioSettings for Settings {
        fn music_volume(&self) -> u32;
    }
}

fn quiet() -> Arc<dyn NotificationSink> {
    Arc::new(TracingNotificationSink)
}

fn full_volume() -> Arc<dyn AudioSettings> {
    Arc::new(StaticAudioSettings::default())
}

fn ramp_context(device: Arc<FakeDevice>) -> PlaybackContext {
    context(
        device,
        full_volume(),
        quiet(),
        FakeDecoderFactory::ramp(1_000),
        small_buffers(),
    )
}

// ============================================================================
// Loading and deferred state
// ============================================================================

#[tokio::test]
async fn test_new_instance_is_stopped_after_load() {
    let device = FakeDevice::new();
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    assert_eq!(instance.deferred_state(), Some(TargetState::Stopped));

    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Ready);
    assert_eq!(instance.state(), InstanceState::Stopped);

    let voice = device.last_voice().unwrap();
    assert_eq!(voice.commands(), vec!["stop"]);
    assert_eq!(voice.submit_count(), 3, "queue primed during load");
    assert!(voice.has_handler());
}

#[tokio::test]
async fn test_only_last_command_during_loading_is_applied() {
    let gate = Gate::new();
    let device = FakeDevice::new();
    let ctx = context(
        device.clone(),
        full_volume(),
        quiet(),
        FakeDecoderFactory::gated(gate.clone(), |_| Ok(FakeDecoder::stereo_ramp(1_000))),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.play();
    instance.stop();
    instance.pause();

    assert_eq!(instance.state(), InstanceState::Loading);
    assert_eq!(instance.load_phase(), LoadPhase::Pending);
    assert_eq!(instance.deferred_state(), Some(TargetState::Paused));

    gate.open();
    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Ready);

    assert_eq!(instance.state(), InstanceState::Paused);
    assert_eq!(device.last_voice().unwrap().commands(), vec!["pause"]);
}

#[tokio::test]
async fn test_commands_after_load_are_forwarded() {
    let device = FakeDevice::new();
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.wait_until_loaded().await;

    instance.play();
    assert_eq!(instance.state(), InstanceState::Playing);
    instance.pause();
    assert_eq!(instance.state(), InstanceState::Paused);
    instance.stop();
    assert_eq!(instance.state(), InstanceState::Stopped);
    assert_eq!(instance.deferred_state(), Some(TargetState::Stopped));

    assert_eq!(
        device.last_voice().unwrap().commands(),
        vec!["stop", "play", "pause", "stop"]
    );
}

#[tokio::test]
async fn test_streaming_voice_keeps_feeding_on_notification() {
    let device = FakeDevice::new();
    let ctx = context(
        device.clone(),
        full_volume(),
        quiet(),
        FakeDecoderFactory::ramp(10),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("loop.ogg").create_instance(&ctx, &registry);
    instance.play();
    instance.wait_until_loaded().await;

    let voice = device.last_voice().unwrap();
    voice.consume(3);
    voice.fire_buffer_needed();

    assert_eq!(voice.submit_count(), 6);
    assert_eq!(instance.feed_stats().buffers_submitted, 6);
    assert_eq!(instance.feed_stats().rewinds, 1);
    assert_eq!(instance.state(), InstanceState::Playing);
}

// ============================================================================
// Volume and looping
// ============================================================================

#[tokio::test]
async fn test_volume_composes_with_music_volume() {
    let device = FakeDevice::new();
    let mut settings = MockSettings::new();
    settings.expect_music_volume().return_const(80u32);
    let ctx = context(
        device.clone(),
        Arc::new(settings),
        quiet(),
        FakeDecoderFactory::ramp(1_000),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.set_volume(50);
    instance.wait_until_loaded().await;

    let voice = device.last_voice().unwrap();
    assert_eq!(voice.volume(), Some(0.4), "volume applied on load");

    instance.set_volume(50);
    assert_eq!(voice.volume(), Some(0.4), "repeated calls are stable");

    instance.set_volume(100);
    assert_eq!(voice.volume(), Some(0.8));
    assert_eq!(instance.volume(), 100);
}

#[tokio::test]
async fn test_volume_follows_global_setting_changes() {
    let device = FakeDevice::new();
    let settings = Arc::new(JsonSettingsStore::in_memory());
    settings.set_music_volume(100).unwrap();
    let ctx = context(
        device.clone(),
        settings.clone(),
        quiet(),
        FakeDecoderFactory::ramp(1_000),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.wait_until_loaded().await;
    instance.set_volume(50);
    let voice = device.last_voice().unwrap();
    assert_eq!(voice.volume(), Some(0.5));

    settings.set_music_volume(20).unwrap();
    instance.refresh_volume();
    assert_eq!(voice.volume(), Some(0.1));
}

#[tokio::test]
async fn test_volume_maps_into_device_range_and_clamps() {
    let device = FakeDevice::with_range(0.0..=2.0);
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.wait_until_loaded().await;

    instance.set_volume(50);
    assert_eq!(device.last_voice().unwrap().volume(), Some(1.0));

    instance.set_volume(400);
    assert_eq!(instance.volume(), 100);
    assert_eq!(device.last_voice().unwrap().volume(), Some(2.0));
}

#[tokio::test]
async fn test_streaming_loop_flag_stays_at_feeder() {
    let device = FakeDevice::new();
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.set_looping(true);
    instance.wait_until_loaded().await;

    assert!(instance.is_looping());
    assert_eq!(device.last_voice().unwrap().looped(), None);
}

#[tokio::test]
async fn test_full_decode_forwards_loop_flag() {
    let device = FakeDevice::new();
    let ctx = context(
        device.clone(),
        full_volume(),
        quiet(),
        FakeDecoderFactory::ramp(25),
        PlaybackConfig {
            samples_per_buffer: 8,
            ..PlaybackConfig::full_decode()
        },
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("jingle.wav").create_instance(&ctx, &registry);
    instance.set_looping(true);
    instance.play();
    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Ready);

    let voice = device.last_voice().unwrap();
    assert_eq!(voice.looped(), Some(true));
    assert_eq!(voice.submit_count(), 1);
    assert!(!voice.has_handler());
    assert_eq!(instance.state(), InstanceState::Playing);

    instance.set_looping(false);
    assert_eq!(voice.looped(), Some(false));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_open_failure_notifies_and_disposes() {
    let device = FakeDevice::new();
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .withf(|notice| {
            matches!(
                notice,
                UserNotice::LoadFailed { asset: AssetKind::Music, name } if name == "missing.ogg"
            )
        })
        .times(1)
        .return_const(());
    let decoders = FakeDecoderFactory::new(|path| {
        Err(PlaybackError::DecodeOpen {
            path: path.to_path_buf(),
            reason: "not found".to_string(),
        })
    });
    let ctx = context(
        device.clone(),
        full_volume(),
        Arc::new(notifier),
        decoders,
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("music/missing.ogg").create_instance(&ctx, &registry);
    instance.play();

    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Failed);
    assert_eq!(instance.state(), InstanceState::Disposed);
    assert!(device.voices().is_empty());

    // Commands on a voiceless instance are harmless.
    instance.pause();
    instance.set_volume(10);
    assert_eq!(instance.state(), InstanceState::Disposed);
}

#[tokio::test]
async fn test_empty_path_stays_silent_without_notice() {
    let device = FakeDevice::new();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().times(0);
    let ctx = context(
        device.clone(),
        full_volume(),
        Arc::new(notifier),
        FakeDecoderFactory::ramp(1_000),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new(PathBuf::new()).create_instance(&ctx, &registry);
    instance.play();

    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Failed);
    assert_eq!(instance.state(), InstanceState::Disposed);
    assert!(device.voices().is_empty());
}

#[tokio::test]
async fn test_device_failure_is_reported_as_load_failure() {
    let device = FakeDevice::new();
    device.set_failing(true);
    let (notifier, mut notices) = bridge_desktop::ChannelNotificationSink::new();
    let ctx = context(
        device.clone(),
        full_volume(),
        Arc::new(notifier),
        FakeDecoderFactory::ramp(1_000),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Failed);

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.message_key(), "errors.load_file");
}

#[tokio::test]
async fn test_feed_failure_is_reaped_on_next_call() {
    let device = FakeDevice::new();
    let ctx = context(
        device.clone(),
        full_volume(),
        quiet(),
        FakeDecoderFactory::new(|_| Ok(FakeDecoder::stereo_ramp(1_000).failing_at(24))),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.play();
    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Ready);
    assert_eq!(registry.active_id(), Some(instance.id()));

    let voice = device.last_voice().unwrap();
    voice.consume(1);
    voice.fire_buffer_needed();

    assert_eq!(instance.state(), InstanceState::Disposed);
    assert!(voice.is_disposed());
    assert!(registry.active().is_none());
}

#[tokio::test]
async fn test_dispose_while_opening_cancels() {
    let gate = Gate::new();
    let device = FakeDevice::new();
    let decoders =
        FakeDecoderFactory::gated(gate.clone(), |_| Ok(FakeDecoder::stereo_ramp(1_000)));
    let ctx = context(
        device.clone(),
        full_volume(),
        quiet(),
        decoders.clone(),
        small_buffers(),
    );
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.play();
    assert!(eventually(|| decoders.entered()).await, "load parked in open");
    instance.dispose();

    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Cancelled);
    assert_eq!(instance.state(), InstanceState::Disposed);

    gate.open();
    assert!(
        eventually(|| {
            let voices = device.voices();
            !voices.is_empty() && voices.iter().all(|voice| voice.is_disposed())
        })
        .await
    );
    let voice = device.last_voice().unwrap();
    assert!(voice.commands().is_empty());
    assert_eq!(instance.load_phase(), LoadPhase::Cancelled);
}

fn held_full_decode(
    device: Arc<FakeDevice>,
    entered: Arc<Gate>,
    release: Arc<Gate>,
) -> PlaybackContext {
    context(
        device,
        full_volume(),
        quiet(),
        FakeDecoderFactory::new(move |_| {
            Ok(FakeDecoder::stereo_ramp(100).holding_reads(entered.clone(), release.clone()))
        }),
        PlaybackConfig {
            samples_per_buffer: 8,
            ..PlaybackConfig::full_decode()
        },
    )
}

#[tokio::test]
async fn test_controls_do_not_wait_for_full_decode() {
    let (entered, release) = (Gate::new(), Gate::new());
    let device = FakeDevice::new();
    let ctx = held_full_decode(device.clone(), entered.clone(), release.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("jingle.wav").create_instance(&ctx, &registry);
    assert!(eventually(|| entered.is_open()).await, "decode in progress");

    let controls = {
        let instance = instance.clone();
        tokio::task::spawn_blocking(move || {
            instance.play();
            instance.set_volume(30);
            instance.set_looping(true);
            instance.state()
        })
    };
    let state = tokio::time::timeout(Duration::from_secs(1), controls)
        .await
        .expect("controls blocked on the decode")
        .unwrap();
    assert_eq!(state, InstanceState::Loading);

    release.open();
    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Ready);

    let voice = device.last_voice().unwrap();
    assert_eq!(voice.commands(), vec!["play"]);
    assert_eq!(voice.volume(), Some(0.3));
    assert_eq!(voice.looped(), Some(true));
    assert_eq!(instance.state(), InstanceState::Playing);
}

#[tokio::test]
async fn test_dispose_during_full_decode_discards_voice() {
    let (entered, release) = (Gate::new(), Gate::new());
    let device = FakeDevice::new();
    let ctx = held_full_decode(device.clone(), entered.clone(), release.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("jingle.wav").create_instance(&ctx, &registry);
    instance.play();
    assert!(eventually(|| entered.is_open()).await, "decode in progress");

    // Teardown waits for the decoder, which is parked mid-read.
    let disposer = {
        let instance = instance.clone();
        tokio::task::spawn_blocking(move || instance.dispose())
    };
    assert!(eventually(|| instance.is_disposed()).await);
    release.open();
    disposer.await.unwrap();

    assert_eq!(instance.wait_until_loaded().await, LoadPhase::Cancelled);
    let voice = device.last_voice().unwrap();
    assert!(eventually(|| voice.is_disposed()).await);
    assert!(voice.commands().is_empty(), "no play reaches a disposed instance");
    assert_eq!(instance.state(), InstanceState::Disposed);
    assert!(registry.active().is_none());
}

// ============================================================================
// Dispose and the registry
// ============================================================================

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let device = FakeDevice::new();
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();
    let source = MusicSource::new("theme.ogg");

    let instance = source.create_instance(&ctx, &registry);
    instance.wait_until_loaded().await;
    instance.play();
    assert!(source.is_open());

    instance.dispose();
    instance.dispose();

    let voice = device.last_voice().unwrap();
    assert!(voice.is_disposed());
    assert_eq!(voice.commands(), vec!["stop", "play", "stop"]);
    assert!(!source.is_open());
    assert_eq!(instance.state(), InstanceState::Disposed);
    assert!(registry.active().is_none());
}

#[tokio::test]
async fn test_second_instance_replaces_first() {
    let device = FakeDevice::new();
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();

    let first = MusicSource::new("a.ogg").create_instance(&ctx, &registry);
    first.wait_until_loaded().await;
    first.play();
    let first_voice = device.last_voice().unwrap();

    let second = MusicSource::new("b.ogg").create_instance(&ctx, &registry);
    assert!(first.is_disposed());
    assert_eq!(first.state(), InstanceState::Disposed);
    assert!(first_voice.is_disposed());
    assert_eq!(first_voice.commands(), vec!["stop", "play", "stop"]);
    assert_eq!(registry.active_id(), Some(second.id()));

    second.play();
    assert_eq!(second.wait_until_loaded().await, LoadPhase::Ready);
    assert_eq!(second.state(), InstanceState::Playing);

    // Disposing the replaced instance must not evict the new one.
    first.dispose();
    assert_eq!(registry.active_id(), Some(second.id()));
}

#[tokio::test]
async fn test_replaying_same_source_reopens_decoder() {
    let device = FakeDevice::new();
    let decoders = FakeDecoderFactory::ramp(1_000);
    let ctx = context(
        device.clone(),
        full_volume(),
        quiet(),
        decoders.clone(),
        small_buffers(),
    );
    let registry = MusicRegistry::new();
    let source = MusicSource::new("theme.ogg");

    let first = source.create_instance(&ctx, &registry);
    first.wait_until_loaded().await;
    let second = source.create_instance(&ctx, &registry);
    assert_eq!(second.wait_until_loaded().await, LoadPhase::Ready);

    assert_eq!(decoders.opens(), 2);
    assert_eq!(device.voices().len(), 2);
    assert!(device.voices()[0].is_disposed());
    assert!(!device.voices()[1].is_disposed());
    assert_eq!(
        device.voices()[0].submitted()[0],
        device.voices()[1].submitted()[0],
        "second instance starts from the beginning"
    );
}

#[tokio::test]
async fn test_dropping_last_handle_tears_down() {
    let device = FakeDevice::new();
    let ctx = ramp_context(device.clone());
    let registry = MusicRegistry::new();

    let instance = MusicSource::new("theme.ogg").create_instance(&ctx, &registry);
    instance.wait_until_loaded().await;
    assert!(registry.clear_active(instance.id()));

    let voice = device.last_voice().unwrap();
    assert!(!voice.is_disposed());
    drop(instance);
    assert!(voice.is_disposed());
}

#[tokio::test]
async fn test_clear_active_ignores_other_ids() {
    let ctx = ramp_context(FakeDevice::new());
    let registry = MusicRegistry::new();

    let first = MusicSource::new("a.ogg").create_instance(&ctx, &registry);
    let second = MusicSource::new("b.ogg").create_instance(&ctx, &registry);

    assert!(!registry.clear_active(first.id()));
    assert_eq!(registry.active_id(), Some(second.id()));
    assert!(registry.clear_active(second.id()));
    assert!(registry.active().is_none());
}
