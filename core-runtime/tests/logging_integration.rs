//! Integration tests for logging system

use core_runtime::logging::{init_logging, strip_path, LogFormat, LogLevel, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_init_logging_once_per_process() {
    // The global subscriber can only be installed once per process, so the
    // first and second initialization are exercised in the same test.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_spans(false);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::debug!(track = %strip_path("Music/Title.ogg"), "logging initialized");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_path_stripping() {
    // Unix paths
    assert_eq!(strip_path("/home/player/client/resources/music/title.ogg"), "title.ogg");

    // Windows paths
    assert_eq!(strip_path("C:\\Games\\Client\\resources\\music\\battle.ogg"), "battle.ogg");

    // Already basename
    assert_eq!(strip_path("town.ogg"), "town.ogg");

    // Edge cases
    assert_eq!(strip_path("/var/log/"), "");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    // Debug builds should default to Pretty
    #[cfg(debug_assertions)]
    {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
    }

    // Release builds should default to JSON
    #[cfg(not(debug_assertions))]
    {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
    }
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_filter("core_playback=trace")
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(config.filter.as_deref(), Some("core_playback=trace"));
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_log_level_deserializes_lowercase() {
    let level: LogLevel = serde_json::from_str("\"warn\"").unwrap();
    assert_eq!(level, LogLevel::Warn);
}
