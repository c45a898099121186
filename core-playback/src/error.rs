//! # Playback Error Types
//!
//! Error types for music decoding, feeding and device control.
//!
//! None of these escape the [`MusicInstance`](crate::instance::MusicInstance)
//! control surface; the controller logs them and degrades to silence.

use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The audio file is missing, unreadable or not a recognised container.
    #[error("Failed to open audio source {path:?}: {reason}")]
    DecodeOpen { path: PathBuf, reason: String },

    /// The source has no path configured.
    #[error("Audio source has no path")]
    EmptySourcePath,

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio format was detected but cannot be played on a device voice.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred while decoding an already-open stream.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Seeking back to the start of the stream failed.
    #[error("Seek failed: {0}")]
    Seek(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The platform audio device refused an operation.
    #[error("Audio device error: {0}")]
    Device(#[from] BridgeError),

    // ========================================================================
    // Configuration/Runtime Errors
    // ========================================================================
    /// Invalid playback configuration.
    #[error("Invalid playback configuration: {0}")]
    Config(String),

    /// Runtime wiring failed (missing capability, no task runtime).
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal invariant was broken (should not occur in normal operation).
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl PlaybackError {
    /// Returns `true` if the error comes from opening or decoding the stream.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::DecodeOpen { .. }
                | PlaybackError::EmptySourcePath
                | PlaybackError::UnsupportedFormat(_)
                | PlaybackError::Decode(_)
                | PlaybackError::Seek(_)
        )
    }

    /// Returns `true` if the error was raised by the platform device.
    pub fn is_device_error(&self) -> bool {
        matches!(self, PlaybackError::Device(_))
    }

    pub(crate) fn decode_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PlaybackError::DecodeOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let open = PlaybackError::decode_open("music/theme.ogg", "not found");
        assert!(open.is_decode_error());
        assert!(!open.is_device_error());

        let device = PlaybackError::from(BridgeError::DeviceUnavailable("unplugged".into()));
        assert!(device.is_device_error());
        assert!(!device.is_decode_error());

        assert!(!PlaybackError::InvariantViolation("x".into()).is_decode_error());
    }

    #[test]
    fn test_decode_open_message_names_path() {
        let err = PlaybackError::decode_open("music/theme.ogg", "not found");
        let text = err.to_string();
        assert!(text.contains("theme.ogg"));
        assert!(text.contains("not found"));
    }
}
