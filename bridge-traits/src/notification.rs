//! User-visible notification sink.
//!
//! The core reports failures the player should see (a track that will not
//! load) through this trait. Rendering, colouring and localization belong to
//! the host, so notices carry a stable key plus the data needed to format it.

use serde::{Deserialize, Serialize};

/// Kind of asset a notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Music,
}

/// Severity hint for the host's presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    Info,
    Warning,
    Error,
}

/// A user-facing notice emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserNotice {
    /// An asset could not be opened or decoded.
    LoadFailed {
        asset: AssetKind,
        /// Asset name (basename only; never a full path).
        name: String,
    },
}

impl UserNotice {
    /// Localization key the host should resolve.
    pub fn message_key(&self) -> &'static str {
        match self {
            UserNotice::LoadFailed { .. } => "errors.load_file",
        }
    }

    pub fn severity(&self) -> NoticeSeverity {
        match self {
            UserNotice::LoadFailed { .. } => NoticeSeverity::Error,
        }
    }
}

/// Destination for user-visible notices (chat box, toast, log).
pub trait NotificationSink: Send + Sync {
    /// Deliver a notice. Must not block and must not fail the caller.
    fn notify(&self, notice: UserNotice);
}
