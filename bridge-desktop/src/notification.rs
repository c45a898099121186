//! Notification sinks for desktop hosts

use bridge_traits::{NoticeSeverity, NotificationSink, UserNotice};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Logs every notice through `tracing`.
///
/// Default sink when the host has no chat box to show notices in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notice: UserNotice) {
        let key = notice.message_key();
        match notice.severity() {
            NoticeSeverity::Info => info!(key, ?notice, "User notice"),
            NoticeSeverity::Warning => warn!(key, ?notice, "User notice"),
            NoticeSeverity::Error => error!(key, ?notice, "User notice"),
        }
    }
}

/// Forwards notices to a UI task over an unbounded channel.
///
/// Sending never blocks; notices sent after the receiver is dropped are
/// discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotificationSink {
    tx: mpsc::UnboundedSender<UserNotice>,
}

impl ChannelNotificationSink {
    /// Create a sink and the receiver the UI should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UserNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, notice: UserNotice) {
        if self.tx.send(notice).is_err() {
            warn!("Notification receiver dropped; discarding notice");
        }
    }
}
