use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::events::SessionEvent;

/// Where a session sends user-facing notices and outbound events.
///
/// Both calls are fire-and-forget: a sink that cannot deliver drops the
/// message.
pub trait SessionSink: Send + Sync {
    /// Transient message for the user (toast).
    fn notify(&self, message: &str);

    fn publish(&self, event: SessionEvent);
}

/// Logs everything and delivers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SessionSink for TracingSink {
    fn notify(&self, message: &str) {
        info!(message, "Notification");
    }

    fn publish(&self, event: SessionEvent) {
        debug!(?event, "Session event");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkMessage {
    Notice(String),
    Event(SessionEvent),
}

/// Forwards into an unbounded channel drained by the page runtime.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionSink for ChannelSink {
    fn notify(&self, message: &str) {
        let _ = self.tx.send(SinkMessage::Notice(message.to_string()));
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(SinkMessage::Event(event));
    }
}
