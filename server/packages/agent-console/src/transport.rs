//! Outbound event transport.
//!
//! The runner emits canonical wire events without knowing where they go; a
//! sink delivers them to a browser socket, a channel, or a test collector.

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Destination for canonical wire events produced during one invocation.
pub trait EventSink: Send + Sync {
    /// Deliver one wire event. Delivery is fire-and-forget; a sink whose
    /// receiver is gone simply drops the event.
    fn send(&self, event: Value);

    /// Notification that the provider session id became known. Sinks that
    /// route by session id override this; the default ignores it.
    fn set_session_id(&self, _session_id: &str) {}
}

/// Sink that forwards events over an unbounded in-process channel.
pub struct ChannelSink {
    sender: UnboundedSender<Value>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<Value>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: Value) {
        if self.sender.send(event).is_err() {
            tracing::debug!("event receiver dropped; discarding event");
        }
    }
}
