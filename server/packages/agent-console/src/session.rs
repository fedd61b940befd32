//! Mid-stream discovery of the provider session id.

use serde_json::Value;

use agent_console_events::{record_session_id, record_session_metadata};

/// First sighting of a session id on the normalized stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDiscovery {
    pub session_id: String,
    /// Whether a `session-created` event should be announced. False for
    /// resumed sessions.
    pub announce: bool,
    pub model: Option<String>,
    pub cwd: Option<String>,
}

/// Per-invocation session-id state machine.
///
/// New sessions start without an id; the provider reports it mid-stream, not
/// at spawn time. The tracker latches onto the first non-empty `session_id`
/// it sees and guarantees at most one discovery per invocation.
#[derive(Debug)]
pub struct SessionTracker {
    caller_supplied: bool,
    captured: Option<String>,
    created_sent: bool,
}

impl SessionTracker {
    pub fn new(caller_session_id: Option<String>) -> Self {
        Self {
            caller_supplied: caller_session_id.is_some(),
            captured: caller_session_id,
            created_sent: false,
        }
    }

    /// The best-known session id for outgoing events.
    pub fn session_id(&self) -> Option<&str> {
        self.captured.as_deref()
    }

    /// True when the caller supplied a session id at invocation start.
    pub fn is_resume(&self) -> bool {
        self.caller_supplied
    }

    /// Inspect a normalized record; fires once when the id is first seen.
    pub fn observe(&mut self, record: &Value) -> Option<SessionDiscovery> {
        if self.captured.is_some() {
            return None;
        }
        let session_id = record_session_id(record)?.to_string();
        self.captured = Some(session_id.clone());

        let announce = !self.caller_supplied && !self.created_sent;
        if announce {
            self.created_sent = true;
        }
        let (model, cwd) = record_session_metadata(record);
        Some(SessionDiscovery {
            session_id,
            announce,
            model,
            cwd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discovers_id_exactly_once() {
        let mut tracker = SessionTracker::new(None);
        let record = json!({"type": "system", "subtype": "init", "session_id": "abc"});

        let discovery = tracker.observe(&record).expect("first sighting fires");
        assert_eq!(discovery.session_id, "abc");
        assert!(discovery.announce);

        // Second record carrying the same id must not fire again.
        assert!(tracker.observe(&record).is_none());
        assert_eq!(tracker.session_id(), Some("abc"));
    }

    #[test]
    fn resumed_sessions_never_announce() {
        let mut tracker = SessionTracker::new(Some("known".to_string()));
        let record = json!({"session_id": "known"});
        assert!(tracker.observe(&record).is_none());
        assert_eq!(tracker.session_id(), Some("known"));
        assert!(tracker.is_resume());
    }

    #[test]
    fn empty_session_id_does_not_latch() {
        let mut tracker = SessionTracker::new(None);
        assert!(tracker.observe(&json!({"session_id": ""})).is_none());
        assert!(tracker.observe(&json!({"type": "result"})).is_none());
        assert_eq!(tracker.session_id(), None);
    }

    #[test]
    fn discovery_carries_init_metadata() {
        let mut tracker = SessionTracker::new(None);
        let record = json!({
            "type": "system",
            "subtype": "init",
            "session_id": "g1",
            "model": "gemini-2.5-pro",
            "cwd": "/work"
        });
        let discovery = tracker.observe(&record).expect("fires");
        assert_eq!(discovery.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(discovery.cwd.as_deref(), Some("/work"));
    }
}
