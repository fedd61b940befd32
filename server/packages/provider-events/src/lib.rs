//! Canonical browser-facing event model and per-provider normalizers.
//!
//! Each CLI provider emits newline-delimited JSON records in its own shape.
//! The normalizers in [`providers`] re-map those records into one canonical
//! stream so the browser never has to know which CLI produced them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod normalizer;
pub mod providers;

pub use normalizer::{EventNormalizer, NormalizedRecord};

/// Which external CLI is driving this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Claude => "Claude CLI",
            ProviderKind::Gemini => "Gemini CLI",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "claude" => Some(ProviderKind::Claude),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event on the per-invocation browser channel.
///
/// The `sessionId` field is attached at serialization time because the id is
/// usually discovered mid-stream, after the first events have already been
/// produced by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    SessionCreated {
        session_id: String,
        model: Option<String>,
        cwd: Option<String>,
    },
    Response {
        data: Value,
        success: Option<bool>,
    },
    TokenBudget {
        used: u64,
        total: u64,
    },
    Complete {
        exit_code: i32,
        is_new_session: bool,
    },
    Error {
        message: String,
    },
}

impl CanonicalEvent {
    /// Serialize to the wire shape consumed by the UI.
    ///
    /// Response/complete/error types are prefixed with the provider name
    /// (`claude-response`, `gemini-complete`, ...); `session-created` and
    /// `token-budget` are provider-agnostic.
    pub fn to_wire(&self, provider: ProviderKind, session_id: Option<&str>) -> Value {
        let session = match session_id {
            Some(id) => Value::String(id.to_string()),
            None => Value::Null,
        };
        match self {
            CanonicalEvent::SessionCreated {
                session_id,
                model,
                cwd,
            } => {
                let mut wire = json!({
                    "type": "session-created",
                    "sessionId": session_id,
                });
                if let Some(model) = model {
                    wire["model"] = Value::String(model.clone());
                }
                if let Some(cwd) = cwd {
                    wire["cwd"] = Value::String(cwd.clone());
                }
                wire
            }
            CanonicalEvent::Response { data, success } => {
                let mut wire = json!({
                    "type": format!("{}-response", provider.as_str()),
                    "data": data,
                    "sessionId": session,
                });
                if let Some(success) = success {
                    wire["success"] = Value::Bool(*success);
                }
                wire
            }
            CanonicalEvent::TokenBudget { used, total } => json!({
                "type": "token-budget",
                "data": { "used": used, "total": total },
                "sessionId": session,
            }),
            CanonicalEvent::Complete {
                exit_code,
                is_new_session,
            } => json!({
                "type": format!("{}-complete", provider.as_str()),
                "sessionId": session,
                "exitCode": exit_code,
                "isNewSession": is_new_session,
            }),
            CanonicalEvent::Error { message } => json!({
                "type": format!("{}-error", provider.as_str()),
                "error": message,
                "sessionId": session,
            }),
        }
    }
}

/// Non-empty `session_id` carried by a normalized record, if any.
pub fn record_session_id(record: &Value) -> Option<&str> {
    record
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Model and working-directory metadata from a session-init record.
///
/// Present on the secondary provider's `system`/`init` shape (and on recent
/// primary-provider init records); absent fields stay `None`.
pub fn record_session_metadata(record: &Value) -> (Option<String>, Option<String>) {
    let model = record
        .get("model")
        .and_then(Value::as_str)
        .map(str::to_string);
    let cwd = record
        .get("cwd")
        .and_then(Value::as_str)
        .map(str::to_string);
    (model, cwd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_wire_shape_is_provider_prefixed() {
        let event = CanonicalEvent::Response {
            data: json!({"type": "system"}),
            success: None,
        };
        let wire = event.to_wire(ProviderKind::Claude, Some("abc"));
        assert_eq!(wire["type"], "claude-response");
        assert_eq!(wire["sessionId"], "abc");
        assert!(wire.get("success").is_none());
    }

    #[test]
    fn error_wire_carries_null_session_when_unknown() {
        let event = CanonicalEvent::Error {
            message: "nope".to_string(),
        };
        let wire = event.to_wire(ProviderKind::Gemini, None);
        assert_eq!(wire["type"], "gemini-error");
        assert!(wire["sessionId"].is_null());
        assert_eq!(wire["error"], "nope");
    }

    #[test]
    fn session_created_includes_init_metadata() {
        let event = CanonicalEvent::SessionCreated {
            session_id: "s1".to_string(),
            model: Some("gemini-2.5-pro".to_string()),
            cwd: None,
        };
        let wire = event.to_wire(ProviderKind::Gemini, Some("s1"));
        assert_eq!(wire["type"], "session-created");
        assert_eq!(wire["model"], "gemini-2.5-pro");
        assert!(wire.get("cwd").is_none());
    }

    #[test]
    fn session_id_extraction_skips_empty_values() {
        assert_eq!(record_session_id(&json!({"session_id": "x"})), Some("x"));
        assert_eq!(record_session_id(&json!({"session_id": ""})), None);
        assert_eq!(record_session_id(&json!({"type": "result"})), None);
    }
}
