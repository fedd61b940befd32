use serde_json::Value;

use crate::normalizer::{token_budget_from_result, NormalizedRecord};

// Fields promoted from a stream_event wrapper onto its inner event.
const PROMOTED_FIELDS: &[&str] = &["session_id", "parent_tool_use_id", "uuid"];

/// Normalize one raw Claude CLI stream-json record.
///
/// The CLI wraps Anthropic-style events in an outer envelope:
/// `{ "type": "stream_event", "event": { "type": "content_block_delta", ... }, "session_id": "..." }`.
/// Consumers only understand the inner shape, so the wrapper is unwrapped and
/// the outer identity fields are copied down where the inner event does not
/// already define them. Everything else passes through verbatim.
pub fn normalize(raw: Value, context_window: u64) -> Vec<NormalizedRecord> {
    let record = unwrap_stream_event(raw);

    let mut out = Vec::with_capacity(1);
    if let Some((used, total)) = token_budget_from_result(&record, context_window) {
        out.push(NormalizedRecord::Record(record));
        out.push(NormalizedRecord::TokenBudget { used, total });
    } else {
        out.push(NormalizedRecord::Record(record));
    }
    out
}

fn unwrap_stream_event(raw: Value) -> Value {
    let is_wrapper = raw.get("type").and_then(Value::as_str) == Some("stream_event")
        && raw.get("event").map(Value::is_object).unwrap_or(false);
    if !is_wrapper {
        return raw;
    }

    let mut inner = raw.get("event").cloned().unwrap_or(Value::Null);
    for field in PROMOTED_FIELDS {
        if inner.get(field).is_none() {
            if let Some(value) = raw.get(field) {
                inner[*field] = value.clone();
            }
        }
    }
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(raw: Value) -> Vec<NormalizedRecord> {
        normalize(raw, 160_000)
    }

    #[test]
    fn unwraps_stream_event_and_promotes_session_id() {
        let raw = json!({
            "type": "stream_event",
            "session_id": "S",
            "event": {"type": "content_block_delta", "delta": {"text": "hi"}}
        });
        let out = records(raw);
        assert_eq!(out.len(), 1);
        let NormalizedRecord::Record(record) = &out[0] else {
            panic!("expected record");
        };
        assert_eq!(record["type"], "content_block_delta");
        assert_eq!(record["session_id"], "S");
    }

    #[test]
    fn inner_session_id_is_not_overwritten() {
        let raw = json!({
            "type": "stream_event",
            "session_id": "S",
            "event": {"type": "x", "session_id": "T"}
        });
        let out = records(raw);
        let NormalizedRecord::Record(record) = &out[0] else {
            panic!("expected record");
        };
        assert_eq!(record["session_id"], "T");
    }

    #[test]
    fn promotes_parent_tool_use_id_and_uuid() {
        let raw = json!({
            "type": "stream_event",
            "parent_tool_use_id": "tool_1",
            "uuid": "u-1",
            "event": {"type": "content_block_stop"}
        });
        let out = records(raw);
        let NormalizedRecord::Record(record) = &out[0] else {
            panic!("expected record");
        };
        assert_eq!(record["parent_tool_use_id"], "tool_1");
        assert_eq!(record["uuid"], "u-1");
    }

    #[test]
    fn wrapper_without_inner_object_passes_through() {
        let raw = json!({"type": "stream_event", "event": "oops"});
        let out = records(raw.clone());
        assert_eq!(out, vec![NormalizedRecord::Record(raw)]);
    }

    #[test]
    fn plain_records_pass_through_verbatim() {
        let raw = json!({"type": "system", "subtype": "init", "session_id": "abc"});
        let out = records(raw.clone());
        assert_eq!(out, vec![NormalizedRecord::Record(raw)]);
    }

    #[test]
    fn result_with_usage_adds_token_budget() {
        let raw = json!({
            "type": "result",
            "subtype": "success",
            "modelUsage": {"m": {"inputTokens": 5, "outputTokens": 5}}
        });
        let out = records(raw);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1],
            NormalizedRecord::TokenBudget {
                used: 10,
                total: 160_000
            }
        );
    }
}
