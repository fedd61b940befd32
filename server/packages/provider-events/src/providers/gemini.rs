use serde_json::{json, Value};

use crate::normalizer::{token_budget_from_result, NormalizedRecord};

/// Normalize one raw Gemini CLI stream-json record.
///
/// Gemini streams whole assistant messages as incremental `assistant` records
/// rather than Anthropic-style content-block deltas. The first text block of
/// each chunk is appended to the per-invocation rolling buffer and re-emitted
/// as a `content_block_delta`, so both providers present the same delta shape
/// to the consumer. The terminal `result` record flushes a
/// `content_block_stop` when buffered text exists.
pub fn normalize(
    raw: Value,
    message_buffer: &mut String,
    context_window: u64,
) -> Vec<NormalizedRecord> {
    match raw.get("type").and_then(Value::as_str) {
        Some("system") => {
            if raw.get("subtype").and_then(Value::as_str) == Some("init") {
                vec![NormalizedRecord::Record(raw)]
            } else {
                Vec::new()
            }
        }
        Some("assistant") => match first_text_block(&raw) {
            Some(text) => {
                message_buffer.push_str(text);
                vec![NormalizedRecord::Record(json!({
                    "type": "content_block_delta",
                    "delta": { "type": "text_delta", "text": text },
                }))]
            }
            None => Vec::new(),
        },
        Some("result") => {
            let mut out = Vec::with_capacity(2);
            if !message_buffer.is_empty() {
                message_buffer.clear();
                out.push(NormalizedRecord::Record(
                    json!({"type": "content_block_stop"}),
                ));
            }
            if let Some((used, total)) = token_budget_from_result(&raw, context_window) {
                out.push(NormalizedRecord::TokenBudget { used, total });
            }
            let success = raw.get("subtype").and_then(Value::as_str) == Some("success");
            out.push(NormalizedRecord::Result { data: raw, success });
            out
        }
        _ => vec![NormalizedRecord::Record(raw)],
    }
}

fn first_text_block(record: &Value) -> Option<&str> {
    record
        .get("message")?
        .get("content")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
}
