use serde_json::Value;

use crate::providers::{claude, gemini};
use crate::ProviderKind;

/// Fallback context window when `CONTEXT_WINDOW` is unset.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 160_000;

/// Output of normalizing one raw stdout record.
///
/// A single raw record may expand to zero or more of these; the common case
/// is one-to-one.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    /// Forward as a response event. Session discovery sniffs the
    /// `session_id` field of these records.
    Record(Value),
    /// Terminal result record with the provider's success flag.
    Result { data: Value, success: bool },
    /// Usage accounting derived from a result record.
    TokenBudget { used: u64, total: u64 },
}

/// Stateful per-invocation normalizer.
///
/// Holds the rolling assistant-message buffer needed by the secondary
/// provider's incremental message shape. One instance per invocation; never
/// shared across sessions.
#[derive(Debug)]
pub struct EventNormalizer {
    provider: ProviderKind,
    context_window: u64,
    message_buffer: String,
}

impl EventNormalizer {
    pub fn new(provider: ProviderKind, context_window: u64) -> Self {
        Self {
            provider,
            context_window,
            message_buffer: String::new(),
        }
    }

    pub fn normalize(&mut self, raw: Value) -> Vec<NormalizedRecord> {
        match self.provider {
            ProviderKind::Claude => claude::normalize(raw, self.context_window),
            ProviderKind::Gemini => {
                gemini::normalize(raw, &mut self.message_buffer, self.context_window)
            }
        }
    }
}

/// Token-budget side event for a `result` record carrying per-model usage.
///
/// Sums input, output, cache-read and cache-write counters for the first
/// model entry. Cumulative counters always win when present and non-zero;
/// per-call counters are only a fallback.
pub(crate) fn token_budget_from_result(record: &Value, context_window: u64) -> Option<(u64, u64)> {
    if record.get("type").and_then(Value::as_str) != Some("result") {
        return None;
    }
    let usage = record.get("modelUsage")?.as_object()?;
    let (_, model) = usage.iter().next()?;

    let used = counter(model, "cumulativeInputTokens", "inputTokens")
        + counter(model, "cumulativeOutputTokens", "outputTokens")
        + counter(model, "cumulativeCacheReadInputTokens", "cacheReadInputTokens")
        + counter(
            model,
            "cumulativeCacheCreationInputTokens",
            "cacheCreationInputTokens",
        );
    Some((used, context_window))
}

fn counter(model: &Value, cumulative: &str, per_call: &str) -> u64 {
    let value = model.get(cumulative).and_then(Value::as_u64).unwrap_or(0);
    if value > 0 {
        return value;
    }
    model.get(per_call).and_then(Value::as_u64).unwrap_or(0)
}
