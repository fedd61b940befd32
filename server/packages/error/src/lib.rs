use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error categories carried on wire payloads and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    EmptyPrompt,
    Spawn,
    NonZeroExit,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::EmptyPrompt => "empty_prompt",
            Self::Spawn => "spawn",
            Self::NonZeroExit => "non_zero_exit",
        }
    }
}

/// Fatal errors for a single CLI invocation.
///
/// Every variant terminates exactly one in-flight invocation. They are
/// reported to the browser transport as a canonical error event before the
/// invocation future resolves to `Err`.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("invalid CLI configuration: {message}")]
    Config { message: String },
    #[error("empty prompt is not supported for {provider} chat mode")]
    EmptyPrompt { provider: String },
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{provider} exited with code {code}")]
    NonZeroExit {
        provider: String,
        code: i32,
        stderr: String,
    },
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::EmptyPrompt { .. } => ErrorKind::EmptyPrompt,
            Self::Spawn { .. } => ErrorKind::Spawn,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
        }
    }

    /// Message placed in the canonical error event sent to the browser.
    ///
    /// For non-zero exits the accumulated stderr text wins when present;
    /// otherwise a generic "exited with code N" message is synthesized.
    pub fn event_message(&self) -> String {
        match self {
            Self::NonZeroExit { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            Self::Spawn { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}
