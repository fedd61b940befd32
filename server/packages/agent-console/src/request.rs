use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tool allow/deny configuration passed through from the browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsSettings {
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    #[serde(default)]
    pub skip_permissions: bool,
}

/// Permission mode forwarded to the CLI's `--permission-mode` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionMode {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
    #[serde(rename = "bypassPermissions")]
    BypassPermissions,
    #[serde(rename = "plan")]
    Plan,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(PermissionMode::Default),
            "acceptEdits" => Some(PermissionMode::AcceptEdits),
            "bypassPermissions" => Some(PermissionMode::BypassPermissions),
            "plan" => Some(PermissionMode::Plan),
            _ => None,
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inline image payload from the browser, as a `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub data: String,
}

/// One user turn. Immutable once handed to the launcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub prompt: String,
    /// Present when resuming an existing provider session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub tools_settings: ToolsSettings,
    #[serde(default)]
    pub permission_mode: PermissionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

impl InvocationRequest {
    pub fn new(prompt: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: None,
            working_directory: working_directory.into(),
            tools_settings: ToolsSettings::default(),
            permission_mode: PermissionMode::Default,
            model: None,
            images: Vec::new(),
        }
    }

    /// Skip-permissions forces bypass regardless of the requested mode.
    pub fn resolved_permission_mode(&self) -> PermissionMode {
        if self.tools_settings.skip_permissions {
            PermissionMode::BypassPermissions
        } else {
            self.permission_mode
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_permissions_forces_bypass() {
        let mut request = InvocationRequest::new("hi", "/tmp");
        request.permission_mode = PermissionMode::Plan;
        request.tools_settings.skip_permissions = true;
        assert_eq!(
            request.resolved_permission_mode(),
            PermissionMode::BypassPermissions
        );
    }

    #[test]
    fn permission_mode_round_trips_through_flag_values() {
        for mode in [
            PermissionMode::Default,
            PermissionMode::AcceptEdits,
            PermissionMode::BypassPermissions,
            PermissionMode::Plan,
        ] {
            assert_eq!(PermissionMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(PermissionMode::parse("yolo"), None);
    }
}
