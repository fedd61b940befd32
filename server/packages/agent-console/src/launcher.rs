//! Provider profiles and process creation.
//!
//! The two providers share one launcher; everything that differs between
//! them (executable resolution, argument order, stdin handling, raw-event
//! normalization) is declared on the [`ProviderProfile`] selected once per
//! invocation.

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};

use agent_console_error::ConsoleError;
use agent_console_events::ProviderKind;

use crate::command::{format_command_for_display, resolve_command, CommandEnv, ResolvedCommand};
use crate::request::InvocationRequest;

/// How the child's standard input is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    /// Never opened; the CLI runs in pure print mode.
    Null,
    /// Opened piped, then closed immediately after spawn to signal that no
    /// interactive input is coming.
    CloseAfterSpawn,
}

#[derive(Debug, Clone)]
pub struct ProviderProfile {
    kind: ProviderKind,
    env: Option<CommandEnv>,
    fixed_executable: Option<&'static str>,
    stdin: StdinMode,
}

impl ProviderProfile {
    /// Primary provider resolved through layered configuration; supports
    /// routing through wrapper commands such as `ccr`.
    pub fn claude() -> Self {
        Self {
            kind: ProviderKind::Claude,
            env: Some(CommandEnv {
                command_var: "CLAUDE_CLI_COMMAND",
                path_var: "CLAUDE_CLI_PATH",
                args_var: "CLAUDE_CLI_ARGS",
                default_bin: "claude",
            }),
            fixed_executable: None,
            stdin: StdinMode::Null,
        }
    }

    /// Primary provider pinned to the official binary, bypassing any
    /// configured wrapper.
    pub fn claude_official() -> Self {
        Self {
            kind: ProviderKind::Claude,
            env: None,
            fixed_executable: Some("claude"),
            stdin: StdinMode::Null,
        }
    }

    /// Secondary provider.
    pub fn gemini() -> Self {
        Self {
            kind: ProviderKind::Gemini,
            env: Some(CommandEnv {
                command_var: "GEMINI_CLI_COMMAND",
                path_var: "GEMINI_CLI_PATH",
                args_var: "GEMINI_CLI_ARGS",
                default_bin: "gemini",
            }),
            fixed_executable: None,
            stdin: StdinMode::CloseAfterSpawn,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn stdin_mode(&self) -> StdinMode {
        self.stdin
    }

    pub fn resolve_command(&self) -> Result<ResolvedCommand, ConsoleError> {
        if let Some(executable) = self.fixed_executable {
            return Ok(ResolvedCommand {
                executable: executable.to_string(),
                args_prefix: Vec::new(),
            });
        }
        match &self.env {
            Some(env) => resolve_command(env),
            None => Err(ConsoleError::Config {
                message: format!("no command configuration for provider {}", self.kind),
            }),
        }
    }

    /// Compose the per-invocation argument vector.
    ///
    /// Order is significant: the target CLI parsers are positional about
    /// where the prompt and resume flags appear, so each provider's order is
    /// reproduced exactly.
    pub fn build_args(&self, request: &InvocationRequest, prompt: &str) -> Vec<String> {
        match self.kind {
            ProviderKind::Claude => self.claude_args(request, prompt),
            ProviderKind::Gemini => self.gemini_args(request, prompt),
        }
    }

    fn claude_args(&self, request: &InvocationRequest, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format=stream-json".to_string(),
            "--include-partial-messages".to_string(),
            "--verbose".to_string(),
            "--permission-mode".to_string(),
            request.resolved_permission_mode().as_str().to_string(),
        ];
        if let Some(model) = &request.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if !request.tools_settings.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.extend(request.tools_settings.allowed_tools.iter().cloned());
        }
        if !request.tools_settings.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.extend(request.tools_settings.disallowed_tools.iter().cloned());
        }
        if let Some(session_id) = &request.session_id {
            args.push("--resume".to_string());
            args.push(session_id.clone());
        }
        args
    }

    fn gemini_args(&self, request: &InvocationRequest, prompt: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(session_id) = &request.session_id {
            args.push("--resume".to_string());
            args.push(session_id.clone());
        }
        args.push("-p".to_string());
        args.push(prompt.to_string());
        // Model selection is only meaningful for new sessions.
        if request.session_id.is_none() {
            if let Some(model) = &request.model {
                args.push("--model".to_string());
                args.push(model.clone());
            }
        }
        args.push("--output-format".to_string());
        args.push("stream-json".to_string());
        if request.tools_settings.skip_permissions {
            args.push("-f".to_string());
        }
        args
    }
}

/// Spawn the CLI process with stdout/stderr piped and the full parent
/// environment inherited.
///
/// On Windows, npm-installed CLIs resolve to `.cmd` shim scripts that the OS
/// cannot execute directly, so the launch is routed through `cmd /C`; other
/// platforms spawn the executable directly.
pub fn spawn_cli(
    resolved: &ResolvedCommand,
    extra_args: &[String],
    working_dir: &Path,
    stdin: StdinMode,
) -> Result<Child, ConsoleError> {
    let mut args = resolved.args_prefix.clone();
    args.extend(extra_args.iter().cloned());

    let command_display = format_command_for_display(&resolved.executable, &args);
    tracing::info!(
        command = %command_display,
        cwd = %working_dir.display(),
        "spawning CLI process"
    );

    let mut command = platform_command(&resolved.executable, &args);
    command
        .current_dir(working_dir)
        .stdin(match stdin {
            StdinMode::Null => Stdio::null(),
            StdinMode::CloseAfterSpawn => Stdio::piped(),
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|err| {
        tracing::error!(command = %command_display, error = %err, "failed to spawn CLI process");
        ConsoleError::Spawn {
            command: command_display.clone(),
            source: err,
        }
    })?;

    if stdin == StdinMode::CloseAfterSpawn {
        // Dropping the handle closes the pipe; the CLI sees EOF immediately.
        drop(child.stdin.take());
    }

    tracing::info!(pid = child.id(), "CLI process spawned");
    Ok(child)
}

#[cfg(windows)]
fn platform_command(executable: &str, args: &[String]) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(executable).args(args);
    command
}

#[cfg(not(windows))]
fn platform_command(executable: &str, args: &[String]) -> Command {
    let mut command = Command::new(executable);
    command.args(args);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PermissionMode;

    fn request() -> InvocationRequest {
        InvocationRequest::new("hello", "/work")
    }

    #[test]
    fn claude_args_reproduce_cli_order() {
        let mut req = request();
        req.model = Some("opus".to_string());
        req.tools_settings.allowed_tools = vec!["Bash".to_string(), "Read".to_string()];
        req.tools_settings.disallowed_tools = vec!["WebFetch".to_string()];
        req.session_id = Some("sid-1".to_string());

        let args = ProviderProfile::claude().build_args(&req, "hello");
        assert_eq!(
            args,
            vec![
                "-p",
                "hello",
                "--output-format=stream-json",
                "--include-partial-messages",
                "--verbose",
                "--permission-mode",
                "default",
                "--model",
                "opus",
                "--allowedTools",
                "Bash",
                "Read",
                "--disallowedTools",
                "WebFetch",
                "--resume",
                "sid-1",
            ]
        );
    }

    #[test]
    fn claude_args_omit_optional_flags() {
        let args = ProviderProfile::claude().build_args(&request(), "hello");
        assert_eq!(
            args,
            vec![
                "-p",
                "hello",
                "--output-format=stream-json",
                "--include-partial-messages",
                "--verbose",
                "--permission-mode",
                "default",
            ]
        );
    }

    #[test]
    fn skip_permissions_maps_to_bypass_mode() {
        let mut req = request();
        req.permission_mode = PermissionMode::Plan;
        req.tools_settings.skip_permissions = true;
        let args = ProviderProfile::claude().build_args(&req, "hello");
        let mode_index = args.iter().position(|a| a == "--permission-mode").expect("flag");
        assert_eq!(args[mode_index + 1], "bypassPermissions");
    }

    #[test]
    fn gemini_resume_precedes_prompt_and_skips_model() {
        let mut req = request();
        req.session_id = Some("g-1".to_string());
        req.model = Some("gemini-2.5-pro".to_string());
        req.tools_settings.skip_permissions = true;

        let args = ProviderProfile::gemini().build_args(&req, "hello");
        assert_eq!(
            args,
            vec![
                "--resume",
                "g-1",
                "-p",
                "hello",
                "--output-format",
                "stream-json",
                "-f",
            ]
        );
    }

    #[test]
    fn gemini_new_session_includes_model() {
        let mut req = request();
        req.model = Some("gemini-2.5-pro".to_string());
        let args = ProviderProfile::gemini().build_args(&req, "hello");
        assert_eq!(
            args,
            vec![
                "-p",
                "hello",
                "--model",
                "gemini-2.5-pro",
                "--output-format",
                "stream-json",
            ]
        );
    }

    #[test]
    fn official_profile_bypasses_env_resolution() {
        let resolved = ProviderProfile::claude_official()
            .resolve_command()
            .expect("resolve");
        assert_eq!(resolved.executable, "claude");
        assert!(resolved.args_prefix.is_empty());
    }
}
