//! Resolution of the external CLI executable from layered configuration.
//!
//! Precedence: a combined command string (`<PROVIDER>_CLI_COMMAND`), then a
//! separate path (`<PROVIDER>_CLI_PATH`) plus optional args
//! (`<PROVIDER>_CLI_ARGS`), then the provider's default binary name.
//! Values are read from the environment at call time and never cached.

use std::env;

use agent_console_error::ConsoleError;

/// Executable plus the fixed argument prefix that precedes per-invocation
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub executable: String,
    pub args_prefix: Vec<String>,
}

/// Environment variable names for one provider's command configuration.
#[derive(Debug, Clone, Copy)]
pub struct CommandEnv {
    pub command_var: &'static str,
    pub path_var: &'static str,
    pub args_var: &'static str,
    pub default_bin: &'static str,
}

pub fn resolve_command(layer: &CommandEnv) -> Result<ResolvedCommand, ConsoleError> {
    let combined = parse_cli_tokens(env::var(layer.command_var).ok().as_deref())?;
    if let Some((executable, args_prefix)) = combined.split_first() {
        return Ok(ResolvedCommand {
            executable: executable.clone(),
            args_prefix: args_prefix.to_vec(),
        });
    }

    let executable = match env::var(layer.path_var).ok().as_deref().map(normalize_value) {
        Some(value) if !value.is_empty() => substitute_env(&value),
        _ => layer.default_bin.to_string(),
    };
    let args_prefix = parse_cli_tokens(env::var(layer.args_var).ok().as_deref())?;
    Ok(ResolvedCommand {
        executable,
        args_prefix,
    })
}

/// Tokenize a configured command string with shell-word semantics.
///
/// Inputs containing shell control operators are rejected rather than
/// tokenized; the command is always executed directly, never through a shell.
pub fn parse_cli_tokens(value: Option<&str>) -> Result<Vec<String>, ConsoleError> {
    let normalized = match value {
        Some(value) => normalize_value(value),
        None => return Ok(Vec::new()),
    };
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    reject_shell_operators(&normalized)?;

    let tokens = shlex::split(&normalized).ok_or_else(|| ConsoleError::Config {
        message: "CLI command has unbalanced quoting".to_string(),
    })?;
    Ok(tokens.iter().map(|token| substitute_env(token)).collect())
}

/// Trim and strip one wrapping pair of matching quotes.
fn normalize_value(value: &str) -> String {
    let trimmed = value.trim();
    let wrapped_double = trimmed.starts_with('"') && trimmed.ends_with('"');
    let wrapped_single = trimmed.starts_with('\'') && trimmed.ends_with('\'');
    if (wrapped_double || wrapped_single) && trimmed.len() >= 2 {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

/// Reject unquoted shell control operators (`|`, `&`, `;`, redirection,
/// subshells, command substitution).
fn reject_shell_operators(value: &str) -> Result<(), ConsoleError> {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for ch in value.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '|' | '&' | ';' | '<' | '>' | '(' | ')' | '`' | '\n' if !in_single && !in_double => {
                return Err(ConsoleError::Config {
                    message: "CLI command cannot include shell operators".to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Expand `${VAR}` references against the process environment. Undefined
/// variables expand to the empty string.
fn substitute_env(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                out.push_str(&env::var(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Shell-quoted rendering of a command line for log output.
pub fn format_command_for_display(executable: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(shell_quote(executable));
    for arg in args {
        parts.push(shell_quote(arg));
    }
    parts.join(" ")
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const TEST_ENV: CommandEnv = CommandEnv {
        command_var: "TEST_CLI_COMMAND",
        path_var: "TEST_CLI_PATH",
        args_var: "TEST_CLI_ARGS",
        default_bin: "defaultbin",
    };

    fn clear_test_env() {
        for var in ["TEST_CLI_COMMAND", "TEST_CLI_PATH", "TEST_CLI_ARGS"] {
            env::remove_var(var);
        }
    }

    #[test]
    fn tokenizes_quoted_words() {
        let tokens = parse_cli_tokens(Some("ccr code '--log level'"))
            .expect("tokenize");
        assert_eq!(tokens, vec!["ccr", "code", "--log level"]);
    }

    #[test]
    fn strips_one_wrapping_quote_pair() {
        let tokens = parse_cli_tokens(Some("\"ccr code\"")).expect("tokenize");
        assert_eq!(tokens, vec!["ccr", "code"]);
    }

    #[test]
    fn rejects_shell_operators() {
        for input in ["claude | tee log", "claude && rm -rf /", "a; b", "a > out", "$(x)"] {
            let err = parse_cli_tokens(Some(input)).expect_err("must reject");
            assert!(matches!(err, ConsoleError::Config { .. }), "{input}");
        }
    }

    #[test]
    fn quoted_operators_are_allowed_as_data() {
        let tokens = parse_cli_tokens(Some("claude '--marker=a|b'")).expect("tokenize");
        assert_eq!(tokens, vec!["claude", "--marker=a|b"]);
    }

    #[test]
    #[serial]
    fn substitutes_env_vars_in_tokens() {
        env::set_var("TEST_SUBST_HOME", "/opt/tools");
        let tokens = parse_cli_tokens(Some("${TEST_SUBST_HOME}/ccr code")).expect("tokenize");
        assert_eq!(tokens, vec!["/opt/tools/ccr", "code"]);
        env::remove_var("TEST_SUBST_HOME");
        assert_eq!(substitute_env("${TEST_SUBST_HOME}/x"), "/x");
    }

    #[test]
    #[serial]
    fn combined_command_takes_precedence() {
        clear_test_env();
        env::set_var("TEST_CLI_COMMAND", "ccr code");
        env::set_var("TEST_CLI_PATH", "/usr/bin/other");
        let resolved = resolve_command(&TEST_ENV).expect("resolve");
        assert_eq!(resolved.executable, "ccr");
        assert_eq!(resolved.args_prefix, vec!["code"]);
        clear_test_env();
    }

    #[test]
    #[serial]
    fn path_and_args_layer_applies_without_combined() {
        clear_test_env();
        env::set_var("TEST_CLI_PATH", "'/opt/claude wrapper'");
        env::set_var("TEST_CLI_ARGS", "--flag one");
        let resolved = resolve_command(&TEST_ENV).expect("resolve");
        assert_eq!(resolved.executable, "/opt/claude wrapper");
        assert_eq!(resolved.args_prefix, vec!["--flag", "one"]);
        clear_test_env();
    }

    #[test]
    #[serial]
    fn falls_back_to_default_binary() {
        clear_test_env();
        let resolved = resolve_command(&TEST_ENV).expect("resolve");
        assert_eq!(resolved.executable, "defaultbin");
        assert!(resolved.args_prefix.is_empty());
    }

    #[test]
    fn display_formatting_quotes_arguments() {
        let display =
            format_command_for_display("claude", &["-p".to_string(), "it's fine".to_string()]);
        assert_eq!(display, "'claude' '-p' 'it'\\''s fine'");
    }
}
