use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agent_console_error::ConsoleError;
use agent_console_events::ProviderKind;

use crate::command::format_command_for_display;
use crate::launcher::ProviderProfile;
use crate::registry::ProcessRegistry;
use crate::request::{ImageAttachment, InvocationRequest, PermissionMode};
use crate::runner::run_invocation;
use crate::transport::{ChannelSink, EventSink};

#[derive(Parser, Debug)]
#[command(name = "agent-console", bin_name = "agent-console")]
#[command(about = "Bridge between browser clients and local coding-assistant CLIs")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct AgentConsoleCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one CLI invocation and print canonical events as JSON lines.
    Run(RunArgs),
    /// Print the resolved CLI command for a provider and exit.
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Provider to drive: claude or gemini.
    #[arg(long, default_value = "claude")]
    provider: String,

    /// Always spawn the official binary, ignoring wrapper configuration.
    #[arg(long)]
    official: bool,

    #[arg(long, short = 'p')]
    prompt: String,

    /// Working directory the CLI runs in.
    #[arg(long, default_value = ".")]
    cwd: String,

    /// Session id to resume.
    #[arg(long)]
    session: Option<String>,

    #[arg(long)]
    model: Option<String>,

    /// default, acceptEdits, bypassPermissions or plan.
    #[arg(long = "permission-mode", default_value = "default")]
    permission_mode: String,

    #[arg(long = "allowed-tool")]
    allowed_tools: Vec<String>,

    #[arg(long = "disallowed-tool")]
    disallowed_tools: Vec<String>,

    #[arg(long = "skip-permissions")]
    skip_permissions: bool,

    /// Inline image attachment as a data: URL. Repeatable.
    #[arg(long = "image")]
    images: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(long, default_value = "claude")]
    provider: String,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Console(#[from] ConsoleError),
}

pub fn run_agent_console() -> Result<(), CliError> {
    let cli = AgentConsoleCli::parse();
    init_logging();
    run_command(cli.command)
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_logfmt::builder()
                .layer()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run_command(command: Command) -> Result<(), CliError> {
    match command {
        Command::Run(args) => run_invocation_command(args),
        Command::Resolve(args) => resolve_command(&args),
    }
}

fn parse_provider(value: &str) -> Result<ProviderKind, CliError> {
    ProviderKind::parse(value).ok_or_else(|| CliError::InvalidArgument {
        message: format!("unknown provider `{value}` (expected claude or gemini)"),
    })
}

fn build_profile(provider: ProviderKind, official: bool) -> Result<ProviderProfile, CliError> {
    match (provider, official) {
        (ProviderKind::Claude, true) => Ok(ProviderProfile::claude_official()),
        (ProviderKind::Claude, false) => Ok(ProviderProfile::claude()),
        (ProviderKind::Gemini, true) => Err(CliError::InvalidArgument {
            message: "--official only applies to the claude provider".to_string(),
        }),
        (ProviderKind::Gemini, false) => Ok(ProviderProfile::gemini()),
    }
}

fn run_invocation_command(args: RunArgs) -> Result<(), CliError> {
    let provider = parse_provider(&args.provider)?;
    let profile = build_profile(provider, args.official)?;
    let permission_mode =
        PermissionMode::parse(&args.permission_mode).ok_or_else(|| CliError::InvalidArgument {
            message: format!("unknown permission mode `{}`", args.permission_mode),
        })?;

    let mut request = InvocationRequest::new(args.prompt, args.cwd);
    request.session_id = args.session;
    request.model = args.model;
    request.permission_mode = permission_mode;
    request.tools_settings.allowed_tools = args.allowed_tools;
    request.tools_settings.disallowed_tools = args.disallowed_tools;
    request.tools_settings.skip_permissions = args.skip_permissions;
    request.images = args
        .images
        .into_iter()
        .map(|data| ImageAttachment { data })
        .collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let registry = Arc::new(ProcessRegistry::new());
        let (sink, mut receiver) = ChannelSink::new();
        let sink: Arc<dyn EventSink> = Arc::new(sink);

        let printer = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                println!("{event}");
            }
        });

        let result = run_invocation(&profile, &request, registry, sink).await;
        // The sink is dropped inside the runner; the printer drains the
        // channel tail and exits.
        let _ = printer.await;
        result.map_err(CliError::from)
    })
}

fn resolve_command(args: &ResolveArgs) -> Result<(), CliError> {
    let provider = parse_provider(&args.provider)?;
    let profile = match provider {
        ProviderKind::Claude => ProviderProfile::claude(),
        ProviderKind::Gemini => ProviderProfile::gemini(),
    };
    let resolved = profile.resolve_command()?;
    println!(
        "{}",
        format_command_for_display(&resolved.executable, &resolved.args_prefix)
    );
    Ok(())
}
