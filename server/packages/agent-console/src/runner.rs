//! Drives one CLI invocation from spawn to final event.
//!
//! The runner owns the full lifecycle: image materialization, command
//! resolution, spawn, stdout demultiplexing into canonical events, session-id
//! discovery, exit observation, and cleanup. Exactly one terminal event is
//! emitted per invocation: a `-complete` on clean exit, a `-error` otherwise.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use agent_console_error::ConsoleError;
use agent_console_events::normalizer::DEFAULT_CONTEXT_WINDOW;
use agent_console_events::{CanonicalEvent, EventNormalizer, NormalizedRecord, ProviderKind};

use crate::images;
use crate::launcher::{spawn_cli, ProviderProfile};
use crate::registry::{ProcessRegistry, SharedChild};
use crate::request::InvocationRequest;
use crate::session::SessionTracker;
use crate::stream::LineAssembler;
use crate::transport::EventSink;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run one invocation to completion.
///
/// Fatal errors are both returned and reported to the sink as a single
/// canonical error event carrying the best-known session id. Image temp
/// files are removed on every exit path.
pub async fn run_invocation(
    profile: &ProviderProfile,
    request: &InvocationRequest,
    registry: Arc<ProcessRegistry>,
    sink: Arc<dyn EventSink>,
) -> Result<(), ConsoleError> {
    let provider = profile.kind();
    let materialized =
        images::materialize(&request.prompt, &request.images, &request.working_directory);
    let mut tracker = SessionTracker::new(request.session_id.clone());

    let outcome = drive(
        profile,
        request,
        &materialized.prompt,
        registry.as_ref(),
        sink.as_ref(),
        &mut tracker,
    )
    .await;

    images::cleanup(&materialized.temp_paths, materialized.temp_dir.as_deref());

    if let Err(err) = &outcome {
        tracing::error!(
            provider = %provider,
            kind = err.kind().as_str(),
            error = %err,
            "invocation failed"
        );
        let event = CanonicalEvent::Error {
            message: err.event_message(),
        };
        sink.send(event.to_wire(provider, tracker.session_id()));
    }
    outcome
}

async fn drive(
    profile: &ProviderProfile,
    request: &InvocationRequest,
    prompt: &str,
    registry: &ProcessRegistry,
    sink: &dyn EventSink,
    tracker: &mut SessionTracker,
) -> Result<(), ConsoleError> {
    let provider = profile.kind();
    if prompt.trim().is_empty() {
        return Err(ConsoleError::EmptyPrompt {
            provider: provider.display_name().to_string(),
        });
    }

    let resolved = profile.resolve_command()?;
    let args = profile.build_args(request, prompt);
    let context_window = context_window_from_env();

    let mut child = spawn_cli(
        &resolved,
        &args,
        &request.working_directory,
        profile.stdin_mode(),
    )?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Until the provider reports its session id, the process is registered
    // under the caller's id (resume) or a submission-time key (new session).
    let provisional_key = match tracker.session_id() {
        Some(id) => id.to_string(),
        None => submission_key(),
    };
    let shared: SharedChild = Arc::new(Mutex::new(child));
    registry.insert(&provisional_key, Arc::clone(&shared)).await;

    // Stderr is accumulated off to the side; it only surfaces in the error
    // event when the process exits non-zero.
    let stderr_task = tokio::spawn(async move {
        let mut text = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut text).await;
        }
        text
    });

    let mut normalizer = EventNormalizer::new(provider, context_window);
    {
        let mut pump = EventPump {
            provider,
            registry,
            sink,
            tracker,
            normalizer: &mut normalizer,
            provisional_key: &provisional_key,
        };

        if let Some(mut stdout) = stdout {
            let mut assembler = LineAssembler::new();
            let mut buf = [0u8; 8192];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        for line in assembler.push(&buf[..n]) {
                            pump.handle_line(&line).await;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "stdout read failed");
                        break;
                    }
                }
            }
            if let Some(line) = assembler.finish() {
                pump.handle_line(&line).await;
            }
        }
    }

    let stderr_text = stderr_task.await.unwrap_or_default();
    let status = wait_for_exit(&shared).await;

    registry.remove(&provisional_key).await;
    if let Some(session_id) = tracker.session_id().map(str::to_string) {
        registry.remove(&session_id).await;
    }

    match status.and_then(|status| status.code()) {
        Some(0) => {
            tracing::info!(provider = %provider, "CLI process exited cleanly");
            let event = CanonicalEvent::Complete {
                exit_code: 0,
                is_new_session: !tracker.is_resume(),
            };
            sink.send(event.to_wire(provider, tracker.session_id()));
            Ok(())
        }
        // None covers death by signal; -1 mirrors that on the wire.
        code => Err(ConsoleError::NonZeroExit {
            provider: provider.display_name().to_string(),
            code: code.unwrap_or(-1),
            stderr: stderr_text,
        }),
    }
}

/// Per-invocation stdout-to-sink pipeline state.
struct EventPump<'a> {
    provider: ProviderKind,
    registry: &'a ProcessRegistry,
    sink: &'a dyn EventSink,
    tracker: &'a mut SessionTracker,
    normalizer: &'a mut EventNormalizer,
    provisional_key: &'a str,
}

impl EventPump<'_> {
    async fn handle_line(&mut self, line: &str) {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, line, "dropping non-JSON stdout line");
                return;
            }
        };
        for record in self.normalizer.normalize(raw) {
            match record {
                NormalizedRecord::Record(data) => {
                    self.observe(&data).await;
                    self.emit(CanonicalEvent::Response {
                        data,
                        success: None,
                    });
                }
                NormalizedRecord::Result { data, success } => {
                    self.observe(&data).await;
                    self.emit(CanonicalEvent::Response {
                        data,
                        success: Some(success),
                    });
                }
                NormalizedRecord::TokenBudget { used, total } => {
                    self.emit(CanonicalEvent::TokenBudget { used, total });
                }
            }
        }
    }

    async fn observe(&mut self, record: &Value) {
        let Some(discovery) = self.tracker.observe(record) else {
            return;
        };
        tracing::info!(session_id = %discovery.session_id, "provider session id discovered");
        self.registry
            .rekey(self.provisional_key, &discovery.session_id)
            .await;
        self.sink.set_session_id(&discovery.session_id);
        if discovery.announce {
            self.emit(CanonicalEvent::SessionCreated {
                session_id: discovery.session_id,
                model: discovery.model,
                cwd: discovery.cwd,
            });
        }
    }

    fn emit(&self, event: CanonicalEvent) {
        self.sink
            .send(event.to_wire(self.provider, self.tracker.session_id()));
    }
}

/// Poll for exit without holding the child lock across an await on the
/// process itself, so a concurrent abort can still reach the handle.
async fn wait_for_exit(child: &SharedChild) -> Option<ExitStatus> {
    loop {
        {
            let mut guard = child.lock().await;
            match guard.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "failed to poll CLI exit status");
                    return None;
                }
            }
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

// Distinguishes submissions that land in the same millisecond.
static SUBMISSION_SEQ: AtomicU64 = AtomicU64::new(0);

fn submission_key() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = SUBMISSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{seq}")
}

fn context_window_from_env() -> u64 {
    std::env::var("CONTEXT_WINDOW")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|&window| window > 0)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}
