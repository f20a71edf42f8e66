//! Interactive subprocess sessions.
//!
//! Where the one-shot chain fires a single prompt and collects stdout,
//! the driver keeps one tool process alive for a richer exchange: the
//! tool may pause mid-stream to ask for permission, and the driver must
//! notice, produce an answer, and feed it back on stdin.
//!
//! The session is a state machine: Spawning -> Streaming, with a detour
//! to AwaitingAnswer whenever the permission heuristic fires, ending in
//! Completed (exit 0), Errored (nonzero exit or a stderr fault), or
//! TimedOut (deadline hit; the partial transcript is returned as a
//! best-effort success rather than an error).

pub mod heuristic;
pub mod resolver;

pub use heuristic::{PermissionHeuristic, RegexPermissionHeuristic};
pub use resolver::{AnswerResolver, AutoResolver, HumanResolver, InteractiveExchange, ResolutionSource};

use sable_core::config::{BudgetConfig, ToolConfig};
use sable_core::error::{Result, SableError};
use sable_core::session::estimate_tokens;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How much of the transcript tail is handed to the permission heuristic
/// after each chunk.
const TAIL_WINDOW: usize = 512;

/// Result of an interactive session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Everything the tool wrote to stdout.
    pub transcript: String,
    /// Token estimate of the transcript.
    pub token_estimate: usize,
    /// True when the deadline fired and the transcript is partial.
    pub timed_out: bool,
    /// Permission requests resolved during the session, for audit.
    pub exchanges: Vec<InteractiveExchange>,
}

impl SessionOutcome {
    fn new(transcript: String, timed_out: bool, exchanges: Vec<InteractiveExchange>) -> Self {
        let token_estimate = estimate_tokens(&transcript);
        Self {
            transcript,
            token_estimate,
            timed_out,
            exchanges,
        }
    }
}

/// Drives one long-lived tool process through a conversation.
pub struct InteractiveSessionDriver {
    tool: ToolConfig,
    budget: BudgetConfig,
    heuristic: Box<dyn PermissionHeuristic>,
    resolver: Box<dyn AnswerResolver>,
}

impl InteractiveSessionDriver {
    /// Creates a driver with the default regex heuristic.
    pub fn new(tool: ToolConfig, budget: BudgetConfig, resolver: Box<dyn AnswerResolver>) -> Self {
        Self {
            tool,
            budget,
            heuristic: Box::new(RegexPermissionHeuristic),
            resolver,
        }
    }

    /// Replaces the permission heuristic.
    pub fn with_heuristic(mut self, heuristic: Box<dyn PermissionHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Runs one interactive session: spawns the tool, writes the prompt,
    /// streams stdout while resolving permission requests, and returns
    /// the transcript.
    ///
    /// Cancellation through `cancel` kills the subprocess; it is never
    /// left orphaned.
    ///
    /// # Errors
    ///
    /// Fails on spawn errors, stderr faults (`Error:`/`Failed:` lines),
    /// nonzero exit, cancellation, or a failure while obtaining an
    /// answer. Callers are expected to fall back to the one-shot chain.
    pub async fn run(
        &self,
        prompt: &str,
        working_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        let mut cmd = Command::new(&self.tool.binary);
        if let Some(model) = &self.tool.model {
            cmd.arg("--model").arg(model);
        }
        cmd.current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            SableError::subprocess(format!("failed to spawn '{}': {}", self.tool.binary, e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SableError::internal("child stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SableError::internal("child stdout not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SableError::internal("child stderr not piped"))?;

        // The child may never read its stdin; a bounded write keeps a
        // full pipe from hanging the session before the deadline exists.
        let write_budget = Duration::from_secs(self.budget.interactive_timeout_secs);
        let initial_write = async {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        match tokio::time::timeout(write_budget, initial_write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                child.kill().await.ok();
                return Err(SableError::interaction(format!(
                    "failed to write prompt: {}",
                    e
                )));
            }
            Err(_) => {
                child.kill().await.ok();
                return Err(SableError::interaction("prompt write timed out"));
            }
        }

        // Reader tasks feed chunks/lines into channels so the main loop
        // can select over output, exit, deadline, and cancellation.
        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        tokio::spawn(async move {
            let mut stdout = stdout;
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).to_string();
                        if out_tx.send(chunk).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let (err_tx, mut err_rx) = mpsc::channel::<String>(32);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if err_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        self.stream(&mut child, &mut stdin, &mut out_rx, &mut err_rx, cancel)
            .await
    }

    /// The Streaming/AwaitingAnswer loop.
    async fn stream(
        &self,
        child: &mut Child,
        stdin: &mut ChildStdin,
        out_rx: &mut mpsc::Receiver<String>,
        err_rx: &mut mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        let mut transcript = String::new();
        let mut exchanges = Vec::new();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut exit_status: Option<std::process::ExitStatus> = None;

        let deadline = tokio::time::sleep(Duration::from_secs(self.budget.interactive_timeout_secs));
        tokio::pin!(deadline);

        loop {
            // The exit status alone does not end the session: queued
            // stdout must land in the transcript first.
            if let Some(status) = exit_status {
                if !stdout_open {
                    if status.success() {
                        return Ok(SessionOutcome::new(transcript, false, exchanges));
                    }
                    return Err(SableError::interaction(format!(
                        "tool exited with {}",
                        status
                    )));
                }
            }

            tokio::select! {
                () = &mut deadline => {
                    log::warn!(
                        "Interactive session deadline hit after {}s; returning partial transcript",
                        self.budget.interactive_timeout_secs
                    );
                    child.kill().await.ok();
                    drain(out_rx, &mut transcript);
                    return Ok(SessionOutcome::new(transcript, true, exchanges));
                }

                () = cancel.cancelled() => {
                    log::info!("Interactive session cancelled; killing subprocess");
                    child.kill().await.ok();
                    return Err(SableError::interaction("session cancelled"));
                }

                chunk = out_rx.recv(), if stdout_open => {
                    match chunk {
                        Some(chunk) => {
                            transcript.push_str(&chunk);
                            // A question only means "blocked on input" while
                            // the process is actually alive.
                            if exit_status.is_none()
                                && let Some(question) = self.heuristic.detect(tail(&transcript))
                            {
                                let exchange = match self.resolver.resolve(&question).await {
                                    Ok(exchange) => exchange,
                                    Err(e) => {
                                        child.kill().await.ok();
                                        return Err(e);
                                    }
                                };
                                log::info!(
                                    "Permission request ({:?}): {:?} -> {:?}",
                                    exchange.source,
                                    exchange.question,
                                    exchange.answer
                                );
                                let answered = stdin
                                    .write_all(format!("{}\n", exchange.answer).as_bytes())
                                    .await
                                    .and(stdin.flush().await);
                                if let Err(e) = answered {
                                    child.kill().await.ok();
                                    return Err(SableError::interaction(format!(
                                        "failed to write answer: {}",
                                        e
                                    )));
                                }
                                exchanges.push(exchange);
                            }
                        }
                        None => stdout_open = false,
                    }
                }

                line = err_rx.recv(), if stderr_open => {
                    match line {
                        Some(line) if line.contains("Error:") || line.contains("Failed:") => {
                            log::error!("Tool stderr fault: {}", line);
                            child.kill().await.ok();
                            return Err(SableError::interaction(format!("tool error: {}", line)));
                        }
                        Some(line) => log::debug!("tool stderr: {}", line),
                        None => stderr_open = false,
                    }
                }

                status = child.wait(), if exit_status.is_none() => {
                    let status = status
                        .map_err(|e| SableError::subprocess(format!("wait failed: {}", e)))?;
                    exit_status = Some(status);
                }
            }
        }
    }
}

/// Pulls any chunks still queued by the reader task into the transcript.
fn drain(out_rx: &mut mpsc::Receiver<String>, transcript: &mut String) {
    while let Ok(chunk) = out_rx.try_recv() {
        transcript.push_str(&chunk);
    }
}

/// The transcript tail handed to the permission heuristic.
fn tail(transcript: &str) -> &str {
    if transcript.len() <= TAIL_WINDOW {
        return transcript;
    }
    let mut start = transcript.len() - TAIL_WINDOW;
    while !transcript.is_char_boundary(start) {
        start += 1;
    }
    &transcript[start..]
}
