//! Local LLM runtime driven over a subprocess's stdin/stdout
//!
//! Spawns `{command} {args..} {model}` on first use and keeps it alive.
//! Each prompt is written as a single line; the reply is the next line on
//! stdout. A child that answers with nothing is considered dead: its stderr
//! is collected into the error and the next call starts a fresh process.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::backend::{FinishReason, GenerationResult, LlmBackend};
use crate::prompt::{flatten_messages, Message};
use crate::LlmError;

const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Subprocess configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    /// Arguments placed before the model name
    pub args: Vec<String>,
    pub model: String,
    /// Maximum wait for one reply line
    pub timeout: Duration,
}

struct ChildSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: ChildStderr,
}

impl ChildSession {
    async fn drain_stderr(&mut self) -> String {
        let mut buf = String::new();
        let _ = tokio::time::timeout(STDERR_GRACE, self.stderr.read_to_string(&mut buf)).await;
        buf.trim().to_string()
    }

    async fn shutdown(mut self) {
        let _ = self.stdin.shutdown().await;
        drop(self.stdin);
        let _ = self.child.kill().await;
    }
}

pub struct ProcessBackend {
    config: ProcessConfig,
    session: Mutex<Option<ChildSession>>,
}

impl ProcessBackend {
    pub fn new(config: ProcessConfig) -> Result<Self, LlmError> {
        if config.command.trim().is_empty() {
            return Err(LlmError::Configuration(
                "Process backend requires a command".to_string(),
            ));
        }
        Ok(Self {
            config,
            session: Mutex::new(None),
        })
    }

    fn spawn(&self) -> Result<ChildSession, LlmError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .arg(&self.config.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            LlmError::Process(format!("Failed to start '{}': {}", self.config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LlmError::Process("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LlmError::Process("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LlmError::Process("Failed to capture stderr".to_string()))?;

        tracing::info!(
            command = %self.config.command,
            model = %self.config.model,
            pid = child.id(),
            "Started local LLM process"
        );

        Ok(ChildSession {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
        })
    }

    /// Send one line and read one line back
    async fn exchange(session: &mut ChildSession, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        let line = format!("{}\n", prompt);
        if let Err(e) = session.stdin.write_all(line.as_bytes()).await {
            let stderr = session.drain_stderr().await;
            return Err(LlmError::Process(format!("Failed to write prompt: {}. {}", e, stderr)));
        }
        if let Err(e) = session.stdin.flush().await {
            let stderr = session.drain_stderr().await;
            return Err(LlmError::Process(format!("Failed to flush prompt: {}. {}", e, stderr)));
        }

        let mut reply = String::new();
        match tokio::time::timeout(timeout, session.stdout.read_line(&mut reply)).await {
            Err(_) => Err(LlmError::Timeout),
            Ok(Err(e)) => Err(LlmError::Process(format!("Failed to read reply: {}", e))),
            Ok(Ok(_)) if reply.trim().is_empty() => {
                let stderr = session.drain_stderr().await;
                Err(LlmError::Process(format!("Error in response: {}", stderr)))
            }
            Ok(Ok(_)) => Ok(reply.trim().to_string()),
        }
    }

    /// Terminate the child process if one is running
    pub async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.shutdown().await;
            tracing::info!(model = %self.config.model, "Closed local LLM process");
        }
    }
}

#[async_trait]
impl LlmBackend for ProcessBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        // One line in, one line out
        let prompt = flatten_messages(messages).replace(['\r', '\n'], " ");

        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(LlmError::Process("Process session unavailable".to_string()));
        };

        match Self::exchange(session, &prompt, self.config.timeout).await {
            Ok(text) => Ok(GenerationResult {
                text,
                tokens: 0,
                total_time_ms: start.elapsed().as_millis() as u64,
                finish_reason: FinishReason::Stop,
            }),
            Err(e) => {
                // The stream is out of sync or the child is gone; start over next time
                if let Some(session) = guard.take() {
                    session.shutdown().await;
                }
                Err(e)
            }
        }
    }

    async fn is_available(&self) -> bool {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return true;
        }
        match self.spawn() {
            Ok(session) => {
                *guard = Some(session);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Local LLM process unavailable");
                false
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
