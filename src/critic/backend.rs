//! Reasoning service backends.
//!
//! A backend turns a [`CompletionRequest`] into raw reply text. Two
//! implementations ship:
//!
//! - [`ClaudeCliBackend`]: spawns `claude --print` and pipes the prompt on stdin
//! - [`ChatApiBackend`]: posts to an OpenAI-compatible chat completions endpoint
//!
//! Both bound every call with the configured timeout and report failures as
//! [`ReasoningError`]. They never interpret the reply; that is the caller's job.

use crate::config::{BackendKind, ReasoningConfig};
use crate::errors::ReasoningError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// One prompt for the reasoning service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Fixed instruction describing the task and output format.
    pub system: String,
    /// Per-call content.
    pub user: String,
    pub temperature: f32,
    /// Ask the service for a JSON object reply where supported.
    pub json_reply: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            json_reply: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_reply(mut self, json_reply: bool) -> Self {
        self.json_reply = json_reply;
        self
    }

    /// Single-document rendering for backends without a system role.
    pub fn combined_prompt(&self) -> String {
        format!("{}\n\n{}", self.system.trim_end(), self.user.trim_start())
    }
}

/// Abstraction over the reasoning service for testability.
/// Real implementations: [`ClaudeCliBackend`], [`ChatApiBackend`].
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ReasoningError>;

    /// Short identifier used in logs and run records.
    fn name(&self) -> &str;
}

/// Build the backend selected in configuration.
pub fn build_backend(config: &ReasoningConfig) -> Result<Arc<dyn ReasoningBackend>, ReasoningError> {
    match config.backend {
        BackendKind::ClaudeCli => Ok(Arc::new(
            ClaudeCliBackend::new(&config.command, config.timeout())
                .with_skip_permissions(config.skip_permissions),
        )),
        BackendKind::ChatApi => Ok(Arc::new(ChatApiBackend::from_config(config)?)),
    }
}

/// Runs the Claude CLI in print mode, one process per request.
///
/// The CLI exposes no sampling controls, so `temperature` is not forwarded.
/// Permission prompts stay enabled unless [`Self::with_skip_permissions`]
/// turns them off.
pub struct ClaudeCliBackend {
    command: String,
    timeout: Duration,
    skip_permissions: bool,
}

impl ClaudeCliBackend {
    pub fn new(command: &str, timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            timeout,
            skip_permissions: false,
        }
    }

    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    fn args(&self) -> Vec<&'static str> {
        let mut args = vec!["--print"];
        if self.skip_permissions {
            args.push("--dangerously-skip-permissions");
        }
        args
    }

    async fn run(&self, prompt: &str) -> Result<String, ReasoningError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(self.args());

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ReasoningError::SpawnFailed {
            command: self.command.clone(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(ReasoningError::Io)?;
            stdin.shutdown().await.map_err(ReasoningError::Io)?;
        }

        let mut output = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout
                .read_to_string(&mut output)
                .await
                .map_err(ReasoningError::Io)?;
        }

        let status = child.wait().await.map_err(ReasoningError::Io)?;
        if !status.success() {
            return Err(ReasoningError::NonZeroExit {
                exit_code: status.code().unwrap_or(-1),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl ReasoningBackend for ClaudeCliBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ReasoningError> {
        let prompt = request.combined_prompt();
        tracing::debug!(
            command = %self.command,
            prompt_chars = prompt.len(),
            "invoking reasoning process"
        );
        tokio::time::timeout(self.timeout, self.run(&prompt))
            .await
            .map_err(|_| ReasoningError::Timeout(self.timeout))?
    }

    fn name(&self) -> &str {
        "claude-cli"
    }
}

/// OpenAI-compatible chat completions client.
pub struct ChatApiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatApiBackend {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ReasoningError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ReasoningError::Http)?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
            timeout,
        })
    }

    /// Build from configuration, reading the API key from `api_key_env`.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ReasoningError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(&config.endpoint, &config.model, Some(api_key), config.timeout())
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });
        if request.json_reply {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    fn map_send_error(&self, err: reqwest::Error) -> ReasoningError {
        if err.is_timeout() {
            ReasoningError::Timeout(self.timeout)
        } else {
            ReasoningError::Http(err)
        }
    }
}

#[async_trait]
impl ReasoningBackend for ChatApiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ReasoningError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&self.request_body(request));
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let resp = builder.send().await.map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| self.map_send_error(e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReasoningError::MalformedReply("response contained no choices".into()))
    }

    fn name(&self) -> &str {
        "chat-api"
    }
}
