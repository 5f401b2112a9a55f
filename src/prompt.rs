//! Prompt id discovery.
//!
//! A prompt id ties a delivered result back to the workflow run that made it.
//! There are two ways to get one:
//!
//! - **From host context**: the host injects `extra_pnginfo` and `prompt`
//!   documents into node calls; [`resolve_prompt_id`] reads
//!   `extra_pnginfo.workflow.id`, then `prompt.workflow.id`.
//! - **From the host's queue**: [`PromptIdFetcher`] asks the running host
//!   (`GET /queue`) which prompt is executing right now, sending HTTP Basic
//!   credentials taken from environment variables when both are set.

use crate::config::HostConfig;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Context the host passes alongside node inputs. Every field is optional
/// and unknown fields are ignored, so differing host versions all parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostContext {
    pub prompt: Option<Value>,
    pub extra_pnginfo: Option<Value>,
    pub unique_id: Option<String>,
}

fn workflow_id(doc: Option<&Value>) -> Option<String> {
    doc?.get("workflow")?
        .get("id")?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Look up the prompt id in host context. `verbose` logs the raw context.
pub fn resolve_prompt_id(context: &HostContext, verbose: bool) -> Option<String> {
    if verbose {
        tracing::info!(prompt = ?context.prompt, "host context: prompt");
        tracing::info!(extra_pnginfo = ?context.extra_pnginfo, "host context: extra_pnginfo");
        tracing::info!(unique_id = ?context.unique_id, "host context: unique_id");
    }
    workflow_id(context.extra_pnginfo.as_ref()).or_else(|| workflow_id(context.prompt.as_ref()))
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("queue request returned status {0}")]
    Status(u16),
    #[error("invalid queue response: {0}")]
    Json(#[from] serde_json::Error),
}

/// `Basic base64(user:password)`.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

/// Extract the running prompt id from a `/queue` response body.
///
/// The host reports `queue_running` as a list of entries whose second
/// element is the prompt id. An idle queue yields an empty string.
pub fn running_prompt_id(queue: &Value) -> String {
    queue
        .get("queue_running")
        .and_then(Value::as_array)
        .and_then(|running| running.first())
        .and_then(Value::as_array)
        .and_then(|entry| entry.get(1))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Polls the host's queue for the prompt that is currently executing.
pub struct PromptIdFetcher {
    client: Client,
    queue_url: String,
    credentials: Option<(String, String)>,
}

impl PromptIdFetcher {
    /// Build from host config, reading credentials from the configured
    /// environment variables. Both must be non-empty to be used.
    pub fn from_config(host: &HostConfig) -> Result<Self, FetchError> {
        let username = std::env::var(&host.username_env).unwrap_or_default();
        let password = std::env::var(&host.password_env).unwrap_or_default();
        let credentials =
            (!username.is_empty() && !password.is_empty()).then_some((username, password));
        Ok(Self::new(Client::builder().build()?, host.queue_url(), credentials))
    }

    pub fn new(
        client: Client,
        queue_url: impl Into<String>,
        credentials: Option<(String, String)>,
    ) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            credentials,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Ask the host which prompt is running. Idle → `Ok("")`.
    pub fn fetch(&self) -> Result<String, FetchError> {
        let mut request = self.client.get(&self.queue_url);
        if let Some((user, password)) = &self.credentials {
            request = request.header(AUTHORIZATION, basic_auth_header(user, password));
        }
        let response = request.send()?;
        let status = response.status().as_u16();
        if status != 200 {
            tracing::error!(status, url = %self.queue_url, "queue request failed");
            return Err(FetchError::Status(status));
        }
        let body = response.text()?;
        let queue: Value = serde_json::from_str(&body)?;
        Ok(running_prompt_id(&queue))
    }
}
