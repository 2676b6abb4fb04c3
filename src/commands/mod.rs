pub mod filter;
pub mod summarize;
pub mod test_api;
pub mod verify;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::tldr::completion::HttpCompletionClient;
use crate::tldr::config::{Settings, load_config};
use crate::tldr::paths::{TldrPaths, resolve_paths};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    /// Machine-readable result printed to stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            payload: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn set_payload<T: Serialize>(&mut self, payload: &T) -> Result<()> {
        self.payload = Some(serde_json::to_value(payload).context("failed to encode payload")?);
        Ok(())
    }
}

/// Resolved paths, validated settings, and an HTTP client built from them.
pub struct Runtime {
    pub paths: TldrPaths,
    pub settings: Settings,
    pub client: HttpCompletionClient,
}

pub fn load_runtime() -> Result<Runtime> {
    let paths = resolve_paths()?;
    let settings = load_config(&paths.config_file)
        .with_context(|| format!("failed to load {}", paths.config_file.display()))?;
    let client = HttpCompletionClient::new(&settings.openai, &settings.http)?;
    Ok(Runtime {
        paths,
        settings,
        client,
    })
}
