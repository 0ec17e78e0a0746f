//! LLM providers behind the crews.
//!
//! Hosted models go through rig; [`MockProvider`] and [`ScriptedProvider`]
//! keep runs offline and deterministic.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use rig::completion::Prompt;
use rig::providers::{anthropic, openai};

/// Which model a crew talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// `mock`, `openai` or `anthropic` (alias `claude`)
    pub provider: String,
    pub model: String,
    /// Falls back to the provider's own env var when unset
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
        }
    }
}

impl LLMConfig {
    pub fn new(provider: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send one prompt and return the model's full reply.
    async fn prompt(&self, prompt: &str) -> Result<String>;
}

enum Backend {
    Anthropic(anthropic::Client),
    OpenAI(openai::Client),
}

impl Backend {
    fn label(&self) -> &'static str {
        match self {
            Backend::Anthropic(_) => "anthropic",
            Backend::OpenAI(_) => "openai",
        }
    }
}

/// A hosted model reached through rig.
pub struct RigProvider {
    backend: Backend,
    model: String,
}

impl RigProvider {
    /// Anthropic client; reads `ANTHROPIC_API_KEY` when no key is given.
    pub fn anthropic(api_key: Option<&str>, model: &str) -> Self {
        let client = match api_key {
            Some(key) => anthropic::Client::new(
                key,
                "https://api.anthropic.com",
                None,
                anthropic::ANTHROPIC_VERSION_LATEST,
            ),
            None => anthropic::Client::from_env(),
        };
        Self {
            backend: Backend::Anthropic(client),
            model: anthropic_model(model).to_string(),
        }
    }

    /// OpenAI client; reads `OPENAI_API_KEY` when no key is given.
    pub fn openai(api_key: Option<&str>, model: &str) -> Self {
        let client = match api_key {
            Some(key) => openai::Client::new(key),
            None => openai::Client::from_env(),
        };
        Self {
            backend: Backend::OpenAI(client),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Expand undated Anthropic aliases to the ids rig knows.
fn anthropic_model(model: &str) -> &str {
    match model {
        "claude-3-haiku" => anthropic::CLAUDE_3_HAIKU,
        "claude-3-opus" => anthropic::CLAUDE_3_OPUS,
        "claude-3-sonnet" => anthropic::CLAUDE_3_SONNET,
        "claude-3-5-sonnet" => anthropic::CLAUDE_3_5_SONNET,
        "claude-3-7-sonnet" => anthropic::CLAUDE_3_7_SONNET,
        other => other,
    }
}

#[async_trait::async_trait]
impl LLMProvider for RigProvider {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        debug!(provider = self.backend.label(), model = %self.model, "Sending prompt");
        let reply = match &self.backend {
            Backend::Anthropic(client) => {
                let agent = client.agent(&self.model).build();
                agent.prompt(prompt).await
            }
            Backend::OpenAI(client) => {
                let agent = client.agent(&self.model).build();
                agent.prompt(prompt).await
            }
        };
        reply.map_err(|e| anyhow!("{} completion failed: {:?}", self.backend.label(), e))
    }
}

/// Offline provider for demos; approves every article it is asked to review.
pub struct MockProvider;

#[async_trait::async_trait]
impl LLMProvider for MockProvider {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        if prompt.contains(super::crew::JSON_INSTRUCTION) {
            Ok(r#"{"valid": true, "feedback": null}"#.to_string())
        } else {
            Ok(format!(
                "Mock response to: {}...",
                prompt.chars().take(80).collect::<String>()
            ))
        }
    }
}

/// Replays a fixed queue of replies and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<I, T>(replies: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LLMProvider for ScriptedProvider {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow!("scripted provider lock poisoned"))?
            .push(prompt.to_string());
        self.replies
            .lock()
            .map_err(|_| anyhow!("scripted provider lock poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("scripted provider has no replies left"))
    }
}

/// Build the provider named in `config`. Unknown names are an error.
pub fn create_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
    let key = config.api_key.as_deref();
    match config.provider.as_str() {
        "anthropic" | "claude" => Ok(Arc::new(RigProvider::anthropic(key, &config.model))),
        "openai" => Ok(Arc::new(RigProvider::openai(key, &config.model))),
        "mock" => Ok(Arc::new(MockProvider)),
        other => Err(anyhow!("Unsupported LLM provider: {}", other)),
    }
}
