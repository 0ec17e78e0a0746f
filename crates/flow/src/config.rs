use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::{agent::LLMConfig, workflow::builder::DEFAULT_MAX_DISPATCHES};

pub const DEFAULT_TOPIC: &str = "Agentic AI Design Patterns";
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub flow: FlowConfig,
    pub llm: LlmSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub topic: String,
    pub max_retries: u32,
    pub max_dispatches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub research_model: String,
    pub writer_model: String,
    pub editor_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub article_path: PathBuf,
}

impl LlmSettings {
    pub fn research(&self) -> LLMConfig {
        LLMConfig::new(&self.provider, &self.research_model, self.api_key.clone())
    }

    pub fn writer(&self) -> LLMConfig {
        LLMConfig::new(&self.provider, &self.writer_model, self.api_key.clone())
    }

    pub fn editor(&self) -> LLMConfig {
        LLMConfig::new(&self.provider, &self.editor_model, self.api_key.clone())
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = Config {
            flow: FlowConfig {
                topic: text("FLOW_TOPIC", defaults.flow.topic),
                max_retries: parse_or(&lookup, "FLOW_MAX_RETRIES", defaults.flow.max_retries)?,
                max_dispatches: parse_or(
                    &lookup,
                    "FLOW_MAX_DISPATCHES",
                    defaults.flow.max_dispatches,
                )?,
            },
            llm: LlmSettings {
                provider: text("LLM_PROVIDER", defaults.llm.provider).to_lowercase(),
                api_key: lookup("LLM_API_KEY").filter(|key| !key.is_empty()),
                research_model: text("RESEARCH_MODEL", defaults.llm.research_model),
                writer_model: text("WRITER_MODEL", defaults.llm.writer_model),
                editor_model: text("EDITOR_MODEL", defaults.llm.editor_model),
            },
            output: OutputConfig {
                article_path: lookup("ARTICLE_OUTPUT_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.output.article_path),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.flow.topic.trim().is_empty() {
            return Err(crate::Error::Config("FLOW_TOPIC must not be empty".to_string()));
        }
        if self.flow.max_dispatches == 0 {
            return Err(crate::Error::Config(
                "FLOW_MAX_DISPATCHES must be at least 1".to_string(),
            ));
        }
        if self.llm.provider != "mock" && self.llm.api_key.is_none() {
            tracing::warn!(
                provider = %self.llm.provider,
                "LLM_API_KEY is not set. Falling back to the provider's own environment variable."
            );
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> crate::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| crate::Error::Config(format!("{} is invalid ({}): {}", key, raw, e))),
        None => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flow: FlowConfig {
                topic: DEFAULT_TOPIC.to_string(),
                max_retries: DEFAULT_MAX_RETRIES,
                max_dispatches: DEFAULT_MAX_DISPATCHES,
            },
            llm: LlmSettings {
                provider: "mock".to_string(),
                api_key: None,
                research_model: "gpt-4".to_string(),
                writer_model: "gpt-4".to_string(),
                editor_model: "claude-3-haiku-20240307".to_string(),
            },
            output: OutputConfig {
                article_path: PathBuf::from("article.txt"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.flow.topic, DEFAULT_TOPIC);
        assert_eq!(config.flow.max_retries, 3);
        assert_eq!(config.llm.provider, "mock");
        assert_eq!(config.llm.editor().model, "claude-3-haiku-20240307");
        assert_eq!(config.output.article_path, PathBuf::from("article.txt"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("FLOW_TOPIC", "Rust async"),
            ("FLOW_MAX_RETRIES", " 5 "),
            ("LLM_PROVIDER", "OpenAI"),
            ("LLM_API_KEY", "sk-test"),
            ("ARTICLE_OUTPUT_PATH", "out/a.txt"),
        ]))
        .unwrap();

        assert_eq!(config.flow.topic, "Rust async");
        assert_eq!(config.flow.max_retries, 5);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.writer().api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.output.article_path, PathBuf::from("out/a.txt"));
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        let err = Config::from_lookup(lookup_from(&[("FLOW_MAX_RETRIES", "-1")])).unwrap_err();
        assert!(matches!(err, crate::Error::Config(ref msg) if msg.contains("FLOW_MAX_RETRIES")));

        let err = Config::from_lookup(lookup_from(&[("FLOW_MAX_DISPATCHES", "0")])).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
