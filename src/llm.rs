//! LLM transport.
//!
//! Blocking HTTP clients for Ollama and OpenAI-compatible chat endpoints
//! behind the [`LlmClient`] trait.

mod client;
mod ollama;
mod openai;

use std::sync::Arc;

use crate::config::{LlmConfig, Provider};

pub use client::{LlmClient, LlmError, Prompt, RetryPolicy, retry_with_backoff};
pub use ollama::{DEFAULT_OLLAMA_URL, OllamaClient, OllamaClientBuilder};
pub use openai::{OpenAiClient, OpenAiClientBuilder};

/// Builds the client selected by `config.provider`.
///
/// # Errors
///
/// Returns `LlmError::Config` or `LlmError::InvalidUrl` when required
/// settings are missing or malformed.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let retry = RetryPolicy {
        max_retries: config.max_retries,
        ..RetryPolicy::default()
    };

    match config.provider {
        Provider::Ollama => {
            let mut builder = OllamaClientBuilder::new()
                .timeout(config.timeout())
                .retry(retry);
            if let Some(url) = &config.base_url {
                builder = builder.base_url(url);
            }
            if let Some(model) = &config.model {
                builder = builder.model(model);
            }
            if let Some(t) = config.temperature {
                builder = builder.temperature(t);
            }
            Ok(Arc::new(builder.build()?))
        }
        Provider::OpenAi => {
            let mut builder = OpenAiClientBuilder::new()
                .timeout(config.timeout())
                .retry(retry);
            if let Some(endpoint) = &config.endpoint {
                builder = builder.endpoint(endpoint);
            }
            if let Some(key) = &config.api_key {
                builder = builder.api_key(key);
            }
            if let Some(name) = config.deployment.as_ref().or(config.model.as_ref()) {
                builder = builder.model(name);
            }
            if let Some(version) = &config.api_version {
                builder = builder.api_version(version);
            }
            if let Some(t) = config.temperature {
                builder = builder.temperature(t);
            }
            Ok(Arc::new(builder.build()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ollama_client_from_config() {
        let config = LlmConfig {
            base_url: Some("http://gpu-box:11434/".to_string()),
            model: Some("qwen2.5:7b".to_string()),
            ..LlmConfig::default()
        };
        let client = client_from_config(&config).unwrap();
        assert_eq!(client.model_name(), "qwen2.5:7b");
    }

    #[test]
    fn azure_uses_deployment_name() {
        let config = LlmConfig {
            provider: Provider::OpenAi,
            endpoint: Some("https://example.openai.azure.com".to_string()),
            deployment: Some("gpt-4o-mini".to_string()),
            model: Some("ignored".to_string()),
            api_version: Some("2024-08-01-preview".to_string()),
            api_key: Some("secret".to_string()),
            ..LlmConfig::default()
        };
        let client = client_from_config(&config).unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let config = LlmConfig {
            provider: Provider::OpenAi,
            endpoint: Some("not a url".to_string()),
            api_key: Some("secret".to_string()),
            model: Some("gpt-4o".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(
            client_from_config(&config),
            Err(LlmError::InvalidUrl(_))
        ));
    }
}
