//! Ollama backend.
//!
//! Calls the non-streaming `/api/generate` endpoint through a blocking
//! `reqwest` client with configured timeouts and retry.
use std::time::Duration;

use tracing::debug;

use super::client::{LlmClient, LlmError, Prompt, RetryPolicy, retry_with_backoff};

/// Base URL used when neither the builder nor `OLLAMA_HOST` provides one.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use ontopath::llm::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.1:8b")
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl OllamaClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API (e.g. "http://localhost:11434").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model used for every request (e.g. "llama3.1:8b").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Per-request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Builds the `OllamaClient`.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, falling back to
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL`
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidUrl` for an unparsable base URL and
    /// `LlmError::Config` when no model name is available.
    pub fn build(self) -> Result<OllamaClient, LlmError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
        };
        let base_url = base_url.trim_end_matches('/').to_string();

        let model = match self.model {
            Some(m) => m,
            None => std::env::var("OLLAMA_MODEL").unwrap_or_default(),
        };
        if model.trim().is_empty() {
            return Err(LlmError::Config(
                "no Ollama model set (use model() or OLLAMA_MODEL)".to_string(),
            ));
        }

        reqwest::Url::parse(&base_url)
            .map_err(|e| LlmError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LlmError::Network)?;

        Ok(OllamaClient {
            client,
            base_url,
            model,
            temperature: self.temperature,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous client for the Ollama generate API.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists locally available models, largest first.
    pub fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(LlmError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(LlmError::Http {
                status: response.status().as_u16(),
            });
        }

        let json: serde_json::Value = response.json().map_err(LlmError::from_reqwest)?;
        let mut models: Vec<(String, u64)> = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| {
                        let name = model.get("name").and_then(|n| n.as_str())?;
                        let size = model.get("size").and_then(|s| s.as_u64()).unwrap_or(0);
                        Some((name.to_string(), size))
                    })
                    .collect()
            })
            .unwrap_or_default();

        models.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(models.into_iter().map(|(name, _)| name).collect())
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "system": prompt.system,
            "prompt": prompt.user,
            "stream": false
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }
        body
    }
}

impl LlmClient for OllamaClient {
    fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.request_body(prompt);
        debug!(model = %self.model, chars = prompt.user.len(), "Ollama generate");

        retry_with_backoff(self.retry, || {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .map_err(LlmError::from_reqwest)?;

            let status = response.status();
            if !status.is_success() {
                return Err(LlmError::Http {
                    status: status.as_u16(),
                });
            }

            let text = response.text().map_err(LlmError::from_reqwest)?;
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(LlmError::Serialization)?;
            parse_generate_response(&json)
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String, LlmError> {
    if let Some(message) = json.get("error").and_then(|e| e.as_str()) {
        return Err(LlmError::Api {
            message: message.to_string(),
        });
    }
    json.get("response")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Api {
            message: "Missing 'response' field in API response".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn build_uses_default_url_when_base_url_not_called() {
        unsafe {
            std::env::remove_var("OLLAMA_HOST");
        }
        let client = OllamaClientBuilder::new().model("m").build().unwrap();
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
    }

    #[test]
    #[serial]
    fn build_reads_ollama_host_environment_variable() {
        unsafe {
            std::env::set_var("OLLAMA_HOST", "http://custom-host:11434/");
        }
        let client = OllamaClientBuilder::new().model("m").build().unwrap();
        assert_eq!(client.base_url(), "http://custom-host:11434");
        unsafe {
            std::env::remove_var("OLLAMA_HOST");
        }
    }

    #[test]
    #[serial]
    fn builder_model_takes_precedence_over_env() {
        unsafe {
            std::env::set_var("OLLAMA_MODEL", "env-model");
        }
        let client = OllamaClientBuilder::new()
            .model("builder-model")
            .build()
            .unwrap();
        assert_eq!(client.model_name(), "builder-model");
        unsafe {
            std::env::remove_var("OLLAMA_MODEL");
        }
    }

    #[test]
    #[serial]
    fn build_fails_without_model() {
        unsafe {
            std::env::remove_var("OLLAMA_MODEL");
        }
        let result = OllamaClientBuilder::new().build();
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn build_returns_error_if_invalid_url_provided() {
        let result = OllamaClientBuilder::new()
            .base_url("not-a-valid-url")
            .model("m")
            .build();
        assert!(matches!(result, Err(LlmError::InvalidUrl(_))));
    }

    #[test]
    fn request_body_carries_system_prompt_and_temperature() {
        let client = OllamaClientBuilder::new()
            .base_url("http://localhost:11434")
            .model("m")
            .temperature(0.2)
            .build()
            .unwrap();
        let body = client.request_body(&Prompt {
            system: "sys".to_string(),
            user: "hello".to_string(),
        });
        assert_eq!(body["model"], "m");
        assert_eq!(body["system"], "sys");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["stream"], false);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn generate_response_is_extracted() {
        let json = serde_json::json!({ "response": "<answer>-</answer>" });
        assert_eq!(parse_generate_response(&json).unwrap(), "<answer>-</answer>");
    }

    #[test]
    fn error_payload_becomes_api_error() {
        let json = serde_json::json!({ "error": "model 'x' not found" });
        let err = parse_generate_response(&json).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn missing_response_field_is_api_error() {
        let json = serde_json::json!({ "done": true });
        assert!(matches!(
            parse_generate_response(&json),
            Err(LlmError::Api { .. })
        ));
    }
}
