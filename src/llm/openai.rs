/// OpenAI-compatible chat-completions backend, including Azure OpenAI.
///
/// With an `api_version` the client targets an Azure deployment
/// (`{endpoint}/openai/deployments/{model}/chat/completions?api-version=..`,
/// `api-key` header). Without one it targets `{endpoint}/v1/chat/completions`
/// with a bearer token and the model in the request body.
use std::time::Duration;

use tracing::debug;

use super::client::{LlmClient, LlmError, Prompt, RetryPolicy, retry_with_backoff};

#[derive(Debug, Default)]
pub struct OpenAiClientBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    api_version: Option<String>,
    temperature: Option<f32>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl OpenAiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// API key; falls back to `OPENAI_API_KEY` when unset.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Model name, or deployment name for Azure.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Azure API version (e.g. "2024-08-01-preview").
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// # Errors
    ///
    /// Returns `LlmError::Config` when the endpoint, key or model is missing
    /// and `LlmError::InvalidUrl` when the endpoint cannot be parsed.
    pub fn build(self) -> Result<OpenAiClient, LlmError> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| LlmError::Config("no endpoint set".to_string()))?;
        let endpoint = endpoint.trim_end_matches('/').to_string();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| LlmError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let api_key = match self.api_key {
            Some(key) => key,
            None => std::env::var("OPENAI_API_KEY")
                .map_err(|_| LlmError::Config("no API key set (use OPENAI_API_KEY)".to_string()))?,
        };
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| LlmError::Config("no model or deployment set".to_string()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LlmError::Network)?;

        Ok(OpenAiClient {
            client,
            endpoint,
            api_key,
            model,
            api_version: self.api_version,
            temperature: self.temperature,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    api_version: Option<String>,
    temperature: Option<f32>,
    retry: RetryPolicy,
}

impl OpenAiClient {
    fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }

    fn url(&self) -> String {
        match &self.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, self.model, version
            ),
            None => format!("{}/v1/chat/completions", self.endpoint),
        }
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ]
        });
        if !self.is_azure() {
            body["model"] = serde_json::Value::String(self.model.clone());
        }
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        body
    }
}

impl LlmClient for OpenAiClient {
    fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let url = self.url();
        let body = self.request_body(prompt);
        debug!(model = %self.model, azure = self.is_azure(), "Chat completion");

        retry_with_backoff(self.retry, || {
            let request = self.client.post(&url).json(&body);
            let request = if self.is_azure() {
                request.header("api-key", &self.api_key)
            } else {
                request.bearer_auth(&self.api_key)
            };
            let response = request.send().map_err(LlmError::from_reqwest)?;

            let status = response.status();
            if !status.is_success() {
                return Err(LlmError::Http {
                    status: status.as_u16(),
                });
            }

            let text = response.text().map_err(LlmError::from_reqwest)?;
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(LlmError::Serialization)?;
            parse_chat_response(&json)
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, LlmError> {
    if let Some(message) = json.pointer("/error/message").and_then(|m| m.as_str()) {
        return Err(LlmError::Api {
            message: message.to_string(),
        });
    }
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Api {
            message: "Missing 'choices[0].message.content' in API response".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        Prompt {
            system: "sys".to_string(),
            user: "hi".to_string(),
        }
    }

    #[test]
    fn azure_url_uses_deployment_and_version() {
        let client = OpenAiClientBuilder::new()
            .endpoint("https://example.openai.azure.com/")
            .api_key("k")
            .model("gpt-4o")
            .api_version("2024-08-01-preview")
            .build()
            .unwrap();
        assert_eq!(
            client.url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview"
        );
        assert!(client.request_body(&prompt()).get("model").is_none());
    }

    #[test]
    fn plain_url_puts_model_in_body() {
        let client = OpenAiClientBuilder::new()
            .endpoint("https://api.example.com")
            .api_key("k")
            .model("gpt-4o-mini")
            .temperature(0.0)
            .build()
            .unwrap();
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");
        let body = client.request_body(&prompt());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn missing_model_is_config_error() {
        let result = OpenAiClientBuilder::new()
            .endpoint("https://api.example.com")
            .api_key("k")
            .build();
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn chat_content_is_extracted() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "<answer>A</answer>" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "<answer>A</answer>");
    }

    #[test]
    fn error_object_becomes_api_error() {
        let json = serde_json::json!({ "error": { "message": "quota exceeded" } });
        assert!(matches!(
            parse_chat_response(&json),
            Err(LlmError::Api { .. })
        ));
    }
}
