//! Experiment configuration.
//!
//! A TOML file with four sections:
//!
//! ```toml
//! [data]
//! tables = "data/tables.json"
//! labels = "data/labels.json"
//! ontology = "data/ontology.owl"
//!
//! [llm]
//! provider = "ollama"          # or "openai"
//! model = "llama3.1:8b"
//!
//! [experiment]
//! mode = "edm"                 # llm | cot | edm
//! max_depth = 2
//! consensus_threshold_ratio = 0.5
//!
//! [output]
//! results_dir = "results"
//! ```
//!
//! `tables` and `labels` may instead name a directory in the CSV layout
//! (`table_list.csv`, one CSV per table, `ground_truth.csv`).
//!
//! Only `[data]` is required. Relative paths are resolved against the
//! directory of the config file. `OLLAMA_HOST`, `OLLAMA_MODEL` and
//! `OPENAI_API_KEY` override the corresponding `[llm]` entries.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::EnsembleParams;
use crate::oracle::PromptMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),

    #[error("failed to determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// `tables.json` or a CSV table directory.
    pub tables: PathBuf,
    /// `labels.json`, `ground_truth.csv`, or the directory holding it.
    pub labels: PathBuf,
    pub ontology: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    /// OpenAI-compatible endpoint, or Azure OpenAI when `api_version` is set.
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    /// Ollama base URL.
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// OpenAI or Azure endpoint.
    pub endpoint: Option<String>,
    /// Azure deployment; takes precedence over `model` for Azure.
    pub deployment: Option<String>,
    pub api_version: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            base_url: None,
            model: None,
            endpoint: None,
            deployment: None,
            api_version: None,
            api_key: None,
            temperature: None,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    /// Model or deployment name used to label results.
    pub fn model_label(&self) -> &str {
        let name = match self.provider {
            Provider::Ollama => self.model.as_deref(),
            Provider::OpenAi => self.deployment.as_deref().or(self.model.as_deref()),
        };
        name.filter(|n| !n.trim().is_empty()).unwrap_or("default")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("OLLAMA_HOST") {
            self.base_url = Some(host);
        }
        if let Some(model) = var("OLLAMA_MODEL")
            && self.provider == Provider::Ollama
        {
            self.model = Some(model);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub mode: PromptMode,
    /// Table rows shown in each prompt.
    pub sample_rows: usize,
    pub max_depth: usize,
    pub avg_classes_per_agent: usize,
    pub avg_agents_per_class: usize,
    pub consensus_threshold_ratio: f64,
    pub seed: Option<u64>,
    pub max_concurrency: usize,
    /// `None` waits for every agent indefinitely.
    pub agent_timeout_secs: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let params = EnsembleParams::default();
        Self {
            mode: PromptMode::Llm,
            sample_rows: 5,
            max_depth: 2,
            avg_classes_per_agent: params.avg_classes_per_agent,
            avg_agents_per_class: params.avg_agents_per_class,
            consensus_threshold_ratio: params.consensus_threshold_ratio,
            seed: None,
            max_concurrency: params.max_concurrency,
            agent_timeout_secs: params.agent_timeout.map(|t| t.as_secs()),
        }
    }
}

impl ExperimentConfig {
    pub fn ensemble_params(&self) -> EnsembleParams {
        EnsembleParams {
            avg_classes_per_agent: self.avg_classes_per_agent,
            avg_agents_per_class: self.avg_agents_per_class,
            consensus_threshold_ratio: self.consensus_threshold_ratio,
            max_concurrency: self.max_concurrency,
            agent_timeout: self.agent_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
        }
    }
}

impl Config {
    /// Reads, resolves, overrides from the environment, and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file is unreadable, malformed, names an
    /// unknown mode or provider, or holds out-of-range values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.llm.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses without touching the filesystem or environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.experiment
            .ensemble_params()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.experiment.agent_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "agent_timeout_secs must be positive".to_string(),
            ));
        }
        if let Some(t) = self.llm.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within [0, 2], got {t}"
            )));
        }
        if self.llm.provider == Provider::OpenAi && self.llm.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "provider 'openai' requires llm.endpoint".to_string(),
            ));
        }
        Ok(())
    }

    /// Results for one model go to `{results_dir}/{model}`.
    pub fn results_dir(&self) -> PathBuf {
        let label: String = self
            .llm
            .model_label()
            .chars()
            .map(|c| if c == '/' || c == ':' || c == '\\' { '_' } else { c })
            .collect();
        self.output.results_dir.join(label)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.data.tables,
            &mut self.data.labels,
            &mut self.data.ontology,
            &mut self.output.results_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// `{config_dir}/ontopath/config.toml`, e.g. `~/.config/ontopath/config.toml` on Linux.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join("ontopath").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [data]
        tables = "tables.json"
        labels = "labels.json"
        ontology = "onto.owl"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.llm.provider, Provider::Ollama);
        assert_eq!(config.experiment.mode, PromptMode::Llm);
        assert_eq!(config.experiment.max_depth, 2);
        assert_eq!(config.experiment.sample_rows, 5);
        assert_eq!(config.experiment.ensemble_params(), EnsembleParams::default());
        assert_eq!(config.results_dir(), PathBuf::from("results/default"));
    }

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml_str(
            r#"
            [data]
            tables = "t.json"
            labels = "l.json"
            ontology = "o.json"

            [llm]
            provider = "openai"
            endpoint = "https://example.openai.azure.com"
            deployment = "gpt-4o"
            api_version = "2024-08-01-preview"
            temperature = 0.0

            [experiment]
            mode = "edm"
            max_depth = 3
            avg_classes_per_agent = 4
            avg_agents_per_class = 2
            consensus_threshold_ratio = 0.75
            seed = 42
            agent_timeout_secs = 30

            [output]
            results_dir = "out"
            "#,
        )
        .unwrap();

        assert_eq!(config.experiment.mode, PromptMode::Edm);
        assert_eq!(config.experiment.seed, Some(42));
        let params = config.experiment.ensemble_params();
        assert_eq!(params.avg_classes_per_agent, 4);
        assert_eq!(params.agent_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.results_dir(), PathBuf::from("out/gpt-4o"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let text = format!("{MINIMAL}\n[experiment]\nmode = \"vote\"\n");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        let text = format!("{MINIMAL}\n[experiment]\nconsensus_threshold_ratio = 1.5\n");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn openai_needs_endpoint() {
        let text = format!("{MINIMAL}\n[llm]\nprovider = \"openai\"\n");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn model_names_are_safe_directory_names() {
        let text = format!("{MINIMAL}\n[llm]\nmodel = \"library/llama3.1:8b\"\n");
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(
            config.results_dir(),
            PathBuf::from("results/library_llama3.1_8b")
        );
    }

    #[test]
    fn env_values_override_file_values() {
        let mut llm = LlmConfig {
            base_url: Some("http://file:11434".to_string()),
            model: Some("file-model".to_string()),
            ..LlmConfig::default()
        };
        llm.apply_env(|name| match name {
            "OLLAMA_HOST" => Some("http://env:11434".to_string()),
            "OLLAMA_MODEL" => Some("env-model".to_string()),
            _ => None,
        });
        assert_eq!(llm.base_url.as_deref(), Some("http://env:11434"));
        assert_eq!(llm.model.as_deref(), Some("env-model"));
        assert_eq!(llm.api_key, None);
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.resolve_paths(Path::new("/srv/exp"));
        assert_eq!(config.data.tables, PathBuf::from("/srv/exp/tables.json"));
        assert_eq!(config.output.results_dir, PathBuf::from("/srv/exp/results"));
    }
}
