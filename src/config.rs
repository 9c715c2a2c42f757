//! Runtime configuration: LLM endpoint, graph endpoints, pipeline knobs.
//!
//! Persisted as TOML (default location `$XDG_CONFIG_HOME/factcards/config.toml`).
//! A legacy `keys.json` file with the upper-case key layout is also accepted.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["FACTCARDS_API_KEY", "OPENROUTER_API_KEY"];

static LANGUAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]+)*$").expect("static regex"));

/// How the extractor decomposes a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Broad concepts, one property dump per concept.
    Themes,
    /// A chain of (entity, relation, object) hops.
    Triplets,
    /// Triplets for factual wh-questions, themes otherwise.
    #[default]
    Auto,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Themes => f.write_str("themes"),
            Self::Triplets => f.write_str("triplets"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Chat-completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Full URL of the chat-completions endpoint.
    #[serde(default = "default_llm_url")]
    pub api_url: String,
    /// Bearer token. Falls back to [`API_KEY_ENV_VARS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Send `response_format: {"type": "json_object"}`.
    #[serde(default = "default_true")]
    pub json_mode: bool,
}

/// Wikidata search API and SPARQL endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_sparql_endpoint")]
    pub sparql_endpoint: String,
    #[serde(default = "default_search_api")]
    pub search_api: String,
    /// Label language for search and the label service.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Pipeline behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Upper bound on extracted themes.
    #[serde(default = "default_max_themes")]
    pub max_themes: usize,
    /// Rows fetched per SPARQL query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Resolve and retrieve themes in parallel.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Try the fixed question patterns before asking the LLM for triplets.
    #[serde(default = "default_true")]
    pub patterns: bool,
}

fn default_llm_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_sparql_endpoint() -> String {
    "https://query.wikidata.org/sparql".into()
}
fn default_search_api() -> String {
    "https://www.wikidata.org/w/api.php".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_graph_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    concat!("factcards/", env!("CARGO_PKG_VERSION")).into()
}
fn default_max_themes() -> usize {
    10
}
fn default_top_k() -> usize {
    10
}
fn default_true() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_llm_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout(),
            json_mode: true,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            sparql_endpoint: default_sparql_endpoint(),
            search_api: default_search_api(),
            language: default_language(),
            timeout_secs: default_graph_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            max_themes: default_max_themes(),
            top_k: default_top_k(),
            parallel: true,
            patterns: true,
        }
    }
}

/// The original `keys.json` layout.
#[derive(Debug, Deserialize)]
struct LegacyKeys {
    #[serde(rename = "SPARQL_ENDPOINT", alias = "KG_ENDPOINT")]
    sparql_endpoint: Option<String>,
    #[serde(rename = "WIKIDATA_API_URL")]
    wikidata_api_url: Option<String>,
    #[serde(rename = "OPENROUTER_API_URL")]
    api_url: Option<String>,
    #[serde(rename = "OPENROUTER_API_KEY")]
    api_key: Option<String>,
    #[serde(rename = "OPENROUTER_API_MODEL")]
    model: Option<String>,
}

impl From<LegacyKeys> for Config {
    fn from(keys: LegacyKeys) -> Self {
        let mut config = Config::default();
        if let Some(v) = keys.sparql_endpoint {
            config.graph.sparql_endpoint = v;
        }
        if let Some(v) = keys.wikidata_api_url {
            config.graph.search_api = v;
        }
        if let Some(v) = keys.api_url {
            config.llm.api_url = v;
        }
        config.llm.api_key = keys.api_key;
        if let Some(v) = keys.model {
            config.llm.model = v;
        }
        config
    }
}

impl Config {
    /// Load from a TOML file, or a legacy `keys.json` when the extension is `.json`.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let keys: LegacyKeys =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            Ok(keys.into())
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    }

    /// Save as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Write a default config to `path` unless one exists (or `force` is set).
    pub fn init(path: &Path, force: bool) -> ConfigResult<Self> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists {
                path: path.display().to_string(),
            });
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Fill a missing API key from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if self.llm.api_key.as_deref().is_none_or(str::is_empty) {
            self.llm.api_key = API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
        }
        self
    }

    /// Check the settings the pipeline cannot run without.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.llm.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(ConfigError::MissingApiKey);
        }
        for (name, url) in [
            ("llm.api_url", &self.llm.api_url),
            ("graph.sparql_endpoint", &self.graph.sparql_endpoint),
            ("graph.search_api", &self.graph.search_api),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be an http(s) URL, got \"{url}\""),
                });
            }
        }
        if !LANGUAGE_TAG.is_match(&self.graph.language) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "graph.language must be a lowercase language tag, got \"{}\"",
                    self.graph.language
                ),
            });
        }
        if self.pipeline.top_k == 0 || self.pipeline.max_themes == 0 {
            return Err(ConfigError::Invalid {
                message: "pipeline.top_k and pipeline.max_themes must be at least 1".into(),
            });
        }
        if self.llm.timeout_secs == 0 || self.graph.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "timeouts must be at least one second".into(),
            });
        }
        Ok(())
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("********".into());
        }
        copy
    }
}
