//! Configuration loading with multi-layer merge

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level pipewright configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipewrightConfig {
    /// Global defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Outbound HTTP for request steps
    #[serde(default)]
    pub http: HttpConfig,

    /// Filter collaborator selection
    #[serde(default)]
    pub filter: FilterConfig,

    /// Optional language model used by the in-process filter
    #[serde(default)]
    pub llm: LlmConfig,

    /// `serve` command settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Global default settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Default timeout in seconds for collaborator calls
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Steps allowed in flight at once (1 runs the schedule sequentially)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    1
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Timeout in seconds; falls back to `defaults.timeout`
    pub timeout: Option<u64>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("pipewright/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// URL of a remote filter service; absent means filter in-process
    pub endpoint: Option<String>,

    /// Timeout in seconds; falls back to `defaults.timeout`
    pub timeout: Option<u64>,
}

/// OpenAI-compatible chat model settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Whether the model may be used at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; resolved from `api_key_env` at load time when unset
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout in seconds; falls back to `defaults.timeout`
    pub timeout: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout: None,
        }
    }
}

impl LlmConfig {
    /// A model is usable only when enabled and a key is known
    pub fn is_configured(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the filter service listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3001".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl PipewrightConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/pipewright/config.toml
    /// 3. .pipewright/config.toml (project)
    ///
    /// The LLM API key is resolved from the environment once, here.
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                let user_config = Self::load_file(&user_config_path)
                    .with_context(|| format!("loading {}", user_config_path.display()))?;
                config.merge(user_config);
            }
        }

        let project_config_path = project_dir
            .map(|p| p.join(".pipewright/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".pipewright/config.toml"));

        if project_config_path.exists() {
            let project_config = Self::load_file(&project_config_path)
                .with_context(|| format!("loading {}", project_config_path.display()))?;
            config.merge(project_config);
        }

        config.resolve_api_key(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Get the user config path (~/.config/pipewright/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pipewright/config.toml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.defaults.timeout != default_timeout() {
            self.defaults.timeout = other.defaults.timeout;
        }
        if other.defaults.max_concurrency != default_max_concurrency() {
            self.defaults.max_concurrency = other.defaults.max_concurrency;
        }

        if other.http.timeout.is_some() {
            self.http.timeout = other.http.timeout;
        }
        if other.http.user_agent != default_user_agent() {
            self.http.user_agent = other.http.user_agent;
        }

        if other.filter.endpoint.is_some() {
            self.filter.endpoint = other.filter.endpoint;
        }
        if other.filter.timeout.is_some() {
            self.filter.timeout = other.filter.timeout;
        }

        if !other.llm.enabled {
            self.llm.enabled = false;
        }
        if other.llm.base_url != default_base_url() {
            self.llm.base_url = other.llm.base_url;
        }
        if other.llm.model != default_model() {
            self.llm.model = other.llm.model;
        }
        if other.llm.api_key.is_some() {
            self.llm.api_key = other.llm.api_key;
        }
        if other.llm.api_key_env != default_api_key_env() {
            self.llm.api_key_env = other.llm.api_key_env;
        }
        if other.llm.temperature != default_temperature() {
            self.llm.temperature = other.llm.temperature;
        }
        if other.llm.timeout.is_some() {
            self.llm.timeout = other.llm.timeout;
        }

        if other.server.bind != default_bind() {
            self.server.bind = other.server.bind;
        }
    }

    /// Fill the LLM key from its environment variable when not set explicitly
    pub fn resolve_api_key<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup(&self.llm.api_key_env).filter(|k| !k.is_empty());
        }
    }

    /// Copy safe to print, with the API key masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("********".into());
        }
        copy
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout.unwrap_or(self.defaults.timeout))
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter.timeout.unwrap_or(self.defaults.timeout))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout.unwrap_or(self.defaults.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PipewrightConfig::default();
        assert_eq!(config.defaults.timeout, 30);
        assert_eq!(config.defaults.max_concurrency, 1);
        assert!(config.filter.endpoint.is_none());
        assert_eq!(config.server.bind, "127.0.0.1:3001");
        assert!(!config.llm.is_configured());
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            [defaults]
            timeout = 10
            max_concurrency = 4

            [http]
            timeout = 5

            [filter]
            endpoint = "http://localhost:3001/api/filter"

            [llm]
            model = "gpt-4o-mini"
            api_key_env = "MY_KEY"
        "#
        )
        .unwrap();

        let config = PipewrightConfig::load_file(&config_path).unwrap();
        assert_eq!(config.defaults.max_concurrency, 4);
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert_eq!(config.filter_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.filter.endpoint.as_deref(),
            Some("http://localhost:3001/api/filter")
        );
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key_env, "MY_KEY");
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<PipewrightConfig, _> = toml::from_str(
            r#"
            [defaults]
            parallel = true
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut base = PipewrightConfig::default();
        base.defaults.max_concurrency = 2;
        base.llm.model = "base-model".into();

        let mut overlay = PipewrightConfig::default();
        overlay.llm.model = "overlay-model".into();
        overlay.server.bind = "0.0.0.0:8080".into();
        overlay.filter.endpoint = Some("http://filter".into());

        base.merge(overlay);

        // Untouched values in the overlay keep the base value
        assert_eq!(base.defaults.max_concurrency, 2);
        assert_eq!(base.llm.model, "overlay-model");
        assert_eq!(base.server.bind, "0.0.0.0:8080");
        assert_eq!(base.filter.endpoint.as_deref(), Some("http://filter"));
    }

    #[test]
    fn test_load_project_layer() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".pipewright")).unwrap();
        std::fs::write(
            dir.path().join(".pipewright/config.toml"),
            "[server]\nbind = \"127.0.0.1:4000\"\n",
        )
        .unwrap();

        let config = PipewrightConfig::load(Some(dir.path())).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:4000");
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        let mut config = PipewrightConfig::default();
        config.resolve_api_key(|name| (name == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert!(config.llm.is_configured());

        // Explicit key wins over the environment
        let mut config = PipewrightConfig::default();
        config.llm.api_key = Some("sk-file".into());
        config.resolve_api_key(|_| Some("sk-env".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_disabled_llm_is_not_configured() {
        let mut config = PipewrightConfig::default();
        config.llm.api_key = Some("sk-test".into());
        config.llm.enabled = false;
        assert!(!config.llm.is_configured());
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut config = PipewrightConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("********"));
    }
}
