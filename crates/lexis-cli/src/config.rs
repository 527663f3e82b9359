// crates/lexis-cli/src/config.rs
//
// Runtime configuration for the lexis binary.
// Loaded from a TOML file or populated with sensible defaults.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use lexis_engine::{Backend, ExecutionOptions, PlannerConfig};

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct LexisConfig {
    /// Directory for local data (the effect database).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file name, relative to `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reuse cached runs of identical plans.
    #[serde(default = "default_allow_cache")]
    pub allow_cache: bool,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Wall-clock budget for one plan. 0 disables the deadline.
    #[serde(default)]
    pub plan_timeout_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_subprocess_timeout_secs")]
    pub subprocess_timeout_secs: u64,

    /// Dictionary backend endpoints. Unset backends are not planned.
    #[serde(default)]
    pub backends: BackendsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendsConfig {
    #[serde(default)]
    pub diogenes_url: Option<String>,
    #[serde(default)]
    pub heritage_url: Option<String>,
    #[serde(default)]
    pub whitakers_path: Option<String>,
    /// Directory `words` runs from; it holds DICTLINE.GEN and friends.
    #[serde(default)]
    pub whitakers_dir: Option<String>,
    #[serde(default)]
    pub cdsl_dir: Option<String>,
}

fn default_data_dir() -> String {
    "~/.lexis/data".to_string()
}

fn default_database_file() -> String {
    "effects.sqlite3".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allow_cache() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    4
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_subprocess_timeout_secs() -> u64 {
    15
}

impl Default for LexisConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            log_level: default_log_level(),
            allow_cache: default_allow_cache(),
            max_concurrency: default_max_concurrency(),
            plan_timeout_secs: 0,
            http_timeout_secs: default_http_timeout_secs(),
            subprocess_timeout_secs: default_subprocess_timeout_secs(),
            backends: BackendsConfig::default(),
        }
    }
}

impl LexisConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        let config: LexisConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.data_dir)).join(&self.database_file)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn whitakers_dir(&self) -> Option<PathBuf> {
        self.backends
            .whitakers_dir
            .as_deref()
            .map(|dir| PathBuf::from(expand_tilde(dir)))
    }

    pub fn subprocess_timeout(&self) -> Duration {
        Duration::from_secs(self.subprocess_timeout_secs)
    }

    /// Planner settings. In fixture mode every backend gets a placeholder
    /// endpoint so the whole plan is built.
    pub fn planner_config(&self, max_candidates: usize, fixture: bool) -> PlannerConfig {
        let mut config = PlannerConfig {
            diogenes_url: self.backends.diogenes_url.clone(),
            heritage_url: self.backends.heritage_url.clone(),
            whitakers_path: self.backends.whitakers_path.as_deref().map(expand_tilde),
            cdsl_dir: self.backends.cdsl_dir.as_deref().map(expand_tilde),
            max_candidates,
        };
        if fixture {
            for backend in Backend::ALL {
                let placeholder = Some(format!("fixture://{}", backend.name()));
                match backend {
                    Backend::Diogenes => config.diogenes_url = placeholder,
                    Backend::Whitakers => config.whitakers_path = placeholder,
                    Backend::Heritage => config.heritage_url = placeholder,
                    Backend::Cdsl => config.cdsl_dir = placeholder,
                }
            }
        }
        config
    }

    pub fn execution_options(&self, no_cache: bool) -> ExecutionOptions {
        ExecutionOptions {
            allow_cache: self.allow_cache && !no_cache,
            max_concurrency: self.max_concurrency.max(1),
            deadline: (self.plan_timeout_secs > 0)
                .then(|| Duration::from_secs(self.plan_timeout_secs)),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    path.to_string()
}
