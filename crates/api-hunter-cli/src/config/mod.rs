//! Configuration loading and resolution.
//!
//! Settings come from an optional TOML file, then CLI flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use api_hunter::{DiscoveryConfig, HunterError, ScoreTable, SourceKind};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "API_HUNTER_CONFIG";

/// Resolve the config file path.
///
/// Order: explicit path, `$API_HUNTER_CONFIG`, `./api-hunter.toml`,
/// `~/.api-hunter/config.toml`. Implicit locations are used only if they
/// exist.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_config = PathBuf::from("api-hunter.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    dirs::home_dir()
        .map(|home| home.join(".api-hunter").join("config.toml"))
        .filter(|path| path.exists())
}

/// Contents of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub threshold: Option<f64>,
    pub extend_scope: Option<bool>,
    pub extractors: Option<Vec<SourceKind>>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_scripts: Option<usize>,
    pub probe: Option<bool>,
    pub validate: Option<bool>,
    pub scores: Option<ScoreTable>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub threshold: Option<f64>,
    pub extend_scope: bool,
    pub extractors: Option<Vec<SourceKind>>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_scripts: Option<usize>,
    pub no_probe: bool,
    pub validate: bool,
}

/// Network-side settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Upper bound on concurrent requests.
    pub workers: usize,
    pub timeout_secs: u64,
    pub max_scripts: usize,
    /// Probe [`api_hunter::COMMON_PATHS`], plus
    /// [`api_hunter::AUTHENTICATED_PATHS`] when `headers` is non-empty.
    pub probe: bool,
    /// HEAD every ranked endpoint after discovery.
    pub validate: bool,
    /// Sent with every request (auth headers, cookies).
    pub headers: Vec<(String, String)>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout_secs: 10,
            max_scripts: 10,
            probe: true,
            validate: false,
            headers: Vec::new(),
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fully resolved settings for one scan.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub discovery: DiscoveryConfig,
    pub fetch: FetchSettings,
}

impl Settings {
    /// Merge file values and CLI overrides over the defaults, then validate.
    pub fn resolve(file: FileConfig, overrides: &Overrides) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(scores) = file.scores {
            settings.discovery.scores = scores;
        }
        if let Some(threshold) = overrides.threshold.or(file.threshold) {
            settings.discovery.threshold = threshold;
        }
        settings.discovery.extend_scope = overrides.extend_scope || file.extend_scope.unwrap_or(false);
        if let Some(kinds) = overrides.extractors.clone().or(file.extractors) {
            settings.discovery.extractors = kinds.into_iter().collect();
        }

        let fetch = &mut settings.fetch;
        if let Some(workers) = overrides.workers.or(file.workers) {
            fetch.workers = workers;
        }
        if let Some(timeout) = overrides.timeout_secs.or(file.timeout_secs) {
            fetch.timeout_secs = timeout;
        }
        if let Some(max_scripts) = overrides.max_scripts.or(file.max_scripts) {
            fetch.max_scripts = max_scripts;
        }
        fetch.probe = !overrides.no_probe && file.probe.unwrap_or(true);
        fetch.validate = overrides.validate || file.validate.unwrap_or(false);

        if fetch.workers == 0 {
            return Err(HunterError::Configuration("workers must be at least 1".into()).into());
        }
        if fetch.timeout_secs == 0 {
            return Err(HunterError::Configuration("timeout must be at least 1 second".into()).into());
        }
        settings.discovery.validate()?;
        Ok(settings)
    }

    /// Load the resolved config file (if any) and apply `overrides`.
    pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let file = match resolve_config_path(explicit) {
            Some(path) => {
                tracing::debug!("using config file {}", path.display());
                FileConfig::load(&path)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }
}
