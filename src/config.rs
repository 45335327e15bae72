use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::JsonStore;
use crate::rate_limit::DEFAULT_MAX_REQUESTS_PER_HOUR;

/// Budget alias the API resolves to the most recently used budget
pub const LAST_USED_BUDGET: &str = "last-used";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub ynab: YnabConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub rate_limit: RateLimitConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YnabConfig {
  /// API base url
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Budget used when a tool call doesn't name one
  pub default_budget: Option<String>,
}

impl Default for YnabConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      default_budget: None,
    }
  }
}

fn default_api_url() -> String {
  "https://api.ynab.com/v1/".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Cache root (defaults to $XDG_DATA_HOME/ynab-agent)
  pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
  #[serde(default = "default_max_requests")]
  pub max_requests_per_hour: usize,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      max_requests_per_hour: default_max_requests(),
    }
  }
}

fn default_max_requests() -> usize {
  DEFAULT_MAX_REQUESTS_PER_HOUR
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Directory for log files (defaults to <cache dir>/logs)
  pub dir: Option<PathBuf>,
  /// Filter directive, e.g. "info" or "ynab_agent=debug"
  pub level: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ynab-agent.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ynab-agent/config.yaml
  ///
  /// With no file found, defaults are used; everything has one.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ynab-agent.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ynab-agent").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a null document, not an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Resolve the cache root.
  pub fn cache_dir(&self) -> Result<PathBuf> {
    match &self.cache.dir {
      Some(dir) => Ok(dir.clone()),
      None => JsonStore::default_root(),
    }
  }

  /// Resolve the log directory.
  pub fn log_dir(&self) -> Result<PathBuf> {
    match &self.logging.dir {
      Some(dir) => Ok(dir.clone()),
      None => Ok(self.cache_dir()?.join("logs")),
    }
  }

  /// Budget to use when a call doesn't name one.
  pub fn default_budget(&self) -> &str {
    self
      .ynab
      .default_budget
      .as_deref()
      .unwrap_or(LAST_USED_BUDGET)
  }

  /// Get the YNAB personal access token from environment variables.
  ///
  /// Checks YNAB_AGENT_TOKEN first, then YNAB_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("YNAB_AGENT_TOKEN")
      .or_else(|_| std::env::var("YNAB_API_TOKEN"))
      .map_err(|_| {
        eyre!("YNAB access token not found. Set YNAB_AGENT_TOKEN or YNAB_API_TOKEN environment variable.")
      })
  }
}
