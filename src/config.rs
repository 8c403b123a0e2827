use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::Credentials;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  /// Screen opened at startup, by resource name or alias
  pub default_view: Option<String>,
  /// Username for unattended sign-in; the password comes from the environment
  pub username: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the backend; requests go to `{url}/api/...`
  pub url: String,
  /// Request timeout; the network stack default applies when unset
  pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Keep cached collections on disk for offline use
  #[serde(default)]
  pub persist: bool,
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      persist: false,
      stale_secs: default_stale_secs(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_stale_secs() -> u64 {
  300
}

impl ApiConfig {
  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(Duration::from_secs)
  }
}

impl CacheConfig {
  /// How long a cached collection counts as fresh.
  ///
  /// Fails for values the cache's clock arithmetic cannot represent.
  pub fn stale_time(&self) -> Result<chrono::Duration> {
    i64::try_from(self.stale_secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
      .ok_or_else(|| eyre!("cache.stale_secs {} is out of range", self.stale_secs))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sce.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sce/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/sce/config.yaml\n\
                 See config.example.yaml in the repository for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("sce.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sce").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    url::Url::parse(&config.api.url).map_err(|e| eyre!("invalid api.url '{}': {}", config.api.url, e))?;
    config.cache.stale_time()?;
    Ok(config)
  }

  /// Credentials for unattended sign-in.
  ///
  /// Username from SCE_USERNAME or the config file, password from
  /// SCE_PASSWORD. Returns None unless both are present.
  pub fn credentials(&self) -> Option<Credentials> {
    let username = std::env::var("SCE_USERNAME")
      .ok()
      .or_else(|| self.username.clone())
      .filter(|u| !u.is_empty())?;
    let password = std::env::var("SCE_PASSWORD").ok().filter(|p| !p.is_empty())?;
    Some(Credentials { username, password })
  }

  /// Text shown in the header: the configured title or the API host
  pub fn header_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| self.api.url.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: http://localhost:3000\n").unwrap();
    assert!(config.cache.enabled);
    assert!(!config.cache.persist);
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(config.api.timeout(), None);
    assert_eq!(config.header_title(), "localhost");
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  url: https://sce.example.org
  timeout_secs: 15
title: Control Electoral
default_view: centros
username: admin
cache:
  enabled: true
  persist: true
  stale_secs: 60
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.api.timeout(), Some(Duration::from_secs(15)));
    assert_eq!(config.default_view.as_deref(), Some("centros"));
    assert!(config.cache.persist);
    assert_eq!(config.cache.stale_secs, 60);
    assert_eq!(config.header_title(), "Control Electoral");
  }

  #[test]
  fn test_out_of_range_stale_time_is_rejected() {
    let err = Config::parse(
      "api:\n  url: http://localhost:3000\ncache:\n  stale_secs: 10000000000000000\n",
    )
    .unwrap_err();
    assert!(err.to_string().contains("cache.stale_secs"));

    let huge = CacheConfig {
      stale_secs: u64::MAX,
      ..CacheConfig::default()
    };
    assert!(huge.stale_time().is_err());
    assert_eq!(
      CacheConfig::default().stale_time().unwrap(),
      chrono::Duration::minutes(5)
    );
  }

  #[test]
  fn test_example_config_parses() {
    let config = Config::parse(include_str!("../config.example.yaml")).unwrap();
    assert_eq!(config.default_view.as_deref(), Some("centros"));
    assert_eq!(config.api.timeout(), Some(Duration::from_secs(15)));
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    assert!(Config::parse("api:\n  url: not a url\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/sce.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
