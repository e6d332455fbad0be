use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://randomuser.me/api/";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Remote user API, queried with `?page=<n>&results=<count>`
  pub endpoint: String,
  /// Remote page requested on every fetch
  pub fetch_page: u32,
  /// Number of users requested on every fetch
  pub fetch_results: u32,
  /// Users per local page
  pub page_size: usize,
  pub request_timeout_secs: u64,
  /// How often the reachability probe checks the endpoint host
  pub probe_interval_secs: u64,
  /// Cache database location (defaults to $XDG_DATA_HOME/userdir/cache.db)
  pub database_path: Option<PathBuf>,
  pub cache: CacheBackend,
  /// Start with simulated offline mode engaged
  pub start_offline: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      endpoint: DEFAULT_ENDPOINT.to_string(),
      fetch_page: 1,
      fetch_results: 50,
      page_size: 10,
      request_timeout_secs: 10,
      probe_interval_secs: 15,
      database_path: None,
      cache: CacheBackend::default(),
      start_offline: false,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// SQLite database on disk
  #[default]
  Sqlite,
  /// Kept in process memory for this session only
  Memory,
  /// No storage facility; offline reads report the cache as unavailable
  None,
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  /// Not validated here; command line overrides are applied first.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./userdir.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/userdir/config.yaml
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
    let local = PathBuf::from("userdir.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("userdir").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  pub fn validate(&self) -> Result<()> {
    if self.page_size == 0 {
      return Err(eyre!("page_size must be at least 1"));
    }
    if self.fetch_results == 0 {
      return Err(eyre!("fetch_results must be at least 1"));
    }
    self.endpoint_url()?;
    Ok(())
  }

  pub fn endpoint_url(&self) -> Result<Url> {
    let url =
      Url::parse(&self.endpoint).map_err(|e| eyre!("Invalid endpoint {}: {}", self.endpoint, e))?;
    if url.host_str().is_none() {
      return Err(eyre!("Endpoint {} has no host", self.endpoint));
    }
    Ok(url)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs.max(1))
  }

  pub fn probe_interval(&self) -> Duration {
    Duration::from_secs(self.probe_interval_secs.max(1))
  }
}
