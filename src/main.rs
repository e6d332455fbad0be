mod app;
mod cache;
mod config;
mod connectivity;
mod db;
mod error;
mod event;
mod logging;
mod models;
mod paginate;
mod remote;
mod store;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use cache::{MemoryCache, NoopCache, PersistentCache, SqliteCache};
use config::{CacheBackend, Config};
use connectivity::{ConnectivityMonitor, ProbeTarget};
use remote::RemoteClient;
use store::{StoreOptions, SyncStore};

#[derive(Parser, Debug)]
#[command(name = "userdir")]
#[command(about = "A local-first user directory that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/userdir/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Remote user API endpoint
  #[arg(short, long)]
  endpoint: Option<String>,

  /// Users per page
  #[arg(long)]
  page_size: Option<usize>,

  /// Storage backend for the offline cache
  #[arg(long, value_enum)]
  cache: Option<CacheBackend>,

  /// Start in simulated offline mode
  #[arg(long)]
  offline: bool,
}

impl Args {
  /// Apply command line overrides on top of the file configuration
  fn apply(self, config: Config) -> Config {
    Config {
      endpoint: self.endpoint.unwrap_or(config.endpoint),
      page_size: self.page_size.unwrap_or(config.page_size),
      cache: self.cache.unwrap_or(config.cache),
      start_offline: self.offline || config.start_offline,
      ..config
    }
  }
}

/// Pick the storage facility; an unusable one degrades to "no cache".
fn open_cache(config: &Config) -> Arc<dyn PersistentCache> {
  match config.cache {
    CacheBackend::Sqlite => {
      let Some(path) = config.database_path.clone().or_else(db::default_path) else {
        warn!("no data directory for the cache database, caching disabled");
        return Arc::new(NoopCache);
      };
      match SqliteCache::open(&path) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
          warn!(error = %e, "cache database unavailable, caching disabled");
          Arc::new(NoopCache)
        }
      }
    }
    CacheBackend::Memory => Arc::new(MemoryCache::new()),
    CacheBackend::None => Arc::new(NoopCache),
  }
}

/// Establish raw connectivity, run the initial load, then keep probing.
async fn start_sync(store: SyncStore, target: Option<ProbeTarget>, config: Config) {
  let raw_online = match &target {
    Some(target) => target.is_reachable(config.request_timeout()).await,
    None => true,
  };
  store.handle_network_change(raw_online);

  if let Some(target) = target {
    let probe_store = store.clone();
    connectivity::spawn_probe(target, config.probe_interval(), raw_online, move |online| {
      let store = probe_store.clone();
      async move { store.handle_network_change(online) }
    });
  }

  if config.start_offline {
    store.toggle_manual_offline().await;
  } else {
    store.fetch_users(false).await;
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let config = args.apply(config);
  config.validate()?;

  let _log_guard = logging::init()?;
  info!(endpoint = %config.endpoint, cache = ?config.cache, "starting");

  let endpoint = config.endpoint_url()?;
  let remote = Arc::new(RemoteClient::new(&config)?);
  let cache = open_cache(&config);

  // Assume online until the first probe answers
  let monitor = ConnectivityMonitor::new(true);
  let store = SyncStore::new(remote, cache, monitor, StoreOptions::from(&config));

  // Probe and load in the background so the UI comes up immediately
  tokio::spawn(start_sync(
    store.clone(),
    ProbeTarget::from_url(&endpoint),
    config.clone(),
  ));

  // Initialize and run the app
  let mut app = app::App::new(store, config.endpoint.clone());
  app.run().await?;

  Ok(())
}
