//! Online/offline tracking with a manual override.
//!
//! The effective state is `!manual_offline && raw_online`. Raw transitions come
//! from a reachability probe; the manual flag is only ever changed explicitly.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
  pub raw_online: bool,
  pub manual_offline: bool,
}

impl Connectivity {
  pub fn effective_online(&self) -> bool {
    !self.manual_offline && self.raw_online
  }
}

/// Shared connectivity state. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
  state: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
  pub fn new(raw_online: bool) -> Self {
    let (tx, _rx) = watch::channel(Connectivity {
      raw_online,
      manual_offline: false,
    });
    Self {
      state: Arc::new(tx),
    }
  }

  pub fn current(&self) -> Connectivity {
    *self.state.borrow()
  }

  /// Effective online state, used for every fetch-vs-cache decision
  pub fn is_online(&self) -> bool {
    self.current().effective_online()
  }

  pub fn is_manual_offline(&self) -> bool {
    self.current().manual_offline
  }

  /// Record a raw network transition.
  ///
  /// Returns the new effective state when the transition is forwarded, `None`
  /// when nothing changed or manual offline mode swallowed it. A raw "online"
  /// never clears manual offline mode.
  pub fn set_raw_online(&self, online: bool) -> Option<bool> {
    let mut forwarded = None;
    self.state.send_if_modified(|c| {
      if c.raw_online == online {
        return false;
      }
      c.raw_online = online;
      if !c.manual_offline {
        forwarded = Some(online);
      }
      true
    });
    forwarded
  }

  /// Engage or clear manual offline mode, returning the effective state after.
  pub fn set_manual_offline(&self, manual_offline: bool) -> bool {
    self.state.send_if_modified(|c| {
      let changed = c.manual_offline != manual_offline;
      c.manual_offline = manual_offline;
      changed
    });
    self.is_online()
  }
}

/// Host and port the reachability probe connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
  pub host: String,
  pub port: u16,
}

impl ProbeTarget {
  pub fn from_url(url: &Url) -> Option<Self> {
    Some(Self {
      host: url.host_str()?.to_string(),
      port: url.port_or_known_default()?,
    })
  }

  /// Whether a TCP connection to the target succeeds within `timeout`.
  pub async fn is_reachable(&self, timeout: Duration) -> bool {
    let connect = TcpStream::connect((self.host.as_str(), self.port));
    match tokio::time::timeout(timeout, connect).await {
      Ok(Ok(_)) => true,
      Ok(Err(e)) => {
        debug!(host = %self.host, error = %e, "reachability probe failed");
        false
      }
      Err(_) => {
        debug!(host = %self.host, "reachability probe timed out");
        false
      }
    }
  }
}

/// Periodically probe `target` and call `on_change` whenever reachability flips.
///
/// `initial` is the state already known to the caller; no callback fires for it.
pub fn spawn_probe<F, Fut>(
  target: ProbeTarget,
  interval: Duration,
  initial: bool,
  on_change: F,
) -> JoinHandle<()>
where
  F: Fn(bool) -> Fut + Send + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  tokio::spawn(async move {
    let mut last = initial;
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; the caller already probed once
    ticker.tick().await;

    loop {
      ticker.tick().await;
      let online = target.is_reachable(interval.min(Duration::from_secs(5))).await;
      if online != last {
        if online {
          info!(host = %target.host, "network: online");
        } else {
          warn!(host = %target.host, "network: offline");
        }
        last = online;
        on_change(online).await;
      }
    }
  })
}
