//! The synchronization store: owns the in-memory directory state and decides,
//! for every read, whether to go to the network or to the durable cache.
//!
//! # Consistency
//!
//! Favorite toggles are optimistic. The in-memory flag flips first and the
//! durable write follows; a failed write is logged and never reverts the
//! in-memory flag. Memory and storage may therefore diverge until the next
//! successful write or full refresh.
//!
//! A refresh replaces the whole collection. Favorites survive it through
//! merge-on-fetch: a fresh record takes its flag from the in-memory record with
//! the same uuid, else from the durable record, else `false`. Durable writes from
//! refreshes and favorite toggles are serialized by a write gate, so a toggle
//! issued while a refresh is in flight is kept.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::cache::{PersistentCache, ALL_USERS_KEY};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{StorageError, StoreError};
use crate::models::User;
use crate::paginate::{is_valid_page, paginate};
use crate::remote::RemoteSource;

/// User-visible status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
  /// Offline (really or simulated upstream) and serving the cache
  Offline,
  SimulatedOffline,
  NoCachedData,
  CacheUnavailable,
  /// The cache exists but reading it failed
  CacheLoadFailed,
  /// Fetch failed and the cache had nothing to offer
  FetchFailed,
  FetchFailedShowingCache,
  /// Fresh data is shown but could not be written to the cache
  CacheWriteFailed,
}

impl StatusMessage {
  /// Whether this message reports a failure rather than a mode.
  pub fn is_error(self) -> bool {
    !matches!(self, Self::Offline | Self::SimulatedOffline)
  }
}

impl fmt::Display for StatusMessage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::Offline => "You are offline. Showing cached data.",
      Self::SimulatedOffline => "Simulated offline mode enabled. Showing cached data.",
      Self::NoCachedData => "No cached data available.",
      Self::CacheUnavailable => "Cache not available.",
      Self::CacheLoadFailed => "Failed to load cached data.",
      Self::FetchFailed => "Failed to fetch users. Loading from cache...",
      Self::FetchFailedShowingCache => "Failed to fetch users. Showing cached data.",
      Self::CacheWriteFailed => "Showing fresh data, but it could not be saved for offline use.",
    };
    f.write_str(text)
  }
}

/// Coarse state-machine phase derived from [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Loading,
  Loaded { with_error: bool },
}

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone)]
pub struct AppState {
  /// Full fetched collection
  pub all_users: Vec<User>,
  /// Visible slice of `all_users` for `current_page`
  pub users: Vec<User>,
  pub current_page: usize,
  pub page_size: usize,
  pub total_pages: usize,
  pub is_loading: bool,
  pub is_online: bool,
  pub is_manual_offline: bool,
  pub status: Option<StatusMessage>,
}

impl AppState {
  pub fn new(page_size: usize, is_online: bool, is_manual_offline: bool) -> Self {
    Self {
      all_users: Vec::new(),
      users: Vec::new(),
      current_page: 1,
      page_size,
      total_pages: 1,
      is_loading: false,
      is_online,
      is_manual_offline,
      status: None,
    }
  }

  pub fn phase(&self) -> Phase {
    if self.is_loading {
      Phase::Loading
    } else if self.all_users.is_empty() && self.status.is_none() {
      Phase::Idle
    } else {
      Phase::Loaded {
        with_error: self.status.is_some_and(StatusMessage::is_error),
      }
    }
  }

  /// 1-based `(first, last, total)` of the visible window, `None` when empty.
  pub fn display_range(&self) -> Option<(usize, usize, usize)> {
    if self.users.is_empty() {
      return None;
    }
    let first = (self.current_page - 1) * self.page_size + 1;
    Some((first, first + self.users.len() - 1, self.all_users.len()))
  }

  /// Replace the collection, keeping the current page if it is still in range.
  fn set_all_users(&mut self, users: Vec<User>) {
    self.all_users = users;
    let (_, total_pages) = paginate(&self.all_users, 1, self.page_size);
    if !is_valid_page(self.current_page, total_pages) {
      self.current_page = 1;
    }
    self.refresh_page();
  }

  fn refresh_page(&mut self) {
    let (slice, total_pages) = paginate(&self.all_users, self.current_page, self.page_size);
    self.users = slice.to_vec();
    self.total_pages = total_pages;
  }
}

/// Fetch parameters fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  pub page_size: usize,
  pub fetch_page: u32,
  pub fetch_results: u32,
}

impl From<&Config> for StoreOptions {
  fn from(config: &Config) -> Self {
    Self {
      page_size: config.page_size,
      fetch_page: config.fetch_page,
      fetch_results: config.fetch_results,
    }
  }
}

struct Inner {
  state: watch::Sender<AppState>,
  remote: Arc<dyn RemoteSource>,
  cache: Arc<dyn PersistentCache>,
  connectivity: ConnectivityMonitor,
  write_gate: Mutex<()>,
  options: StoreOptions,
}

/// Handle to the store. Clones share the same state.
#[derive(Clone)]
pub struct SyncStore {
  inner: Arc<Inner>,
}

impl SyncStore {
  pub fn new(
    remote: Arc<dyn RemoteSource>,
    cache: Arc<dyn PersistentCache>,
    connectivity: ConnectivityMonitor,
    options: StoreOptions,
  ) -> Self {
    let initial = AppState::new(
      options.page_size.max(1),
      connectivity.is_online(),
      connectivity.is_manual_offline(),
    );
    let (state, _rx) = watch::channel(initial);

    Self {
      inner: Arc::new(Inner {
        state,
        remote,
        cache,
        connectivity,
        write_gate: Mutex::new(()),
        options,
      }),
    }
  }

  pub fn snapshot(&self) -> AppState {
    self.inner.state.borrow().clone()
  }

  /// Receiver notified after every state change.
  pub fn subscribe(&self) -> watch::Receiver<AppState> {
    self.inner.state.subscribe()
  }

  fn publish(&self, f: impl FnOnce(&mut AppState)) {
    self.inner.state.send_modify(f);
  }

  /// Load users from the network, or from the cache when offline.
  ///
  /// Without `force_refresh`, an already populated collection is left alone
  /// and no request is made. At most one fetch is in flight at a time; any
  /// fetch requested meanwhile, forced or not, is dropped.
  pub async fn fetch_users(&self, force_refresh: bool) {
    if !self.inner.connectivity.is_online() {
      self.load_from_cache().await;
      return;
    }

    let start = self.inner.state.send_if_modified(|s| {
      if s.is_loading || (!force_refresh && !s.all_users.is_empty()) {
        return false;
      }
      s.is_loading = true;
      s.status = None;
      true
    });
    if !start {
      debug!(force_refresh, "fetch skipped: populated or already in flight");
      return;
    }

    let StoreOptions {
      fetch_page,
      fetch_results,
      ..
    } = self.inner.options;

    match self.inner.remote.fetch_users(fetch_page, fetch_results).await {
      Ok(fresh) => {
        info!(count = fresh.len(), "fetched users");
        self.commit_fetch(fresh).await;
      }
      Err(e) if !self.inner.connectivity.is_online() => {
        debug!(error = %e, "fetch failed after going offline, ignored");
      }
      Err(e) => {
        warn!(error = %e, "fetch failed, falling back to cache");
        self.publish(|s| s.status = Some(StatusMessage::FetchFailed));
        self.fallback_to_cache();
      }
    }

    self.publish(|s| s.is_loading = false);
  }

  /// Merge favorites into a fresh collection, publish it, then persist it.
  ///
  /// Dropped when the store went offline while the request was in flight.
  async fn commit_fetch(&self, fresh: Vec<User>) {
    let _gate = self.inner.write_gate.lock().await;

    let durable: HashMap<String, bool> = match self.inner.cache.read_all() {
      Ok(users) => users.into_iter().map(|u| (u.uuid, u.is_favorite)).collect(),
      Err(e) => {
        debug!(error = %e, "no durable favorites to merge");
        HashMap::new()
      }
    };

    let mut merged = None;
    self.inner.state.send_if_modified(|s| {
      if !self.inner.connectivity.is_online() {
        return false;
      }
      let users = merge_favorites(fresh, &s.all_users, &durable);
      merged = Some(users.clone());
      s.set_all_users(users);
      s.status = None;
      true
    });
    let Some(merged) = merged else {
      debug!("went offline during fetch, fresh data discarded");
      return;
    };

    match self
      .inner
      .cache
      .replace_all(&merged, ALL_USERS_KEY, self.inner.options.fetch_page)
    {
      Ok(()) => {}
      Err(StorageError::Unavailable(reason)) => {
        debug!(%reason, "cache unavailable, fresh data kept in memory only");
      }
      Err(e) => {
        warn!(error = %e, "failed to save users to cache");
        self.publish(|s| s.status = Some(StatusMessage::CacheWriteFailed));
      }
    }
  }

  /// After a failed fetch: show cached data if any, else keep the fetch error.
  fn fallback_to_cache(&self) {
    match self.inner.cache.read_all() {
      Ok(users) if !users.is_empty() => {
        self.publish(|s| {
          s.set_all_users(users);
          s.status = Some(StatusMessage::FetchFailedShowingCache);
        });
        self.log_provenance();
      }
      Ok(_) => debug!("cache empty after failed fetch"),
      Err(e) => debug!(error = %e, "cache unavailable after failed fetch"),
    }
  }

  /// Serve the last durable snapshot.
  ///
  /// Waits for any fetch commit or favorite write in progress, so the snapshot
  /// read is never older than what memory already showed.
  pub async fn load_from_cache(&self) {
    let outcome = {
      let _gate = self.inner.write_gate.lock().await;
      self.inner.cache.read_all()
    };
    let offline = if self.inner.connectivity.is_manual_offline() {
      StatusMessage::SimulatedOffline
    } else {
      StatusMessage::Offline
    };

    self.publish(|s| match outcome {
      Err(StorageError::Read(reason)) => {
        warn!(%reason, "failed to load cached data");
        s.status = Some(StatusMessage::CacheLoadFailed);
      }
      Err(e) => {
        warn!(error = %e, "cache not available");
        s.status = Some(StatusMessage::CacheUnavailable);
      }
      Ok(users) if users.is_empty() => {
        s.status = Some(StatusMessage::NoCachedData);
      }
      Ok(users) => {
        debug!(count = users.len(), "loaded users from cache");
        s.set_all_users(users);
        s.status = Some(offline);
      }
    });
    self.log_provenance();
  }

  fn log_provenance(&self) {
    if let Ok(records) = self.inner.cache.metadata() {
      if let Some(latest) = records.first() {
        debug!(
          key = %latest.key,
          page = latest.page,
          last_fetched = %latest.last_fetched,
          "serving cached snapshot"
        );
      }
    }
  }

  /// Show `page`. Rejected without any state change when out of range or
  /// while a fetch is in flight.
  pub fn go_to_page(&self, page: usize) -> Result<(), StoreError> {
    let mut result = Ok(());
    self.inner.state.send_if_modified(|s| {
      if s.is_loading {
        result = Err(StoreError::NavigationWhileLoading);
        return false;
      }
      if !is_valid_page(page, s.total_pages) {
        result = Err(StoreError::InvalidNavigation {
          page,
          total_pages: s.total_pages,
        });
        return false;
      }
      if s.current_page == page {
        return false;
      }
      s.current_page = page;
      s.refresh_page();
      true
    });
    result
  }

  pub fn next_page(&self) -> Result<(), StoreError> {
    let current = self.inner.state.borrow().current_page;
    self.go_to_page(current + 1)
  }

  pub fn previous_page(&self) -> Result<(), StoreError> {
    let current = self.inner.state.borrow().current_page;
    self.go_to_page(current.saturating_sub(1))
  }

  /// Flip the favorite flag of `uuid` and persist it. Returns the new flag.
  ///
  /// The in-memory flip is published before the durable write and is kept
  /// even if that write fails.
  pub async fn toggle_favorite(&self, uuid: &str) -> Result<bool, StoreError> {
    let mut flipped = None;
    self.inner.state.send_if_modified(|s| {
      let Some(user) = s.all_users.iter_mut().find(|u| u.uuid == uuid) else {
        return false;
      };
      user.is_favorite = !user.is_favorite;
      flipped = Some(user.is_favorite);
      s.refresh_page();
      true
    });
    let is_favorite = flipped.ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;

    let _gate = self.inner.write_gate.lock().await;

    // Persist whatever memory holds now; a later toggle may have flipped it back
    let current = self
      .inner
      .state
      .borrow()
      .all_users
      .iter()
      .find(|u| u.uuid == uuid)
      .map(|u| u.is_favorite);
    let Some(current) = current else {
      debug!(uuid, "favorite target replaced by refresh before persisting");
      return Ok(is_favorite);
    };

    match self.inner.cache.update_favorite(uuid, current) {
      Ok(true) => debug!(uuid, is_favorite = current, "persisted favorite"),
      Ok(false) => debug!(uuid, "favorite target not in cache"),
      Err(e) => warn!(uuid, error = %e, "failed to persist favorite, keeping in-memory flag"),
    }

    Ok(is_favorite)
  }

  /// Enter or leave simulated offline mode.
  pub async fn toggle_manual_offline(&self) {
    let engaging = !self.inner.connectivity.is_manual_offline();
    let online = self.inner.connectivity.set_manual_offline(engaging);
    info!(manual_offline = engaging, online, "toggled manual offline");

    self.publish(|s| {
      s.is_manual_offline = engaging;
      s.is_online = online;
    });

    if engaging {
      self.load_from_cache().await;
    } else if online {
      self.publish(|s| s.status = None);
      self.fetch_users(false).await;
    } else {
      self.publish(|s| s.status = Some(StatusMessage::Offline));
    }
  }

  /// Apply a raw network transition reported by the host.
  ///
  /// Ignored (but recorded) while manual offline mode is engaged.
  pub fn handle_network_change(&self, online: bool) {
    match self.inner.connectivity.set_raw_online(online) {
      Some(effective) => self.publish(|s| {
        s.is_online = effective;
        s.status = if effective {
          None
        } else {
          Some(StatusMessage::Offline)
        };
      }),
      None => debug!(online, "raw connectivity change not forwarded"),
    }
  }
}

/// Favorite precedence for a fresh record: in-memory, then durable, then unset.
fn merge_favorites(
  fresh: Vec<User>,
  in_memory: &[User],
  durable: &HashMap<String, bool>,
) -> Vec<User> {
  let in_memory: HashMap<&str, bool> = in_memory
    .iter()
    .map(|u| (u.uuid.as_str(), u.is_favorite))
    .collect();

  fresh
    .into_iter()
    .map(|mut user| {
      user.is_favorite = in_memory
        .get(user.uuid.as_str())
        .or_else(|| durable.get(&user.uuid))
        .copied()
        .unwrap_or(false);
      user
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryCache;
  use crate::error::NetworkError;
  use crate::models::fixtures::users;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::Notify;

  /// Scripted remote: returns `users` (or fails when `None`) and counts calls.
  struct FakeRemote {
    calls: AtomicUsize,
    users: std::sync::Mutex<Option<Vec<User>>>,
    hold: Option<Arc<Notify>>,
  }

  impl FakeRemote {
    fn ok(users: Vec<User>) -> Arc<Self> {
      Arc::new(Self {
        calls: AtomicUsize::new(0),
        users: std::sync::Mutex::new(Some(users)),
        hold: None,
      })
    }

    fn failing() -> Arc<Self> {
      Arc::new(Self {
        calls: AtomicUsize::new(0),
        users: std::sync::Mutex::new(None),
        hold: None,
      })
    }

    /// Waits for `hold` before answering; `None` answers with an error.
    fn held(users: Option<Vec<User>>, hold: Arc<Notify>) -> Arc<Self> {
      Arc::new(Self {
        calls: AtomicUsize::new(0),
        users: std::sync::Mutex::new(users),
        hold: Some(hold),
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl RemoteSource for FakeRemote {
    async fn fetch_users(&self, _page: u32, _results: u32) -> Result<Vec<User>, NetworkError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(hold) = &self.hold {
        hold.notified().await;
      }
      let users = self.users.lock().unwrap().clone();
      users.ok_or_else(|| NetworkError::Transport("connection refused".to_string()))
    }
  }

  const OPTIONS: StoreOptions = StoreOptions {
    page_size: 10,
    fetch_page: 1,
    fetch_results: 50,
  };

  fn store_with(
    remote: Arc<FakeRemote>,
    cache: Arc<MemoryCache>,
    online: bool,
  ) -> (SyncStore, ConnectivityMonitor) {
    let monitor = ConnectivityMonitor::new(online);
    let store = SyncStore::new(remote, cache, monitor.clone(), OPTIONS);
    (store, monitor)
  }

  fn seeded_cache(count: usize) -> Arc<MemoryCache> {
    let cache = Arc::new(MemoryCache::new());
    cache.replace_all(&users(count), ALL_USERS_KEY, 1).unwrap();
    cache
  }

  fn favorite_in(list: &[User], uuid: &str) -> Option<bool> {
    list.iter().find(|u| u.uuid == uuid).map(|u| u.is_favorite)
  }

  #[test]
  fn test_initial_state() {
    let (store, _) = store_with(FakeRemote::ok(vec![]), Arc::new(MemoryCache::new()), true);
    let state = store.snapshot();
    assert!(state.users.is_empty());
    assert_eq!(state.current_page, 1);
    assert_eq!(state.page_size, 10);
    assert_eq!(state.total_pages, 1);
    assert!(!state.is_loading);
    assert!(state.status.is_none());
    assert_eq!(state.phase(), Phase::Idle);
  }

  #[tokio::test]
  async fn test_fetch_populates_empty_store() {
    let remote = FakeRemote::ok(users(23));
    let cache = Arc::new(MemoryCache::new());
    let (store, _) = store_with(remote.clone(), cache.clone(), true);

    store.fetch_users(false).await;

    let state = store.snapshot();
    assert_eq!(state.all_users.len(), 23);
    assert_eq!(state.users.len(), 10);
    assert_eq!(state.total_pages, 3);
    assert_eq!(state.current_page, 1);
    assert_eq!(state.phase(), Phase::Loaded { with_error: false });
    assert_eq!(cache.read_all().unwrap().len(), 23);

    let meta = cache.metadata().unwrap();
    assert_eq!(meta[0].key, ALL_USERS_KEY);
    assert_eq!(meta[0].page, 1);
  }

  #[tokio::test]
  async fn test_fetch_is_coalesced_when_populated() {
    let remote = FakeRemote::ok(users(5));
    let (store, _) = store_with(remote.clone(), Arc::new(MemoryCache::new()), true);

    store.fetch_users(false).await;
    store.fetch_users(false).await;
    assert_eq!(remote.calls(), 1);

    store.fetch_users(true).await;
    assert_eq!(remote.calls(), 2);
  }

  #[tokio::test]
  async fn test_fetch_failure_falls_back_to_cache() {
    let remote = FakeRemote::failing();
    let (store, _) = store_with(remote.clone(), seeded_cache(25), true);

    store.fetch_users(false).await;

    let state = store.snapshot();
    assert_eq!(remote.calls(), 1);
    assert_eq!(state.status, Some(StatusMessage::FetchFailedShowingCache));
    assert_eq!(state.phase(), Phase::Loaded { with_error: true });
    assert_eq!(state.all_users.len(), 25);
    assert_eq!(state.total_pages, 3);
    assert!(!state.is_loading);
  }

  #[tokio::test]
  async fn test_fetch_failure_with_empty_cache_keeps_error() {
    let (store, _) = store_with(FakeRemote::failing(), Arc::new(MemoryCache::new()), true);

    store.fetch_users(false).await;

    let state = store.snapshot();
    assert_eq!(state.status, Some(StatusMessage::FetchFailed));
    assert!(state.all_users.is_empty());
  }

  #[tokio::test]
  async fn test_fetch_offline_reads_cache_without_network() {
    let remote = FakeRemote::ok(users(3));
    let (store, _) = store_with(remote.clone(), seeded_cache(12), false);

    store.fetch_users(false).await;

    let state = store.snapshot();
    assert_eq!(remote.calls(), 0);
    assert_eq!(state.all_users.len(), 12);
    assert_eq!(state.status, Some(StatusMessage::Offline));
    assert_eq!(state.phase(), Phase::Loaded { with_error: false });
  }

  #[tokio::test]
  async fn test_load_from_cache_empty_and_unavailable() {
    let (store, _) = store_with(FakeRemote::ok(vec![]), Arc::new(MemoryCache::new()), false);
    store.load_from_cache().await;
    assert_eq!(store.snapshot().status, Some(StatusMessage::NoCachedData));

    let monitor = ConnectivityMonitor::new(false);
    let store = SyncStore::new(
      FakeRemote::ok(vec![]),
      Arc::new(crate::cache::NoopCache),
      monitor,
      OPTIONS,
    );
    store.load_from_cache().await;
    let state = store.snapshot();
    assert_eq!(state.status, Some(StatusMessage::CacheUnavailable));
    assert!(state.all_users.is_empty());
  }

  #[tokio::test]
  async fn test_fetch_with_unavailable_cache_keeps_fresh_data() {
    let monitor = ConnectivityMonitor::new(true);
    let store = SyncStore::new(
      FakeRemote::ok(users(4)),
      Arc::new(crate::cache::NoopCache),
      monitor,
      OPTIONS,
    );
    store.fetch_users(false).await;
    let state = store.snapshot();
    assert_eq!(state.all_users.len(), 4);
    assert!(state.status.is_none());
  }

  #[tokio::test]
  async fn test_cache_write_failure_is_surfaced() {
    let cache = Arc::new(MemoryCache::new());
    cache.fail_writes(true);
    let (store, _) = store_with(FakeRemote::ok(users(4)), cache.clone(), true);

    store.fetch_users(false).await;

    let state = store.snapshot();
    assert_eq!(state.all_users.len(), 4);
    assert_eq!(state.status, Some(StatusMessage::CacheWriteFailed));
    assert!(cache.read_all().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_go_to_page_bounds() {
    let (store, _) = store_with(FakeRemote::ok(users(25)), Arc::new(MemoryCache::new()), true);
    store.fetch_users(false).await;

    assert_eq!(
      store.go_to_page(0),
      Err(StoreError::InvalidNavigation {
        page: 0,
        total_pages: 3
      })
    );
    assert!(store.go_to_page(4).is_err());
    assert_eq!(store.snapshot().current_page, 1);

    store.go_to_page(3).unwrap();
    let state = store.snapshot();
    assert_eq!(state.current_page, 3);
    assert_eq!(state.users.len(), 5);
    assert_eq!(state.users[0].uuid, "uuid-20");
    assert_eq!(state.display_range(), Some((21, 25, 25)));

    store.previous_page().unwrap();
    assert_eq!(store.snapshot().current_page, 2);
    store.next_page().unwrap();
    assert!(store.next_page().is_err());
    assert_eq!(store.snapshot().current_page, 3);
  }

  #[tokio::test]
  async fn test_navigation_rejected_while_loading() {
    let hold = Arc::new(Notify::new());
    let remote = FakeRemote::held(Some(users(30)), hold.clone());
    let (store, _) = store_with(remote, seeded_cache(30), true);
    store.load_from_cache().await;

    let fetch = tokio::spawn({
      let store = store.clone();
      async move { store.fetch_users(true).await }
    });
    while !store.snapshot().is_loading {
      tokio::task::yield_now().await;
    }

    assert_eq!(store.go_to_page(2), Err(StoreError::NavigationWhileLoading));
    assert_eq!(store.snapshot().current_page, 1);

    hold.notify_one();
    fetch.await.unwrap();
    assert!(store.go_to_page(2).is_ok());
  }

  #[tokio::test]
  async fn test_second_refresh_dropped_while_first_in_flight() {
    let hold = Arc::new(Notify::new());
    let remote = FakeRemote::held(Some(users(12)), hold.clone());
    let (store, _) = store_with(remote.clone(), seeded_cache(30), true);
    store.load_from_cache().await;

    let first = tokio::spawn({
      let store = store.clone();
      async move { store.fetch_users(true).await }
    });
    while !store.snapshot().is_loading {
      tokio::task::yield_now().await;
    }

    // Returns at once without a request and leaves the loading flag alone
    store.fetch_users(true).await;
    assert_eq!(remote.calls(), 1);
    assert!(store.snapshot().is_loading);
    assert_eq!(store.go_to_page(2), Err(StoreError::NavigationWhileLoading));

    hold.notify_one();
    first.await.unwrap();

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.all_users.len(), 12);
    assert_eq!(remote.calls(), 1);
    assert!(store.go_to_page(2).is_ok());
  }

  #[tokio::test]
  async fn test_fetch_finishing_after_manual_offline_is_discarded() {
    let hold = Arc::new(Notify::new());
    let cache = seeded_cache(3);
    let remote = FakeRemote::held(Some(users(8)), hold.clone());
    let (store, _) = store_with(remote, cache.clone(), true);

    let fetch = tokio::spawn({
      let store = store.clone();
      async move { store.fetch_users(false).await }
    });
    while !store.snapshot().is_loading {
      tokio::task::yield_now().await;
    }

    store.toggle_manual_offline().await;
    assert_eq!(store.snapshot().status, Some(StatusMessage::SimulatedOffline));

    hold.notify_one();
    fetch.await.unwrap();

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert!(state.is_manual_offline);
    assert_eq!(state.status, Some(StatusMessage::SimulatedOffline));
    assert_eq!(state.all_users.len(), 3);
    assert_eq!(cache.read_all().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_fetch_failing_after_manual_offline_keeps_status() {
    let hold = Arc::new(Notify::new());
    let remote = FakeRemote::held(None, hold.clone());
    let (store, _) = store_with(remote, seeded_cache(3), true);

    let fetch = tokio::spawn({
      let store = store.clone();
      async move { store.fetch_users(false).await }
    });
    while !store.snapshot().is_loading {
      tokio::task::yield_now().await;
    }

    store.toggle_manual_offline().await;
    hold.notify_one();
    fetch.await.unwrap();

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.status, Some(StatusMessage::SimulatedOffline));
  }

  #[tokio::test]
  async fn test_refresh_in_manual_offline_keeps_simulated_status() {
    let remote = FakeRemote::ok(users(4));
    let (store, _) = store_with(remote.clone(), seeded_cache(4), true);

    store.toggle_manual_offline().await;
    store.fetch_users(true).await;

    let state = store.snapshot();
    assert_eq!(remote.calls(), 0);
    assert_eq!(state.status, Some(StatusMessage::SimulatedOffline));
    assert_eq!(state.all_users.len(), 4);
  }

  #[tokio::test]
  async fn test_cache_read_failure_is_distinct_from_unavailable() {
    let cache = Arc::new(MemoryCache::new());
    cache.replace_all(&users(3), ALL_USERS_KEY, 1).unwrap();
    cache.fail_reads(true);
    let (store, _) = store_with(FakeRemote::ok(vec![]), cache, false);

    store.load_from_cache().await;

    let state = store.snapshot();
    assert_eq!(state.status, Some(StatusMessage::CacheLoadFailed));
    assert_eq!(
      state.status.map(|s| s.to_string()).as_deref(),
      Some("Failed to load cached data.")
    );
    assert_eq!(state.phase(), Phase::Loaded { with_error: true });
    assert!(state.all_users.is_empty());
  }

  #[tokio::test]
  async fn test_toggle_favorite_round_trip() {
    let cache = Arc::new(MemoryCache::new());
    let (store, _) = store_with(FakeRemote::ok(users(5)), cache.clone(), true);
    store.fetch_users(false).await;

    assert!(store.toggle_favorite("uuid-2").await.unwrap());
    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-2"), Some(true));
    assert_eq!(favorite_in(&store.snapshot().users, "uuid-2"), Some(true));
    assert_eq!(favorite_in(&cache.read_all().unwrap(), "uuid-2"), Some(true));

    assert!(!store.toggle_favorite("uuid-2").await.unwrap());
    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-2"), Some(false));
    assert_eq!(favorite_in(&cache.read_all().unwrap(), "uuid-2"), Some(false));
  }

  #[tokio::test]
  async fn test_toggle_favorite_unknown_uuid() {
    let (store, _) = store_with(FakeRemote::ok(users(2)), Arc::new(MemoryCache::new()), true);
    store.fetch_users(false).await;
    assert_eq!(
      store.toggle_favorite("nobody").await,
      Err(StoreError::NotFound("nobody".to_string()))
    );
  }

  #[tokio::test]
  async fn test_toggle_favorite_survives_write_failure() {
    let cache = Arc::new(MemoryCache::new());
    let (store, _) = store_with(FakeRemote::ok(users(3)), cache.clone(), true);
    store.fetch_users(false).await;
    cache.fail_writes(true);

    assert!(store.toggle_favorite("uuid-0").await.unwrap());
    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-0"), Some(true));
    assert_eq!(favorite_in(&cache.read_all().unwrap(), "uuid-0"), Some(false));
  }

  #[tokio::test]
  async fn test_forced_refresh_keeps_favorites() {
    let cache = Arc::new(MemoryCache::new());
    let (store, _) = store_with(FakeRemote::ok(users(5)), cache.clone(), true);
    store.fetch_users(false).await;
    store.toggle_favorite("uuid-3").await.unwrap();

    store.fetch_users(true).await;

    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-3"), Some(true));
    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-1"), Some(false));
    assert_eq!(favorite_in(&cache.read_all().unwrap(), "uuid-3"), Some(true));
  }

  #[tokio::test]
  async fn test_favorites_merged_from_durable_cache_on_first_fetch() {
    let cache = Arc::new(MemoryCache::new());
    let mut cached = users(3);
    cached[1].is_favorite = true;
    cache.replace_all(&cached, ALL_USERS_KEY, 1).unwrap();

    let (store, _) = store_with(FakeRemote::ok(users(3)), cache, true);
    store.fetch_users(false).await;

    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-1"), Some(true));
  }

  #[tokio::test]
  async fn test_toggle_during_refresh_survives() {
    let hold = Arc::new(Notify::new());
    let cache = seeded_cache(5);
    let remote = FakeRemote::held(Some(users(5)), hold.clone());
    let (store, _) = store_with(remote, cache.clone(), true);
    store.load_from_cache().await;

    let fetch = tokio::spawn({
      let store = store.clone();
      async move { store.fetch_users(true).await }
    });
    while !store.snapshot().is_loading {
      tokio::task::yield_now().await;
    }

    store.toggle_favorite("uuid-4").await.unwrap();
    hold.notify_one();
    fetch.await.unwrap();

    let state = store.snapshot();
    assert!(!state.is_loading);
    assert_eq!(favorite_in(&state.all_users, "uuid-4"), Some(true));
    assert_eq!(favorite_in(&cache.read_all().unwrap(), "uuid-4"), Some(true));
  }

  #[tokio::test]
  async fn test_concurrent_toggles_persist_final_value() {
    let cache = Arc::new(MemoryCache::new());
    let (store, _) = store_with(FakeRemote::ok(users(3)), cache.clone(), true);
    store.fetch_users(false).await;

    let (a, b) = futures::join!(
      store.toggle_favorite("uuid-1"),
      store.toggle_favorite("uuid-1")
    );
    assert_ne!(a.unwrap(), b.unwrap());
    assert_eq!(favorite_in(&store.snapshot().all_users, "uuid-1"), Some(false));
    assert_eq!(favorite_in(&cache.read_all().unwrap(), "uuid-1"), Some(false));
  }

  #[tokio::test]
  async fn test_manual_offline_round_trip() {
    let remote = FakeRemote::ok(users(8));
    let cache = Arc::new(MemoryCache::new());
    let (store, monitor) = store_with(remote.clone(), cache, true);

    store.fetch_users(false).await;
    assert_eq!(remote.calls(), 1);

    store.toggle_manual_offline().await;
    let state = store.snapshot();
    assert!(state.is_manual_offline);
    assert!(!state.is_online);
    assert_eq!(state.status, Some(StatusMessage::SimulatedOffline));
    assert_eq!(state.all_users.len(), 8);

    // Offline fetches never hit the network
    store.fetch_users(true).await;
    assert_eq!(remote.calls(), 1);

    // A raw online event does not clear manual offline mode
    store.handle_network_change(false);
    store.handle_network_change(true);
    assert!(!store.snapshot().is_online);
    assert!(!monitor.is_online());

    store.toggle_manual_offline().await;
    let state = store.snapshot();
    assert!(!state.is_manual_offline);
    assert!(state.is_online);
    assert!(state.status.is_none());
    // Collection already populated: fetch(false) coalesces
    assert_eq!(remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_leaving_manual_offline_while_really_offline() {
    let remote = FakeRemote::ok(users(2));
    let (store, _) = store_with(remote.clone(), seeded_cache(2), true);

    store.toggle_manual_offline().await;
    store.handle_network_change(false);
    store.toggle_manual_offline().await;

    let state = store.snapshot();
    assert!(!state.is_online);
    assert!(!state.is_manual_offline);
    assert_eq!(state.status, Some(StatusMessage::Offline));
    assert_eq!(remote.calls(), 0);
  }

  #[tokio::test]
  async fn test_leaving_manual_offline_fetches_when_empty() {
    let remote = FakeRemote::ok(users(2));
    let (store, _) = store_with(remote.clone(), Arc::new(MemoryCache::new()), true);

    store.toggle_manual_offline().await;
    assert_eq!(store.snapshot().status, Some(StatusMessage::NoCachedData));

    store.toggle_manual_offline().await;
    assert_eq!(remote.calls(), 1);
    assert_eq!(store.snapshot().all_users.len(), 2);
  }

  #[test]
  fn test_raw_network_changes() {
    let (store, _) = store_with(FakeRemote::ok(vec![]), Arc::new(MemoryCache::new()), true);

    store.handle_network_change(false);
    let state = store.snapshot();
    assert!(!state.is_online);
    assert_eq!(state.status, Some(StatusMessage::Offline));

    store.handle_network_change(true);
    let state = store.snapshot();
    assert!(state.is_online);
    assert!(state.status.is_none());
  }

  #[tokio::test]
  async fn test_page_kept_or_reset_on_replacement() {
    let cache = seeded_cache(30);
    let (store, _) = store_with(FakeRemote::ok(users(12)), cache, true);
    store.load_from_cache().await;
    store.go_to_page(3).unwrap();

    store.fetch_users(true).await;
    let state = store.snapshot();
    assert_eq!(state.total_pages, 2);
    assert_eq!(state.current_page, 1);
  }

  #[tokio::test]
  async fn test_subscribers_see_updates() {
    let (store, _) = store_with(FakeRemote::ok(users(3)), Arc::new(MemoryCache::new()), true);
    let mut rx = store.subscribe();
    store.fetch_users(false).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().all_users.len(), 3);
  }

  #[test]
  fn test_merge_precedence() {
    let fresh = users(3);
    let mut in_memory = users(2);
    in_memory[0].is_favorite = false;
    in_memory[1].is_favorite = true;
    let durable: HashMap<String, bool> = [
      ("uuid-0".to_string(), true),
      ("uuid-2".to_string(), true),
    ]
    .into_iter()
    .collect();

    let merged = merge_favorites(fresh, &in_memory, &durable);
    assert!(!merged[0].is_favorite, "memory overrides durable");
    assert!(merged[1].is_favorite);
    assert!(merged[2].is_favorite, "durable used when not in memory");
  }

  #[test]
  fn test_status_messages() {
    assert!(!StatusMessage::Offline.is_error());
    assert!(StatusMessage::FetchFailedShowingCache.is_error());
    assert_eq!(
      StatusMessage::NoCachedData.to_string(),
      "No cached data available."
    );
  }
}
