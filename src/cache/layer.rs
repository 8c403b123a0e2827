//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::storage::{CacheStorage, CachedEntry};
use super::traits::{CacheResult, Cacheable, QueryKey};
use crate::api::ApiError;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

/// A fetch that other readers of the same key can join
struct InFlight {
  id: u64,
  resource: String,
  /// `SharedFetch<T>` for the key's value type
  future: Box<dyn Any + Send + Sync>,
}

/// Cache layer that manages caching logic and network fetching.
///
/// One instance is created at startup and cloned into every consumer; clones
/// share storage, in-flight requests and invalidation versions.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  inflight: Arc<Mutex<HashMap<String, InFlight>>>,
  /// Bumped on every invalidation of a resource
  versions: Arc<Mutex<HashMap<String, u64>>>,
  next_fetch_id: Arc<AtomicU64>,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
      inflight: Arc::new(Mutex::new(HashMap::new())),
      versions: Arc::new(Mutex::new(HashMap::new())),
      next_fetch_id: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_fresh(&self, entry: &CachedEntry) -> bool {
    !entry.stale && Utc::now() - entry.cached_at <= self.stale_time
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh cache entry: return it without touching the network
  /// 2. Otherwise join the key's in-flight fetch, or start one
  /// 3. On network failure, return the stale entry if there is one (offline mode)
  ///
  /// The fetch itself writes the cache, so every reader of a shared request
  /// sees the same stored result.
  pub async fn fetch<K, T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>, ApiError>
  where
    K: QueryKey,
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let cached = self.lookup::<T>(&hash);

    if let Some((data, entry)) = &cached {
      if self.is_fresh(entry) {
        debug!("cache hit: {}", key.description());
        return Ok(CacheResult::from_cache(data.clone(), entry.cached_at));
      }
    }

    let fetch = self.join_or_start(key, &hash, fetcher);
    match fetch.await {
      Ok(data) => Ok(CacheResult::from_network(data)),
      Err(e) if e.is_network() => match cached {
        Some((data, entry)) => {
          warn!("serving {} from cache while offline: {}", key.description(), e);
          Ok(CacheResult::offline(data, entry.cached_at))
        }
        None => Err(e),
      },
      Err(e) => Err(e),
    }
  }

  fn join_or_start<K, T, F, Fut>(&self, key: &K, hash: &str, fetcher: F) -> SharedFetch<T>
  where
    K: QueryKey,
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let mut inflight = lock(&self.inflight);

    if let Some(existing) = inflight
      .get(hash)
      .and_then(|f| f.future.downcast_ref::<SharedFetch<T>>())
    {
      debug!("joining in-flight fetch: {}", key.description());
      return existing.clone();
    }

    debug!("fetching: {}", key.description());
    let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
    let resource = key.resource().to_string();
    let started_at_version = self.version(&resource);

    let request = fetcher();
    let storage = Arc::clone(&self.storage);
    let versions = Arc::clone(&self.versions);
    let inflight_map = Arc::clone(&self.inflight);
    let hash_owned = hash.to_string();
    let resource_owned = resource.clone();

    let future: BoxFuture<'static, Result<T, ApiError>> = async move {
      let result = request.await;

      if let Ok(data) = &result {
        // Invalidated while in flight: keep the data but don't trust it
        let stale = current_version(&versions, &resource_owned) != started_at_version;
        match serde_json::to_value(data) {
          Ok(value) => {
            if let Err(e) = storage.put(&hash_owned, &resource_owned, &value, stale) {
              warn!("failed to store cache entry for {}: {}", resource_owned, e);
            }
          }
          Err(e) => warn!("failed to serialize {} for cache: {}", resource_owned, e),
        }
      }

      let mut inflight = lock(&inflight_map);
      if inflight.get(&hash_owned).map(|f| f.id) == Some(id) {
        inflight.remove(&hash_owned);
      }

      result
    }
    .boxed();

    let shared = future.shared();
    inflight.insert(
      hash.to_string(),
      InFlight {
        id,
        resource,
        future: Box::new(shared.clone()),
      },
    );
    shared
  }

  /// Read and decode a stored entry; storage problems count as a miss.
  fn lookup<T: Cacheable>(&self, hash: &str) -> Option<(T, CachedEntry)> {
    let entry = match self.storage.get(hash) {
      Ok(entry) => entry?,
      Err(e) => {
        warn!("cache read failed: {}", e);
        return None;
      }
    };
    match serde_json::from_value::<T>(entry.data.clone()) {
      Ok(data) => Some((data, entry)),
      Err(e) => {
        warn!("discarding undecodable cache entry: {}", e);
        None
      }
    }
  }

  /// Mark every cached query of `resource` stale.
  ///
  /// Pending fetches for the resource are detached so the next read starts a
  /// new request, and the resource version is bumped so mounted consumers
  /// know to refetch.
  pub fn invalidate(&self, resource: &str) {
    {
      let mut versions = lock(&self.versions);
      *versions.entry(resource.to_string()).or_insert(0) += 1;
    }
    lock(&self.inflight).retain(|_, f| f.resource != resource);

    match self.storage.mark_stale(resource) {
      Ok(count) => debug!("invalidated {} ({} entries)", resource, count),
      Err(e) => warn!("failed to invalidate {}: {}", resource, e),
    }
  }

  /// Current invalidation version of `resource`
  pub fn version(&self, resource: &str) -> u64 {
    current_version(&self.versions, resource)
  }

  /// Drop all cached data, e.g. when the session ends.
  pub fn clear(&self) {
    lock(&self.inflight).clear();
    {
      let mut versions = lock(&self.versions);
      for version in versions.values_mut() {
        *version += 1;
      }
    }
    if let Err(e) = self.storage.clear() {
      warn!("failed to clear cache: {}", e);
    }
  }

  /// Raw stored entry, for inspection
  #[cfg(test)]
  pub fn peek<K: QueryKey>(&self, key: &K) -> Option<Value> {
    self.storage.get(&key.cache_hash()).ok().flatten().map(|e| e.data)
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      inflight: Arc::clone(&self.inflight),
      versions: Arc::clone(&self.versions),
      next_fetch_id: Arc::clone(&self.next_fetch_id),
    }
  }
}

fn current_version(versions: &Mutex<HashMap<String, u64>>, resource: &str) -> u64 {
  lock(versions).get(resource).copied().unwrap_or(0)
}

/// Lock ignoring poisoning; the maps stay consistent between statements
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStorage;
  use crate::cache::{CacheSource, ResourceKey};
  use std::sync::atomic::AtomicU32;

  fn counting_fetcher(
    counter: &Arc<AtomicU32>,
    result: Result<Vec<u32>, ApiError>,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<u32>, ApiError>> {
    let counter = Arc::clone(counter);
    move || {
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        result
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_entry_is_served_without_network() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("estados");
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![1, 2])))
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![9])))
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("municipios");
    let calls = Arc::new(AtomicU32::new(0));

    let (a, b, c) = tokio::join!(
      cache.fetch(&key, counting_fetcher(&calls, Ok(vec![1]))),
      cache.fetch(&key, counting_fetcher(&calls, Ok(vec![2]))),
      cache.fetch(&key, counting_fetcher(&calls, Ok(vec![3]))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data, vec![1]);
    assert_eq!(b.unwrap().data, vec![1]);
    assert_eq!(c.unwrap().data, vec![1]);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch_and_bumps_version() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("comunas");
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![1])))
      .await
      .unwrap();
    assert_eq!(cache.version("comunas"), 0);

    cache.invalidate("comunas");
    assert_eq!(cache.version("comunas"), 1);
    assert_eq!(cache.version("proyectos"), 0);

    let refreshed = cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![1, 2])))
      .await
      .unwrap();
    assert_eq!(refreshed.source, CacheSource::Network);
    assert_eq!(refreshed.data, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_covers_all_keys_of_resource() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let all = ResourceKey::new("centros");
    let filtered = ResourceKey::new("centros").with_param("parroquia_id", "1");
    let other = ResourceKey::new("personal");
    let calls = Arc::new(AtomicU32::new(0));

    for key in [&all, &filtered, &other] {
      cache
        .fetch(key, counting_fetcher(&calls, Ok(vec![1])))
        .await
        .unwrap();
    }
    cache.invalidate("centros");

    for key in [&all, &filtered, &other] {
      cache
        .fetch(key, counting_fetcher(&calls, Ok(vec![1])))
        .await
        .unwrap();
    }
    // Both centros keys refetched, personal served from cache
    assert_eq!(calls.load(Ordering::SeqCst), 5);
  }

  #[tokio::test]
  async fn test_offline_serves_stale_entry() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("eventos");
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![7])))
      .await
      .unwrap();
    cache.invalidate("eventos");

    let offline = cache
      .fetch(
        &key,
        counting_fetcher(
          &calls,
          Err(ApiError::NetworkUnavailable("refused".to_string())),
        ),
      )
      .await
      .unwrap();
    assert!(offline.is_offline());
    assert_eq!(offline.data, vec![7]);
  }

  #[tokio::test]
  async fn test_server_errors_are_not_masked_by_stale_cache() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("eventos");
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![7])))
      .await
      .unwrap();
    cache.invalidate("eventos");

    let err = cache
      .fetch(
        &key,
        counting_fetcher(
          &calls,
          Err(ApiError::RequestFailed {
            status: 500,
            message: "boom".to_string(),
          }),
        ),
      )
      .await
      .unwrap_err();
    assert_eq!(err.status(), Some(500));
  }

  #[tokio::test]
  async fn test_miss_with_network_error_propagates() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicU32::new(0));
    let err = cache
      .fetch(
        &ResourceKey::new("roles"),
        counting_fetcher(&calls, Err(ApiError::NetworkUnavailable("down".to_string()))),
      )
      .await
      .unwrap_err();
    assert!(err.is_network());
  }

  #[tokio::test]
  async fn test_fetch_invalidated_in_flight_is_stored_stale() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("consejos");
    let calls = Arc::new(AtomicU32::new(0));

    let pending = cache.fetch(&key, counting_fetcher(&calls, Ok(vec![1])));
    let invalidate = async {
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
      cache.invalidate("consejos");
    };
    let (result, _) = tokio::join!(pending, invalidate);
    assert_eq!(result.unwrap().data, vec![1]);

    // The stored copy predates the invalidation, so the next read refetches
    let next = cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![1, 2])))
      .await
      .unwrap();
    assert_eq!(next.data, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_expired_stale_time_always_refetches() {
    let cache = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::seconds(-1));
    let key = ResourceKey::new("roles");
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
      cache
        .fetch(&key, counting_fetcher(&calls, Ok(vec![1])))
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_clear_drops_entries() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let key = ResourceKey::new("users");
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&key, counting_fetcher(&calls, Ok(vec![1])))
      .await
      .unwrap();
    assert!(cache.peek(&key).is_some());
    cache.clear();
    assert!(cache.peek(&key).is_none());
  }
}
