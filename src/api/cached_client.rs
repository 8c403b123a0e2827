//! API client with transparent caching of collection reads.

use color_eyre::Result;
use serde_json::{Map, Value};
use tracing::info;

use crate::cache::{
  CacheLayer, CacheResult, MemoryStorage, NoopStorage, ResourceKey, SqliteStorage,
};
use crate::config::Config;
use crate::entity::{EntityKind, Record};

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{Credentials, RegisterRequest, User};

/// API client with transparent caching support.
///
/// Reads go through the shared `CacheLayer`; writes go straight to the
/// server and invalidate the entity's collection once the server accepted
/// them, so every screen showing it refetches.
#[derive(Clone)]
pub struct CachedApiClient {
  inner: ApiClient,
  cache: CacheLayer,
}

impl CachedApiClient {
  /// Create a client with the storage backend selected by the config.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = ApiClient::from_config(config)?;
    let stale_time = config.cache.stale_time()?;

    let cache = if !config.cache.enabled {
      CacheLayer::new(NoopStorage)
    } else if config.cache.persist {
      CacheLayer::new(SqliteStorage::open()?)
    } else {
      CacheLayer::new(MemoryStorage::new())
    };

    Ok(Self::with_cache(inner, cache.with_stale_time(stale_time)))
  }

  pub fn with_cache(inner: ApiClient, cache: CacheLayer) -> Self {
    Self { inner, cache }
  }

  pub fn api(&self) -> &ApiClient {
    &self.inner
  }

  /// Fetch a collection, served from cache while fresh.
  pub async fn list(&self, kind: EntityKind) -> Result<CacheResult<Vec<Record>>, ApiError> {
    let key = ResourceKey::from(kind);
    self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let key = key.clone();
        async move { inner.list_key(&key).await }
      })
      .await
  }

  /// Invalidation version of an entity's collection
  pub fn version(&self, kind: EntityKind) -> u64 {
    self.cache.version(kind.resource())
  }

  /// Mark an entity's collection stale so its readers refetch.
  pub fn invalidate(&self, kind: EntityKind) {
    self.cache.invalidate(kind.resource());
  }

  pub async fn create(&self, kind: EntityKind, payload: &Map<String, Value>) -> Result<Value, ApiError> {
    let created = self.inner.create(kind, payload).await?;
    info!("created {} record", kind.resource());
    self.invalidate(kind);
    Ok(created)
  }

  pub async fn update(
    &self,
    kind: EntityKind,
    id: i64,
    payload: &Map<String, Value>,
  ) -> Result<Value, ApiError> {
    let updated = self.inner.update(kind, id, payload).await?;
    info!("updated {} #{}", kind.resource(), id);
    self.invalidate(kind);
    Ok(updated)
  }

  pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<(), ApiError> {
    self.inner.delete(kind, id).await?;
    info!("deleted {} #{}", kind.resource(), id);
    self.invalidate(kind);
    Ok(())
  }

  pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
    let user = self.inner.login(credentials).await?;
    info!("signed in as {}", user.username);
    // Another account may see different data
    self.cache.clear();
    Ok(user)
  }

  pub async fn register(&self, user: &RegisterRequest) -> Result<(), ApiError> {
    self.inner.register(user).await?;
    info!("registered {}", user.username);
    Ok(())
  }

  /// End the session. Cached data is dropped even if the server call fails.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let result = self.inner.logout().await;
    self.cache.clear();
    info!("signed out");
    result
  }

  pub async fn current_user(&self) -> Option<User> {
    self.inner.current_user().await
  }
}
