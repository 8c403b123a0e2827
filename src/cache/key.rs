//! Cache keys for REST collections.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::traits::QueryKey;
use crate::entity::EntityKind;

/// A REST resource path plus its query arguments.
///
/// Arguments are kept sorted so `?a=1&b=2` and `?b=2&a=1` share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
  resource: String,
  params: BTreeMap<String, String>,
}

impl ResourceKey {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: normalize(&resource.into()),
      params: BTreeMap::new(),
    }
  }

  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  /// Path relative to `/api/`, including the query string
  pub fn path(&self) -> String {
    if self.params.is_empty() {
      return self.resource.clone();
    }
    let query: Vec<String> = self
      .params
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    format!("{}?{}", self.resource, query.join("&"))
  }
}

impl From<EntityKind> for ResourceKey {
  fn from(kind: EntityKind) -> Self {
    ResourceKey::new(kind.resource())
  }
}

impl QueryKey for ResourceKey {
  fn cache_hash(&self) -> String {
    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(self.path().as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    format!("/api/{}", self.path())
  }

  fn resource(&self) -> &str {
    &self.resource
  }
}

/// Trim slashes and whitespace so `/estados/` and `estados` are the same key
fn normalize(resource: &str) -> String {
  resource.trim().trim_matches('/').to_lowercase()
}
