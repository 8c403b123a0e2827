//! Generic caching layer for REST collections.
//!
//! This module provides a backend-agnostic cache that:
//! - Keys entries by resource path plus sorted query arguments
//! - Shares one in-flight request between concurrent readers of a key
//! - Invalidates per resource, bumping a version counter consumers can watch
//! - Provides basic offline mode (serve stale cache when network unavailable)

mod key;
mod layer;
mod storage;
mod traits;

pub use key::ResourceKey;
pub use layer::CacheLayer;
pub use storage::{CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, QueryKey};
