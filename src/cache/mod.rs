//! Offline-first local cache.
//!
//! This module provides the durable side of the engine:
//! - Explicit cache key resolution (inspection-scoped vs unit-scoped)
//! - JSON item lists and pending-delete sets over a host key-value store
//! - One-shot migration from the unit key to the inspection key once the
//!   remote store assigns an inspection identity

pub mod key;
pub mod kv;
pub mod migrate;
pub mod store;

pub use key::CacheKey;
pub use kv::{KvStore, SqliteKvStore};
pub use store::LocalCacheStore;
