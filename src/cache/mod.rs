//! HTTP response cache.
//!
//! This module provides a best-effort caching transport that:
//! - Keys responses by method, URL and request headers
//! - Stores them in SQLite or as one file per key, each with a TTL
//! - Serves fresh entries without touching the network
//! - Never fails a request because the cache is unavailable

mod file;
mod layer;
mod policy;
mod storage;
mod traits;

pub use layer::CacheTransport;
pub use policy::CachePolicy;
pub use storage::CacheBackend;
