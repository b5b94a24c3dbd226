//! Caching layer: TTL envelopes, the cache tier interface and the
//! cache-aside resolver that sits in front of the store and the catalogs

pub mod envelope;
pub mod resolver;
pub mod tier;

pub use envelope::{now_epoch_ms, CacheEnvelope};
pub use resolver::{CacheAsideResolver, ResolvePolicy, Resolved, ResolvedFrom, WriteBack};
pub use tier::{CacheTier, MemoryCache};
