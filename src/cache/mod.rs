//! Cache layer.
//!
//! A best-effort key/value capability injected into the components that
//! memoize work: the analysis service (themes, patterns) and the retry
//! controller (validated extractions).

pub mod cache_handler;
pub mod file_cache;

pub use cache_handler::{cache_key, read_through, write_through, CacheLayer, InMemoryCache, NoopCache};
pub use file_cache::FileCache;
