//! Search result caching
//!
//! Completed searches are persisted through an [`ArtifactStore`] and reused
//! on later runs unless a rebuild is requested.

mod search_cache;
mod store;

pub use search_cache::{ArtifactKeys, CacheOutcome, CachePolicy, CacheStatus, SearchCache};
pub use store::{ArtifactStore, FileStore, MemoryStore};
