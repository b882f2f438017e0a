//! MixScore reference store
//!
//! Reads per-genre reference documents from disk, resolves them with
//! `mq-score` and keeps the resolved form in a content-hash validated cache.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mq_refstore::ReferenceStore;
//!
//! let store = ReferenceStore::new("refs/").with_fallback_bundle("refs/bundle.json");
//! let pop = store.load("Pop")?; // refs/pop.json
//! ```

mod cache;
mod error;
mod store;

pub use cache::{CacheStats, DEFAULT_CAPACITY, ReferenceCache};
pub use error::{StoreError, StoreResult};
pub use store::ReferenceStore;
