//! Persistent delta-sync caching.
//!
//! This module provides a budget-agnostic caching mechanism that:
//! - Stores one JSON document per (namespace, record) on disk
//! - Reconciles a cache with a "list since cursor" remote call
//! - Counts new, updated and deleted records for every sync
//! - Treats a missing or corrupt cache as absent, forcing a full fetch

mod layer;
mod storage;
mod traits;

pub use layer::{count_active, merge_records, seed_records, CacheLayer};
pub use storage::JsonStore;
pub use traits::{Cacheable, SyncOutcome, SyncStats, SyncedCache};
