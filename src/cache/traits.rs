//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Trait for records that can live in a delta-synced collection.
///
/// Implementors provide a stable identity and their tombstone state. Records
/// are never physically removed from a cache; a deleted record stays behind
/// as a tombstone so lookups can tell "deleted" apart from "never existed".
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this record within its collection.
  fn cache_key(&self) -> &str;

  /// Whether the remote service has marked this record deleted.
  fn is_deleted(&self) -> bool;

  /// Whether this record counts as active in listings and totals.
  fn is_active(&self) -> bool {
    !self.is_deleted()
  }
}

/// A persisted cache document that can be reconciled with a remote delta.
pub trait SyncedCache: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// One remote "list since cursor" response.
  type Delta: Send;
  /// Change accounting produced by a sync.
  type Stats: Clone + Send + std::fmt::Debug;

  /// Record name used by the store (e.g. "payees").
  fn record_name() -> &'static str;

  /// Cursor this cache was last synced at.
  fn server_knowledge(&self) -> i64;

  /// Build a fresh cache from a full (cursor-less) fetch.
  fn from_full(delta: Self::Delta, now: DateTime<Utc>) -> (Self, Self::Stats);

  /// Merge a delta into this cache, replacing its cursor and sync time.
  fn apply(&mut self, delta: Self::Delta, now: DateTime<Utc>) -> Self::Stats;
}

/// Change accounting for one collection after a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
  /// Records not previously cached
  pub new: usize,
  /// Cached records overwritten by the server's version
  pub updated: usize,
  /// Cached records that transitioned from live to deleted
  pub deleted: usize,
  /// Active records in the merged cache
  pub total: usize,
}

impl SyncStats {
  /// Whether the sync changed nothing.
  pub fn is_unchanged(&self) -> bool {
    self.new == 0 && self.updated == 0 && self.deleted == 0
  }
}

/// Result of a sync: the merged cache plus what changed.
#[derive(Debug, Clone)]
pub struct SyncOutcome<C: SyncedCache> {
  pub cache: C,
  pub stats: C::Stats,
  /// True when there was no usable cache and everything was fetched
  pub full_refresh: bool,
}
