//! Cache layer that reconciles persisted caches with remote deltas.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::storage::JsonStore;
use super::traits::{Cacheable, SyncOutcome, SyncStats, SyncedCache};

/// Cache layer that manages delta syncs against a [`JsonStore`].
///
/// Syncs for the same namespace are serialized through a per-namespace
/// lock held from load through save, so a sync always observes the cache
/// left behind by the previous one. Different namespaces sync independently.
///
/// Locks are never evicted; the map holds one entry per budget this process
/// has touched.
pub struct CacheLayer {
  store: Arc<JsonStore>,
  locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(store: JsonStore) -> Self {
    Self {
      store: Arc::new(store),
      locks: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Load a cache without contacting the server.
  pub fn load<C: SyncedCache>(&self, namespace: &str) -> Option<C> {
    self.store.load(namespace, C::record_name())
  }

  /// Bring a namespace's cache up to date with the server.
  ///
  /// 1. Load the existing cache (missing or corrupt means none)
  /// 2. Ask the fetcher for changes since the cached cursor, or everything
  /// 3. Merge the delta into the cache
  /// 4. Persist and return the merged cache with change stats
  ///
  /// A fetcher error is returned as-is and nothing is written.
  pub async fn sync<C, F, Fut>(&self, namespace: &str, fetcher: F) -> Result<SyncOutcome<C>>
  where
    C: SyncedCache,
    F: FnOnce(Option<i64>) -> Fut,
    Fut: Future<Output = Result<C::Delta>>,
  {
    let lock = self.namespace_lock(namespace)?;
    let _guard = lock.lock().await;

    let existing: Option<C> = self.load(namespace);
    let since = existing.as_ref().map(|c| c.server_knowledge());
    debug!(
      "Syncing {} for {} since {:?}",
      C::record_name(),
      namespace,
      since
    );

    let delta = fetcher(since).await?;
    let now = Utc::now();

    let (cache, stats, full_refresh) = match existing {
      Some(mut cache) => {
        let stats = cache.apply(delta, now);
        (cache, stats, false)
      }
      None => {
        let (cache, stats) = C::from_full(delta, now);
        (cache, stats, true)
      }
    };

    self.store.save(namespace, C::record_name(), &cache)?;
    info!(
      "Synced {} for {} at {} ({:?})",
      C::record_name(),
      namespace,
      cache.server_knowledge(),
      stats
    );

    Ok(SyncOutcome {
      cache,
      stats,
      full_refresh,
    })
  }

  /// Delete one kind of cache for a namespace, forcing a full fetch next sync.
  /// Returns whether there was anything to delete.
  pub async fn invalidate<C: SyncedCache>(&self, namespace: &str) -> Result<bool> {
    let lock = self.namespace_lock(namespace)?;
    let _guard = lock.lock().await;

    self.store.delete_record(namespace, C::record_name())
  }

  /// Delete every cached document for a namespace.
  pub async fn clear(&self, namespace: &str) -> Result<()> {
    let lock = self.namespace_lock(namespace)?;
    let _guard = lock.lock().await;

    self.store.delete_namespace(namespace)?;
    info!("Cleared cache for {}", namespace);
    Ok(())
  }

  fn namespace_lock(&self, namespace: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
    let mut locks = self
      .locks
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(Arc::clone(locks.entry(namespace.to_string()).or_default()))
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      locks: Arc::clone(&self.locks),
    }
  }
}

/// Build a cache from a full fetch: one record per key (last one wins),
/// deleted records dropped. Every kept record is new.
pub fn seed_records<T: Cacheable>(incoming: Vec<T>) -> (Vec<T>, SyncStats) {
  let mut records = Vec::with_capacity(incoming.len());
  merge_records(&mut records, incoming);
  records.retain(|r| !r.is_deleted());
  let stats = SyncStats {
    new: records.len(),
    ..SyncStats::default()
  };
  (records, stats)
}

/// Merge a delta into cached records, upserting by key.
///
/// - unknown key: appended, counted as new (even when it arrives deleted,
///   since there is no prior state to transition from)
/// - live record now deleted: replaced, counted as deleted
/// - anything else: replaced wholesale with the server's version, counted as updated
///
/// `total` is left for the caller, which knows what "active" means after merge.
pub fn merge_records<T: Cacheable>(existing: &mut Vec<T>, incoming: Vec<T>) -> SyncStats {
  let mut index: HashMap<String, usize> = existing
    .iter()
    .enumerate()
    .map(|(i, r)| (r.cache_key().to_string(), i))
    .collect();
  let mut stats = SyncStats::default();

  for record in incoming {
    match index.get(record.cache_key()) {
      Some(&i) => {
        if record.is_deleted() && !existing[i].is_deleted() {
          stats.deleted += 1;
        } else {
          stats.updated += 1;
        }
        existing[i] = record;
      }
      None => {
        index.insert(record.cache_key().to_string(), existing.len());
        existing.push(record);
        stats.new += 1;
      }
    }
  }

  stats
}

/// Count records that are active after a merge.
pub fn count_active<T: Cacheable>(records: &[T]) -> usize {
  records.iter().filter(|r| r.is_active()).count()
}
