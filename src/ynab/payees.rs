//! Payee cache: a flat delta-synced list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{count_active, merge_records, seed_records, Cacheable, SyncStats, SyncedCache};

use super::types::{Payee, PayeeDelta};

impl Cacheable for Payee {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn is_deleted(&self) -> bool {
    self.deleted
  }
}

/// Persisted payee cache for one budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayeeCache {
  pub server_knowledge: i64,
  pub last_synced: DateTime<Utc>,
  pub payees: Vec<Payee>,
}

impl SyncedCache for PayeeCache {
  type Delta = PayeeDelta;
  type Stats = SyncStats;

  fn record_name() -> &'static str {
    "payees"
  }

  fn server_knowledge(&self) -> i64 {
    self.server_knowledge
  }

  fn from_full(delta: PayeeDelta, now: DateTime<Utc>) -> (Self, SyncStats) {
    let (payees, mut stats) = seed_records(delta.payees);
    stats.total = count_active(&payees);

    let cache = Self {
      server_knowledge: delta.server_knowledge,
      last_synced: now,
      payees,
    };
    (cache, stats)
  }

  fn apply(&mut self, delta: PayeeDelta, now: DateTime<Utc>) -> SyncStats {
    let mut stats = merge_records(&mut self.payees, delta.payees);
    stats.total = count_active(&self.payees);

    self.server_knowledge = delta.server_knowledge;
    self.last_synced = now;
    stats
  }
}

impl PayeeCache {
  /// Payees that have not been deleted.
  pub fn active(&self) -> Vec<&Payee> {
    self.payees.iter().filter(|p| p.is_active()).collect()
  }

  /// Look up a payee by id, including deleted ones.
  pub fn find_by_id(&self, id: &str) -> Option<&Payee> {
    self.payees.iter().find(|p| p.id == id)
  }

  /// Active payees whose name contains `query`, ignoring case.
  pub fn search(&self, query: &str) -> Vec<&Payee> {
    let query = query.to_lowercase();
    self
      .payees
      .iter()
      .filter(|p| p.is_active() && p.name.to_lowercase().contains(&query))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, JsonStore};
  use color_eyre::{eyre::eyre, Result};
  use std::cell::Cell;
  use tempfile::TempDir;

  fn payee(id: &str, name: &str, deleted: bool) -> Payee {
    Payee {
      id: id.to_string(),
      name: name.to_string(),
      transfer_account_id: None,
      deleted,
    }
  }

  fn delta(payees: Vec<Payee>, server_knowledge: i64) -> PayeeDelta {
    PayeeDelta {
      payees,
      server_knowledge,
    }
  }

  fn layer() -> (TempDir, CacheLayer) {
    let dir = TempDir::new().unwrap();
    let layer = CacheLayer::new(JsonStore::new(dir.path()));
    (dir, layer)
  }

  async fn sync(layer: &CacheLayer, ns: &str, d: PayeeDelta) -> (PayeeCache, SyncStats) {
    let outcome = layer
      .sync::<PayeeCache, _, _>(ns, |_| async move { Ok(d) })
      .await
      .unwrap();
    (outcome.cache, outcome.stats)
  }

  fn initial() -> PayeeDelta {
    delta(
      vec![
        payee("p1", "Amazon", false),
        payee("p2", "Grocery Mart", false),
        payee("p3", "Landlord", false),
      ],
      100,
    )
  }

  #[tokio::test]
  async fn test_first_sync_fetches_everything() {
    let (_dir, layer) = layer();

    let outcome = layer
      .sync::<PayeeCache, _, _>("B1", |since| async move {
        assert_eq!(since, None);
        Ok(initial())
      })
      .await
      .unwrap();

    assert!(outcome.full_refresh);
    assert_eq!(outcome.cache.payees.len(), 3);
    assert_eq!(outcome.cache.server_knowledge, 100);
    assert_eq!(
      outcome.stats,
      SyncStats {
        new: 3,
        updated: 0,
        deleted: 0,
        total: 3
      }
    );
  }

  #[tokio::test]
  async fn test_second_sync_passes_cursor() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    let outcome = layer
      .sync::<PayeeCache, _, _>("B1", |since| async move {
        assert_eq!(since, Some(100));
        Ok(delta(vec![], 100))
      })
      .await
      .unwrap();

    assert!(!outcome.full_refresh);
  }

  #[tokio::test]
  async fn test_deletion_keeps_tombstone() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    let (cache, stats) = sync(&layer, "B1", delta(vec![payee("p1", "Amazon", true)], 101)).await;

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.new, 0);
    assert_eq!(stats.total, 2);
    assert_eq!(cache.server_knowledge, 101);
    assert_eq!(cache.payees.len(), 3);

    let p1 = cache.find_by_id("p1").unwrap();
    assert!(p1.deleted);
    assert!(cache.active().iter().all(|p| p.id != "p1"));
  }

  #[tokio::test]
  async fn test_new_payee_appended() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    let (cache, stats) = sync(&layer, "B1", delta(vec![payee("p4", "Foo", false)], 102)).await;

    assert_eq!(cache.payees.len(), 4);
    assert_eq!(stats.new, 1);
    assert_eq!(stats.total, 4);
    assert_eq!(cache.payees[3].id, "p4");
  }

  #[tokio::test]
  async fn test_new_but_deleted_counts_as_new() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    let (cache, stats) = sync(&layer, "B1", delta(vec![payee("p9", "Gone", true)], 103)).await;

    assert_eq!(stats.new, 1);
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.total, 3);
    assert!(cache.find_by_id("p9").unwrap().deleted);
  }

  #[tokio::test]
  async fn test_empty_delta_is_noop() {
    let (_dir, layer) = layer();
    let (before, _) = sync(&layer, "B1", initial()).await;

    let (after, stats) = sync(&layer, "B1", delta(vec![], 100)).await;

    assert!(stats.is_unchanged());
    assert_eq!(stats.total, 3);
    assert_eq!(after.payees, before.payees);
    assert_eq!(after.server_knowledge, before.server_knowledge);
  }

  #[tokio::test]
  async fn test_update_replaces_record() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    let mut renamed = payee("p2", "Grocery Outlet", false);
    renamed.transfer_account_id = Some("acct".to_string());
    let (cache, stats) = sync(&layer, "B1", delta(vec![renamed.clone()], 104)).await;

    assert_eq!(stats.updated, 1);
    assert_eq!(cache.find_by_id("p2"), Some(&renamed));
    assert_eq!(cache.payees.iter().filter(|p| p.id == "p2").count(), 1);
  }

  #[tokio::test]
  async fn test_first_sync_skips_deleted() {
    let (_dir, layer) = layer();

    let (cache, stats) = sync(
      &layer,
      "B1",
      delta(
        vec![payee("p1", "A", false), payee("p2", "B", true)],
        50,
      ),
    )
    .await;

    assert_eq!(cache.payees.len(), 1);
    assert_eq!(stats.new, 1);
    assert_eq!(stats.total, 1);
  }

  #[tokio::test]
  async fn test_corrupt_cache_triggers_full_fetch() {
    let (dir, layer) = layer();
    let ns_dir = dir.path().join("budgets/B2");
    std::fs::create_dir_all(&ns_dir).unwrap();
    std::fs::write(ns_dir.join("payees.json"), "{\"server_knowledge\": ").unwrap();

    let outcome = layer
      .sync::<PayeeCache, _, _>("B2", |since| async move {
        assert_eq!(since, None);
        Ok(delta(
          vec![payee("p1", "A", false), payee("p2", "B", true), payee("p3", "C", false)],
          9,
        ))
      })
      .await
      .unwrap();

    assert!(outcome.full_refresh);
    assert_eq!(outcome.stats.new, 2);
    assert_eq!(layer.load::<PayeeCache>("B2"), Some(outcome.cache));
  }

  #[tokio::test]
  async fn test_fetch_error_leaves_cache_untouched() {
    let (_dir, layer) = layer();
    let (before, _) = sync(&layer, "B1", initial()).await;

    let result = layer
      .sync::<PayeeCache, _, _>("B1", |_| async { Err(eyre!("401 Unauthorized")) })
      .await;

    assert_eq!(result.unwrap_err().to_string(), "401 Unauthorized");
    assert_eq!(layer.load::<PayeeCache>("B1"), Some(before));
  }

  #[tokio::test]
  async fn test_save_failure_keeps_previous_cache() {
    let (dir, layer) = layer();
    let (before, _) = sync(&layer, "B1", initial()).await;
    std::fs::create_dir_all(dir.path().join("budgets/B1/payees.json.tmp")).unwrap();

    let result = layer
      .sync::<PayeeCache, _, _>("B1", |_| async {
        Ok(delta(vec![payee("p4", "Foo", false)], 101))
      })
      .await;

    assert!(result.is_err());
    assert_eq!(layer.load::<PayeeCache>("B1"), Some(before));
  }

  #[tokio::test]
  async fn test_first_sync_save_failure_leaves_no_cache() {
    let (dir, layer) = layer();
    std::fs::create_dir_all(dir.path().join("budgets/B1/payees.json")).unwrap();

    let result = layer
      .sync::<PayeeCache, _, _>("B1", |_| async { Ok(initial()) })
      .await;

    assert!(result.is_err());
    assert_eq!(layer.load::<PayeeCache>("B1"), None);
  }

  #[tokio::test]
  async fn test_first_sync_collapses_repeated_ids() {
    let (_dir, layer) = layer();

    let (cache, stats) = sync(
      &layer,
      "B1",
      delta(vec![payee("p1", "A", false), payee("p1", "B", false)], 10),
    )
    .await;

    assert_eq!(cache.payees, vec![payee("p1", "B", false)]);
    assert_eq!(stats.new, 1);
    assert_eq!(stats.total, 1);
  }

  #[tokio::test]
  async fn test_cursor_follows_each_response() {
    let (_dir, layer) = layer();
    let seen = Cell::new(None);

    for (i, cursor) in [100, 105, 105, 130].into_iter().enumerate() {
      let outcome = layer
        .sync::<PayeeCache, _, _>("B1", |since| {
          seen.set(since);
          async move {
            Ok(delta(
              vec![payee(&format!("p{}", i), "X", false)],
              cursor,
            ))
          }
        })
        .await
        .unwrap();
      assert_eq!(outcome.cache.server_knowledge, cursor);
    }

    assert_eq!(seen.get(), Some(105));
  }

  #[tokio::test]
  async fn test_concurrent_syncs_are_serialized() -> Result<()> {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    let a = layer.sync::<PayeeCache, _, _>("B1", |_| async {
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
      Ok(delta(vec![payee("a", "A", false)], 200))
    });
    let b = layer.sync::<PayeeCache, _, _>("B1", |_| async {
      Ok(delta(vec![payee("b", "B", false)], 201))
    });
    let (a, b) = tokio::join!(a, b);
    a?;
    b?;

    let cache = layer.load::<PayeeCache>("B1").unwrap();
    assert!(cache.find_by_id("a").is_some());
    assert!(cache.find_by_id("b").is_some());
    assert_eq!(cache.payees.len(), 5);
    Ok(())
  }

  #[tokio::test]
  async fn test_clear_removes_cache() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    layer.clear("B1").await.unwrap();

    assert_eq!(layer.load::<PayeeCache>("B1"), None);
  }

  #[tokio::test]
  async fn test_invalidate_forces_full_fetch() {
    let (_dir, layer) = layer();
    sync(&layer, "B1", initial()).await;

    assert!(layer.invalidate::<PayeeCache>("B1").await.unwrap());
    assert!(!layer.invalidate::<PayeeCache>("B1").await.unwrap());

    let outcome = layer
      .sync::<PayeeCache, _, _>("B1", |since| async move {
        assert_eq!(since, None);
        Ok(initial())
      })
      .await
      .unwrap();
    assert!(outcome.full_refresh);
    assert_eq!(outcome.stats.new, 3);
  }

  #[test]
  fn test_search_is_case_insensitive_and_skips_deleted() {
    let cache = PayeeCache {
      server_knowledge: 1,
      last_synced: Utc::now(),
      payees: vec![
        payee("p1", "Amazon", false),
        payee("p2", "amazon prime", false),
        payee("p3", "AMAZON old", true),
        payee("p4", "Costco", false),
      ],
    };

    let upper: Vec<&str> = cache.search("AMAZON").iter().map(|p| p.id.as_str()).collect();
    let lower: Vec<&str> = cache.search("amazon").iter().map(|p| p.id.as_str()).collect();

    assert_eq!(upper, vec!["p1", "p2"]);
    assert_eq!(upper, lower);
  }
}
