//! Cached YNAB client that keeps payees and categories in delta-synced caches.

use chrono::NaiveDate;
use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{CacheLayer, JsonStore, SyncOutcome};
use crate::config::Config;
use crate::rate_limit::{RateLimitStatus, RateLimiter};

use super::categories::CategoryCache;
use super::client::YnabClient;
use super::payees::PayeeCache;
use super::types::{Account, Budget, Transaction};

/// YNAB client with local caches for payees and categories.
///
/// Payee and category reads always go through a sync, so they cost one
/// small delta request once the cache exists. Writes go straight to the
/// server and are followed by a sync to pull the change back in.
#[derive(Clone)]
pub struct CachedYnabClient {
  inner: YnabClient,
  cache: CacheLayer,
  limiter: Arc<RateLimiter>,
}

impl CachedYnabClient {
  /// Create a new cached client, wiring the store and request ledger.
  pub fn new(config: &Config) -> Result<Self> {
    let store = JsonStore::new(config.cache_dir()?);
    let limiter = Arc::new(RateLimiter::load(
      store.clone(),
      config.rate_limit.max_requests_per_hour,
    ));
    let inner = YnabClient::new(config, Arc::clone(&limiter))?;
    let cache = CacheLayer::new(store);

    Ok(Self {
      inner,
      cache,
      limiter,
    })
  }

  /// Bring the payee cache up to date.
  pub async fn sync_payees(&self, budget_id: &str) -> Result<SyncOutcome<PayeeCache>> {
    self
      .cache
      .sync(budget_id, |since| {
        let inner = self.inner.clone();
        let budget_id = budget_id.to_string();
        async move { inner.list_payees(&budget_id, since).await }
      })
      .await
  }

  /// Bring the category cache up to date.
  pub async fn sync_categories(&self, budget_id: &str) -> Result<SyncOutcome<CategoryCache>> {
    self
      .cache
      .sync(budget_id, |since| {
        let inner = self.inner.clone();
        let budget_id = budget_id.to_string();
        async move { inner.list_categories(&budget_id, since).await }
      })
      .await
  }

  /// Cached categories without contacting the server.
  pub fn cached_categories(&self, budget_id: &str) -> Option<CategoryCache> {
    self.cache.load(budget_id)
  }

  /// Cached payees without contacting the server.
  pub fn cached_payees(&self, budget_id: &str) -> Option<PayeeCache> {
    self.cache.load(budget_id)
  }

  /// Drop one budget's payee cache; the next sync fetches everything.
  pub async fn invalidate_payees(&self, budget_id: &str) -> Result<bool> {
    self.cache.invalidate::<PayeeCache>(budget_id).await
  }

  /// Drop one budget's category cache; the next sync fetches everything.
  pub async fn invalidate_categories(&self, budget_id: &str) -> Result<bool> {
    self.cache.invalidate::<CategoryCache>(budget_id).await
  }

  /// Drop every cached document for a budget.
  pub async fn clear_cache(&self, budget_id: &str) -> Result<()> {
    self.cache.clear(budget_id).await
  }

  /// Rename a payee, then sync so the cache reflects it.
  pub async fn rename_payee(
    &self,
    budget_id: &str,
    payee_id: &str,
    name: &str,
  ) -> Result<SyncOutcome<PayeeCache>> {
    self.inner.rename_payee(budget_id, payee_id, name).await?;
    self.sync_payees(budget_id).await
  }

  /// Assign money to a category for a month, then sync categories.
  pub async fn set_category_budgeted(
    &self,
    budget_id: &str,
    month: NaiveDate,
    category_id: &str,
    budgeted: i64,
  ) -> Result<SyncOutcome<CategoryCache>> {
    self
      .inner
      .set_category_budgeted(budget_id, month, category_id, budgeted)
      .await?;
    self.sync_categories(budget_id).await
  }

  /// List budgets (not cached).
  pub async fn list_budgets(&self) -> Result<Vec<Budget>> {
    self.inner.list_budgets().await
  }

  /// List accounts (not cached - balances change with every transaction).
  pub async fn list_accounts(&self, budget_id: &str) -> Result<Vec<Account>> {
    self.inner.list_accounts(budget_id).await
  }

  /// List transactions (not cached).
  pub async fn list_transactions(
    &self,
    budget_id: &str,
    since_date: Option<NaiveDate>,
  ) -> Result<Vec<Transaction>> {
    self.inner.list_transactions(budget_id, since_date).await
  }

  pub fn rate_limit(&self) -> Result<RateLimitStatus> {
    self.limiter.status()
  }
}
