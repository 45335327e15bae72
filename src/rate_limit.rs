//! Accounting for requests made against the API's hourly limit.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::JsonStore;

/// Global record holding the ledger.
const LEDGER_RECORD: &str = "rate_limit";

/// Default number of requests the API allows per rolling hour.
pub const DEFAULT_MAX_REQUESTS_PER_HOUR: usize = 200;

/// Timestamps of requests made in the last hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestLedger {
  requests: Vec<DateTime<Utc>>,
}

impl RequestLedger {
  fn window() -> Duration {
    Duration::hours(1)
  }

  /// Forget requests that fell out of the window.
  pub fn prune(&mut self, now: DateTime<Utc>) {
    let cutoff = now - Self::window();
    self.requests.retain(|t| *t > cutoff);
  }

  pub fn record(&mut self, now: DateTime<Utc>) {
    self.prune(now);
    self.requests.push(now);
  }

  /// Requests made within the window ending at `now`.
  pub fn used(&self, now: DateTime<Utc>) -> usize {
    let cutoff = now - Self::window();
    self.requests.iter().filter(|t| **t > cutoff).count()
  }

  /// When the oldest request in the window expires.
  pub fn resets_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let cutoff = now - Self::window();
    self
      .requests
      .iter()
      .filter(|t| **t > cutoff)
      .min()
      .map(|t| *t + Self::window())
  }
}

/// Snapshot of the ledger for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
  pub used: usize,
  pub limit: usize,
  pub resets_at: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
  pub fn remaining(&self) -> usize {
    self.limit.saturating_sub(self.used)
  }
}

/// Process-wide request accounting, persisted alongside the caches.
pub struct RateLimiter {
  store: JsonStore,
  limit: usize,
  ledger: Mutex<RequestLedger>,
}

impl RateLimiter {
  /// Load the persisted ledger, starting empty if there is none.
  pub fn load(store: JsonStore, limit: usize) -> Self {
    let ledger = store.load_global(LEDGER_RECORD).unwrap_or_default();
    Self {
      store,
      limit,
      ledger: Mutex::new(ledger),
    }
  }

  /// Account for one outgoing request, or fail if the hourly limit is used up.
  pub fn acquire(&self) -> Result<()> {
    let now = Utc::now();
    let mut ledger = self
      .ledger
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if ledger.used(now) >= self.limit {
      let resets = ledger
        .resets_at(now)
        .map(|t| t.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "soon".to_string());
      return Err(eyre!(
        "Rate limit of {} requests per hour reached; resets at {}",
        self.limit,
        resets
      ));
    }

    ledger.record(now);
    debug!("Request {}/{} this hour", ledger.used(now), self.limit);

    // Ledger write failures never fail the request itself
    if let Err(e) = self.store.save_global(LEDGER_RECORD, &*ledger) {
      warn!("Failed to persist request ledger: {}", e);
    }
    Ok(())
  }

  pub fn status(&self) -> Result<RateLimitStatus> {
    let now = Utc::now();
    let ledger = self
      .ledger
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(RateLimitStatus {
      used: ledger.used(now),
      limit: self.limit,
      resets_at: ledger.resets_at(now),
    })
  }
}
