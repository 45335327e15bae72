//! Predicate filtering over fetched transactions.

use chrono::NaiveDate;
use serde::Deserialize;

use super::types::Transaction;

/// Criteria for narrowing a transaction list. Unset fields match everything.
///
/// Text criteria are case-insensitive substring matches; amounts are
/// milliunits and bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionFilter {
  pub payee: Option<String>,
  pub category: Option<String>,
  pub memo: Option<String>,
  pub account: Option<String>,
  pub min_amount: Option<i64>,
  pub max_amount: Option<i64>,
  pub since: Option<NaiveDate>,
  pub until: Option<NaiveDate>,
  pub uncategorized_only: bool,
  pub unapproved_only: bool,
  pub include_deleted: bool,
}

impl TransactionFilter {
  pub fn matches(&self, txn: &Transaction) -> bool {
    if txn.deleted && !self.include_deleted {
      return false;
    }
    // Transfers carry no category but aren't awaiting one
    if self.uncategorized_only && (txn.category_id.is_some() || txn.transfer_account_id.is_some()) {
      return false;
    }
    if self.unapproved_only && txn.approved {
      return false;
    }
    if self.min_amount.is_some_and(|min| txn.amount < min) {
      return false;
    }
    if self.max_amount.is_some_and(|max| txn.amount > max) {
      return false;
    }
    if self.since.is_some_and(|since| txn.date < since) {
      return false;
    }
    if self.until.is_some_and(|until| txn.date > until) {
      return false;
    }

    contains(&self.payee, txn.payee_name.as_deref())
      && contains(&self.category, txn.category_name.as_deref())
      && contains(&self.memo, txn.memo.as_deref())
      && contains(&self.account, Some(txn.account_name.as_str()))
  }

  /// Matching transactions, newest first.
  pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
    let mut matched: Vec<&Transaction> = transactions.iter().filter(|t| self.matches(t)).collect();
    matched.sort_by(|a, b| b.date.cmp(&a.date));
    matched
  }
}

fn contains(needle: &Option<String>, haystack: Option<&str>) -> bool {
  match needle {
    None => true,
    Some(needle) => haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn txn(id: &str, date: &str, amount: i64, payee: &str, category: Option<&str>) -> Transaction {
    Transaction {
      id: id.to_string(),
      date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
      amount,
      memo: None,
      cleared: "cleared".to_string(),
      approved: true,
      account_name: "Checking".to_string(),
      payee_name: Some(payee.to_string()),
      category_id: category.map(|c| format!("{}-id", c)),
      category_name: category.map(String::from),
      transfer_account_id: None,
      deleted: false,
    }
  }

  fn sample() -> Vec<Transaction> {
    vec![
      txn("t1", "2024-03-01", -25_000, "Amazon", Some("Shopping")),
      txn("t2", "2024-03-05", -80_500, "Grocery Mart", Some("Groceries")),
      txn("t3", "2024-03-03", 2_000_000, "Employer", None),
      txn("t4", "2024-02-20", -12_000, "AMAZON Marketplace", Some("Shopping")),
    ]
  }

  fn ids(found: Vec<&Transaction>) -> Vec<&str> {
    found.into_iter().map(|t| t.id.as_str()).collect()
  }

  #[test]
  fn test_default_filter_matches_all_newest_first() {
    let all = sample();
    assert_eq!(
      ids(TransactionFilter::default().apply(&all)),
      vec!["t2", "t3", "t1", "t4"]
    );
  }

  #[test]
  fn test_payee_match_ignores_case() {
    let all = sample();
    let filter = TransactionFilter {
      payee: Some("amazon".to_string()),
      ..Default::default()
    };

    assert_eq!(ids(filter.apply(&all)), vec!["t1", "t4"]);
  }

  #[test]
  fn test_amount_and_date_bounds() {
    let all = sample();
    let filter = TransactionFilter {
      max_amount: Some(-20_000),
      since: NaiveDate::from_ymd_opt(2024, 3, 1),
      ..Default::default()
    };

    assert_eq!(ids(filter.apply(&all)), vec!["t2", "t1"]);
  }

  #[test]
  fn test_uncategorized_only() {
    let all = sample();
    let filter = TransactionFilter {
      uncategorized_only: true,
      ..Default::default()
    };

    assert_eq!(ids(filter.apply(&all)), vec!["t3"]);
  }

  #[test]
  fn test_deleted_hidden_unless_asked() {
    let mut all = sample();
    all[0].deleted = true;

    assert_eq!(TransactionFilter::default().apply(&all).len(), 3);
    let filter = TransactionFilter {
      include_deleted: true,
      ..Default::default()
    };
    assert_eq!(filter.apply(&all).len(), 4);
  }

  #[test]
  fn test_category_filter_skips_uncategorized() {
    let all = sample();
    let filter = TransactionFilter {
      category: Some("shop".to_string()),
      ..Default::default()
    };

    assert_eq!(ids(filter.apply(&all)), vec!["t1", "t4"]);
  }
}
