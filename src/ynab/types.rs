use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Budget summary
#[derive(Debug, Clone)]
pub struct Budget {
  pub id: String,
  pub name: String,
  pub last_modified_on: Option<String>,
}

/// Payee as cached locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
  pub id: String,
  pub name: String,
  pub transfer_account_id: Option<String>,
  pub deleted: bool,
}

/// Category group as cached locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
  pub id: String,
  pub name: String,
  pub hidden: bool,
  pub deleted: bool,
}

/// Category as cached locally. Money fields are milliunits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: String,
  pub category_group_id: String,
  /// Copied from the owning group at sync time
  pub category_group_name: String,
  pub name: String,
  pub hidden: bool,
  pub note: Option<String>,
  pub budgeted: i64,
  pub activity: i64,
  pub balance: i64,
  pub goal_type: Option<String>,
  pub goal_percentage_complete: Option<i32>,
  pub deleted: bool,
}

/// Account summary
#[derive(Debug, Clone)]
pub struct Account {
  pub id: String,
  pub name: String,
  pub account_type: String,
  pub on_budget: bool,
  pub closed: bool,
  pub balance: i64,
  pub cleared_balance: i64,
  pub uncleared_balance: i64,
  pub deleted: bool,
}

/// Transaction as returned by the server
#[derive(Debug, Clone)]
pub struct Transaction {
  pub id: String,
  pub date: NaiveDate,
  pub amount: i64,
  pub memo: Option<String>,
  pub cleared: String,
  pub approved: bool,
  pub account_name: String,
  pub payee_name: Option<String>,
  pub category_id: Option<String>,
  pub category_name: Option<String>,
  pub transfer_account_id: Option<String>,
  pub deleted: bool,
}

/// Payees changed since a cursor (or all of them, for a full fetch)
#[derive(Debug, Clone)]
pub struct PayeeDelta {
  pub payees: Vec<Payee>,
  pub server_knowledge: i64,
}

/// A category group together with the categories the server sent under it
#[derive(Debug, Clone)]
pub struct GroupWithCategories {
  pub group: CategoryGroup,
  pub categories: Vec<Category>,
}

/// Category groups and categories changed since a cursor
#[derive(Debug, Clone)]
pub struct CategoryDelta {
  pub groups: Vec<GroupWithCategories>,
  pub server_knowledge: i64,
}
