//! Serde-deserializable types matching YNAB API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{
  Account, Budget, Category, CategoryDelta, CategoryGroup, GroupWithCategories, Payee, PayeeDelta,
  Transaction,
};

/// Every successful response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  pub data: T,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
  pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub detail: String,
}

// ============================================================================
// Budgets
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiBudget {
  pub id: String,
  pub name: String,
  pub last_modified_on: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiBudgetsData {
  #[serde(default)]
  pub budgets: Vec<ApiBudget>,
}

impl From<ApiBudget> for Budget {
  fn from(api: ApiBudget) -> Self {
    Budget {
      id: api.id,
      name: api.name,
      last_modified_on: api.last_modified_on,
    }
  }
}

// ============================================================================
// Payees
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPayee {
  pub id: String,
  pub name: String,
  pub transfer_account_id: Option<String>,
  #[serde(default)]
  pub deleted: bool,
}

impl From<ApiPayee> for Payee {
  fn from(api: ApiPayee) -> Self {
    Payee {
      id: api.id,
      name: api.name,
      transfer_account_id: api.transfer_account_id,
      deleted: api.deleted,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiPayeesData {
  #[serde(default)]
  pub payees: Vec<ApiPayee>,
  pub server_knowledge: i64,
}

impl From<ApiPayeesData> for PayeeDelta {
  fn from(api: ApiPayeesData) -> Self {
    PayeeDelta {
      payees: api.payees.into_iter().map(Payee::from).collect(),
      server_knowledge: api.server_knowledge,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSavePayeeData {
  pub payee: ApiPayee,
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCategory {
  pub id: String,
  #[serde(default)]
  pub category_group_id: String,
  #[serde(default)]
  pub category_group_name: String,
  pub name: String,
  #[serde(default)]
  pub hidden: bool,
  pub note: Option<String>,
  #[serde(default)]
  pub budgeted: i64,
  #[serde(default)]
  pub activity: i64,
  #[serde(default)]
  pub balance: i64,
  pub goal_type: Option<String>,
  pub goal_percentage_complete: Option<i32>,
  #[serde(default)]
  pub deleted: bool,
}

impl From<ApiCategory> for Category {
  fn from(api: ApiCategory) -> Self {
    Category {
      id: api.id,
      category_group_id: api.category_group_id,
      category_group_name: api.category_group_name,
      name: api.name,
      hidden: api.hidden,
      note: api.note,
      budgeted: api.budgeted,
      activity: api.activity,
      balance: api.balance,
      goal_type: api.goal_type,
      goal_percentage_complete: api.goal_percentage_complete,
      deleted: api.deleted,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiCategoryGroup {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub hidden: bool,
  #[serde(default)]
  pub deleted: bool,
  #[serde(default)]
  pub categories: Vec<ApiCategory>,
}

impl From<ApiCategoryGroup> for GroupWithCategories {
  fn from(api: ApiCategoryGroup) -> Self {
    GroupWithCategories {
      group: CategoryGroup {
        id: api.id,
        name: api.name,
        hidden: api.hidden,
        deleted: api.deleted,
      },
      categories: api.categories.into_iter().map(Category::from).collect(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiCategoriesData {
  #[serde(default)]
  pub category_groups: Vec<ApiCategoryGroup>,
  pub server_knowledge: i64,
}

impl From<ApiCategoriesData> for CategoryDelta {
  fn from(api: ApiCategoriesData) -> Self {
    CategoryDelta {
      groups: api
        .category_groups
        .into_iter()
        .map(GroupWithCategories::from)
        .collect(),
      server_knowledge: api.server_knowledge,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSaveCategoryData {
  pub category: ApiCategory,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiAccount {
  pub id: String,
  pub name: String,
  #[serde(rename = "type", default)]
  pub account_type: String,
  #[serde(default)]
  pub on_budget: bool,
  #[serde(default)]
  pub closed: bool,
  #[serde(default)]
  pub balance: i64,
  #[serde(default)]
  pub cleared_balance: i64,
  #[serde(default)]
  pub uncleared_balance: i64,
  #[serde(default)]
  pub deleted: bool,
}

impl From<ApiAccount> for Account {
  fn from(api: ApiAccount) -> Self {
    Account {
      id: api.id,
      name: api.name,
      account_type: api.account_type,
      on_budget: api.on_budget,
      closed: api.closed,
      balance: api.balance,
      cleared_balance: api.cleared_balance,
      uncleared_balance: api.uncleared_balance,
      deleted: api.deleted,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAccountsData {
  #[serde(default)]
  pub accounts: Vec<ApiAccount>,
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTransaction {
  pub id: String,
  pub date: NaiveDate,
  pub amount: i64,
  pub memo: Option<String>,
  #[serde(default)]
  pub cleared: String,
  #[serde(default)]
  pub approved: bool,
  #[serde(default)]
  pub account_name: String,
  pub payee_name: Option<String>,
  pub category_id: Option<String>,
  pub category_name: Option<String>,
  pub transfer_account_id: Option<String>,
  #[serde(default)]
  pub deleted: bool,
}

impl From<ApiTransaction> for Transaction {
  fn from(api: ApiTransaction) -> Self {
    Transaction {
      id: api.id,
      date: api.date,
      amount: api.amount,
      memo: api.memo,
      cleared: api.cleared,
      approved: api.approved,
      account_name: api.account_name,
      payee_name: api.payee_name,
      category_id: api.category_id,
      category_name: api.category_name,
      transfer_account_id: api.transfer_account_id,
      deleted: api.deleted,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiTransactionsData {
  #[serde(default)]
  pub transactions: Vec<ApiTransaction>,
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SavePayeeRequest<'a> {
  pub payee: SavePayee<'a>,
}

#[derive(Debug, Serialize)]
pub struct SavePayee<'a> {
  pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SaveMonthCategoryRequest {
  pub category: SaveMonthCategory,
}

#[derive(Debug, Serialize)]
pub struct SaveMonthCategory {
  pub budgeted: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_categories_delta() {
    let body = r#"{
      "data": {
        "category_groups": [
          {
            "id": "g1",
            "name": "Bills",
            "hidden": false,
            "deleted": false,
            "categories": [
              {
                "id": "c1",
                "category_group_id": "g1",
                "category_group_name": "Bills",
                "name": "Rent",
                "hidden": false,
                "note": null,
                "budgeted": 1200000,
                "activity": -1200000,
                "balance": 0,
                "goal_type": "NEED",
                "goal_percentage_complete": 100,
                "deleted": false
              }
            ]
          }
        ],
        "server_knowledge": 42
      }
    }"#;

    let response: ApiResponse<ApiCategoriesData> = serde_json::from_str(body).unwrap();
    let delta = CategoryDelta::from(response.data);

    assert_eq!(delta.server_knowledge, 42);
    assert_eq!(delta.groups.len(), 1);
    let rent = &delta.groups[0].categories[0];
    assert_eq!(rent.budgeted, 1_200_000);
    assert_eq!(rent.goal_type.as_deref(), Some("NEED"));
  }

  #[test]
  fn test_parse_payees_tolerates_missing_fields() {
    let body = r#"{"data": {"payees": [{"id": "p1", "name": "Amazon"}], "server_knowledge": 7}}"#;

    let response: ApiResponse<ApiPayeesData> = serde_json::from_str(body).unwrap();
    let delta = PayeeDelta::from(response.data);

    assert_eq!(delta.payees[0].transfer_account_id, None);
    assert!(!delta.payees[0].deleted);
  }

  #[test]
  fn test_parse_error() {
    let body = r#"{"error": {"id": "401", "name": "unauthorized", "detail": "Unauthorized"}}"#;

    let response: ApiErrorResponse = serde_json::from_str(body).unwrap();

    assert_eq!(response.error.id, "401");
    assert_eq!(response.error.detail, "Unauthorized");
  }
}
