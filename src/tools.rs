//! Tool dispatch: turns `{tool, args}` calls into client operations and
//! renders the results as text for the agent.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::fmt::Write as _;

use crate::cache::SyncStats;
use crate::commands::{self, get_suggestions};
use crate::ynab::cached_client::CachedYnabClient;
use crate::ynab::categories::{CategoryCache, CategorySyncStats};
use crate::ynab::payees::PayeeCache;
use crate::ynab::transactions::TransactionFilter;
use crate::ynab::types::{Account, Category, Payee, Transaction};

/// Default cap on listed rows
const DEFAULT_LIMIT: usize = 100;

/// One tool invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
  pub tool: String,
  #[serde(default)]
  pub args: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClearCacheArgs {
  budget_id: Option<String>,
  /// "payees" or "categories"; everything when unset
  kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AccountArgs {
  budget_id: Option<String>,
  include_closed: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListArgs {
  budget_id: Option<String>,
  query: Option<String>,
  /// Read the cache without syncing
  offline: bool,
  limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PayeeArgs {
  budget_id: Option<String>,
  payee_id: String,
}

#[derive(Debug, Deserialize)]
struct CategoryArgs {
  budget_id: Option<String>,
  category_id: String,
}

#[derive(Debug, Deserialize)]
struct RenamePayeeArgs {
  budget_id: Option<String>,
  payee_id: String,
  name: String,
}

#[derive(Debug, Deserialize)]
struct SetBudgetedArgs {
  budget_id: Option<String>,
  category_id: String,
  month: NaiveDate,
  /// Currency units, as a string or number ("12.34")
  amount: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransactionArgs {
  budget_id: Option<String>,
  limit: Option<usize>,
  #[serde(flatten)]
  filter: TransactionFilter,
}

/// Run a tool call and render its result.
pub async fn dispatch(
  client: &CachedYnabClient,
  default_budget: &str,
  call: &ToolCall,
) -> Result<String> {
  let tool = commands::find_tool(&call.tool).ok_or_else(|| unknown_tool(&call.tool))?;
  let budget = |id: Option<String>| id.unwrap_or_else(|| default_budget.to_string());

  match tool.name {
    "budgets" => {
      let budgets = client.list_budgets().await?;
      let mut out = String::new();
      for b in budgets {
        let _ = write!(out, "- {} ({})", b.name, b.id);
        if let Some(modified) = &b.last_modified_on {
          let _ = write!(out, " last modified {}", modified);
        }
        out.push('\n');
      }
      Ok(or_none(out, "No budgets found."))
    }
    "accounts" => {
      let args: AccountArgs = parse_args(&call.args)?;
      let accounts = client.list_accounts(&budget(args.budget_id)).await?;
      Ok(render_accounts(&accounts, args.include_closed))
    }
    "payees" => {
      let args: ListArgs = parse_args(&call.args)?;
      let budget_id = budget(args.budget_id);
      let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
      if args.offline {
        return Ok(match client.cached_payees(&budget_id) {
          Some(cache) => render_payees(&cache, args.query.as_deref(), limit),
          None => format!("No cached payees for budget {}.", budget_id),
        });
      }
      let outcome = client.sync_payees(&budget_id).await?;
      Ok(format!(
        "{}{}\n{}",
        render_sync("payees", &outcome.stats),
        refresh_note(outcome.full_refresh),
        render_payees(&outcome.cache, args.query.as_deref(), limit)
      ))
    }
    "payee" => {
      let args: PayeeArgs = parse_args(&call.args)?;
      let outcome = client.sync_payees(&budget(args.budget_id)).await?;
      Ok(match outcome.cache.find_by_id(&args.payee_id) {
        Some(payee) => render_payee(payee),
        None => format!("No payee with id {}.", args.payee_id),
      })
    }
    "categories" => {
      let args: ListArgs = parse_args(&call.args)?;
      let budget_id = budget(args.budget_id);
      let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
      if args.offline {
        return Ok(match client.cached_categories(&budget_id) {
          Some(cache) => render_categories(&cache, args.query.as_deref(), limit),
          None => format!("No cached categories for budget {}.", budget_id),
        });
      }
      let outcome = client.sync_categories(&budget_id).await?;
      Ok(format!(
        "{}{}\n{}",
        render_category_sync(&outcome.stats),
        refresh_note(outcome.full_refresh),
        render_categories(&outcome.cache, args.query.as_deref(), limit)
      ))
    }
    "category" => {
      let args: CategoryArgs = parse_args(&call.args)?;
      let outcome = client.sync_categories(&budget(args.budget_id)).await?;
      Ok(match outcome.cache.find_by_id(&args.category_id) {
        Some(category) => render_category(category),
        None => format!("No category with id {}.", args.category_id),
      })
    }
    "rename_payee" => {
      let args: RenamePayeeArgs = parse_args(&call.args)?;
      let outcome = client
        .rename_payee(&budget(args.budget_id), &args.payee_id, &args.name)
        .await?;
      Ok(match outcome.cache.find_by_id(&args.payee_id) {
        Some(payee) => format!("Renamed payee {} to {}.", payee.id, payee.name),
        None => format!("Renamed payee {} to {}.", args.payee_id, args.name),
      })
    }
    "set_budgeted" => {
      let args: SetBudgetedArgs = parse_args(&call.args)?;
      let amount = parse_amount(&amount_text(&args.amount)?)?;
      let outcome = client
        .set_category_budgeted(&budget(args.budget_id), args.month, &args.category_id, amount)
        .await?;
      let name = outcome
        .cache
        .find_by_id(&args.category_id)
        .map(|c| c.name.as_str())
        .unwrap_or(args.category_id.as_str());
      Ok(format!(
        "Assigned {} to {} for {}.",
        format_milliunits(amount),
        name,
        args.month.format("%B %Y")
      ))
    }
    "transactions" => {
      let args: TransactionArgs = parse_args(&call.args)?;
      let transactions = client
        .list_transactions(&budget(args.budget_id), args.filter.since)
        .await?;
      let matched = args.filter.apply(&transactions);
      Ok(render_transactions(&matched, args.limit.unwrap_or(DEFAULT_LIMIT)))
    }
    "clear_cache" => {
      let args: ClearCacheArgs = parse_args(&call.args)?;
      let budget_id = budget(args.budget_id);
      let existed = match args.kind.as_deref() {
        None => {
          client.clear_cache(&budget_id).await?;
          return Ok(format!("Cleared cache for budget {}.", budget_id));
        }
        Some("payees") => client.invalidate_payees(&budget_id).await?,
        Some("categories") => client.invalidate_categories(&budget_id).await?,
        Some(other) => {
          return Err(eyre!(
            "Unknown cache kind {:?}, expected payees or categories",
            other
          ))
        }
      };
      Ok(if existed {
        format!("Cleared cached {} for budget {}.", args.kind.unwrap_or_default(), budget_id)
      } else {
        format!("No cached {} for budget {}.", args.kind.unwrap_or_default(), budget_id)
      })
    }
    "rate_limit" => {
      let status = client.rate_limit()?;
      let mut out = format!(
        "{} of {} requests used this hour, {} remaining.",
        status.used,
        status.limit,
        status.remaining()
      );
      if let Some(resets) = status.resets_at {
        let _ = write!(out, " Oldest request expires at {}.", resets.format("%H:%M UTC"));
      }
      Ok(out)
    }
    other => Err(eyre!("Tool {} is registered but not implemented", other)),
  }
}

/// Render the tool registry.
pub fn render_tool_list() -> String {
  let mut out = String::new();
  for tool in commands::TOOLS {
    let _ = writeln!(out, "{} - {}", tool.name, tool.description);
    if !tool.args.is_empty() {
      let _ = writeln!(out, "    args: {}", tool.args);
    }
  }
  out
}

fn unknown_tool(name: &str) -> color_eyre::Report {
  let suggestions: Vec<&str> = get_suggestions(name).iter().map(|t| t.name).collect();
  if suggestions.is_empty() || name.is_empty() {
    eyre!("Unknown tool {:?}", name)
  } else {
    eyre!(
      "Unknown tool {:?}. Did you mean: {}?",
      name,
      suggestions.join(", ")
    )
  }
}

fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T> {
  let args = match args {
    Value::Null => Value::Object(Default::default()),
    other => other.clone(),
  };
  serde_json::from_value(args).map_err(|e| eyre!("Invalid arguments: {}", e))
}

fn or_none(out: String, empty: &str) -> String {
  if out.is_empty() {
    empty.to_string()
  } else {
    out
  }
}

/// Render milliunits as a currency amount, e.g. -12340 as "-12.34".
pub fn format_milliunits(milliunits: i64) -> String {
  // Round half away from zero to cents
  let cents = (milliunits.unsigned_abs() + 5) / 10;
  let sign = if milliunits < 0 && cents > 0 { "-" } else { "" };
  format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

/// Parse a currency amount ("12.34", "-5", "1,200.5") into milliunits.
pub fn parse_amount(text: &str) -> Result<i64> {
  let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
  let (negative, digits) = match cleaned.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, cleaned.as_str()),
  };
  let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

  let invalid = || eyre!("Invalid amount {:?}", text);
  if whole.is_empty() && frac.is_empty() {
    return Err(invalid());
  }
  if !whole.chars().all(|c| c.is_ascii_digit())
    || !frac.chars().all(|c| c.is_ascii_digit())
    || frac.len() > 3
  {
    return Err(invalid());
  }

  let whole: i64 = if whole.is_empty() {
    0
  } else {
    whole.parse().map_err(|_| invalid())?
  };
  let frac: i64 = format!("{:0<3}", frac).parse().map_err(|_| invalid())?;
  let milliunits = whole
    .checked_mul(1000)
    .and_then(|w| w.checked_add(frac))
    .ok_or_else(invalid)?;

  Ok(if negative { -milliunits } else { milliunits })
}

fn amount_text(value: &Value) -> Result<String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(eyre!("Invalid amount {}", other)),
  }
}

fn render_sync(what: &str, stats: &SyncStats) -> String {
  if stats.is_unchanged() {
    format!("{} active {} (no changes).", stats.total, what)
  } else {
    format!(
      "{} active {} ({} new, {} updated, {} deleted).",
      stats.total, what, stats.new, stats.updated, stats.deleted
    )
  }
}

fn refresh_note(full_refresh: bool) -> &'static str {
  if full_refresh {
    " Fetched the full list."
  } else {
    ""
  }
}

fn render_category_sync(stats: &CategorySyncStats) -> String {
  format!(
    "{} {}",
    render_sync("category groups", &stats.groups),
    render_sync("categories", &stats.categories)
  )
}

fn render_payee(payee: &Payee) -> String {
  let mut out = format!("{} ({})", payee.name, payee.id);
  if let Some(account) = &payee.transfer_account_id {
    let _ = write!(out, "\nTransfer payee for account {}", account);
  }
  if payee.deleted {
    out.push_str("\nThis payee has been deleted.");
  }
  out
}

fn render_payees(cache: &PayeeCache, query: Option<&str>, limit: usize) -> String {
  let payees = match query {
    Some(q) => cache.search(q),
    None => cache.active(),
  };
  if payees.is_empty() {
    return match query {
      Some(q) => format!("No payees matching {:?}.", q),
      None => "No payees.".to_string(),
    };
  }

  let mut out = String::new();
  for payee in payees.iter().take(limit) {
    let _ = writeln!(out, "- {} ({})", payee.name, payee.id);
  }
  if payees.len() > limit {
    let _ = writeln!(out, "... and {} more", payees.len() - limit);
  }
  out
}

fn render_category(category: &Category) -> String {
  let mut out = format!(
    "{} / {} ({})\nAssigned: {}  Activity: {}  Available: {}",
    category.category_group_name,
    category.name,
    category.id,
    format_milliunits(category.budgeted),
    format_milliunits(category.activity),
    format_milliunits(category.balance)
  );
  if let Some(goal) = &category.goal_type {
    let _ = write!(out, "\nGoal: {}", goal);
    if let Some(pct) = category.goal_percentage_complete {
      let _ = write!(out, " ({}% complete)", pct);
    }
  }
  if let Some(note) = category.note.as_deref().filter(|n| !n.is_empty()) {
    let _ = write!(out, "\nNote: {}", note);
  }
  if category.hidden {
    out.push_str("\nThis category is hidden.");
  }
  if category.deleted {
    out.push_str("\nThis category has been deleted.");
  }
  out
}

fn category_line(category: &Category) -> String {
  format!(
    "{} ({}): {} available",
    category.name,
    category.id,
    format_milliunits(category.balance)
  )
}

fn render_categories(cache: &CategoryCache, query: Option<&str>, limit: usize) -> String {
  let mut out = String::new();

  if let Some(q) = query {
    let found = cache.search(q);
    if found.is_empty() {
      return format!("No categories matching {:?}.", q);
    }
    for category in found.iter().take(limit) {
      let _ = writeln!(out, "- {} / {}", category.category_group_name, category_line(category));
    }
    if found.len() > limit {
      let _ = writeln!(out, "... and {} more", found.len() - limit);
    }
    return out;
  }

  let mut shown = 0;
  for view in cache.grouped() {
    if shown >= limit {
      break;
    }
    let _ = writeln!(out, "{}", view.group.name);
    for category in view.categories {
      if shown >= limit {
        break;
      }
      let _ = writeln!(out, "  - {}", category_line(category));
      shown += 1;
    }
  }
  or_none(out, "No categories.")
}

fn render_accounts(accounts: &[Account], include_closed: bool) -> String {
  let mut out = String::new();
  for account in accounts
    .iter()
    .filter(|a| !a.deleted && (include_closed || !a.closed))
  {
    let _ = write!(
      out,
      "- {} ({}) [{}{}]: {}",
      account.name,
      account.id,
      account.account_type,
      if account.on_budget { "" } else { ", tracking" },
      format_milliunits(account.balance)
    );
    if account.uncleared_balance != 0 {
      let _ = write!(
        out,
        " ({} cleared, {} uncleared)",
        format_milliunits(account.cleared_balance),
        format_milliunits(account.uncleared_balance)
      );
    }
    if account.closed {
      out.push_str(" (closed)");
    }
    out.push('\n');
  }
  or_none(out, "No accounts.")
}

fn render_transactions(transactions: &[&Transaction], limit: usize) -> String {
  if transactions.is_empty() {
    return "No matching transactions.".to_string();
  }

  let mut out = String::new();
  for txn in transactions.iter().take(limit) {
    let _ = write!(
      out,
      "- {} {} {} | {} | {}",
      txn.date.format("%Y-%m-%d"),
      format_milliunits(txn.amount),
      txn.payee_name.as_deref().unwrap_or("(no payee)"),
      txn.category_name.as_deref().unwrap_or("Uncategorized"),
      txn.account_name
    );
    if let Some(memo) = txn.memo.as_deref().filter(|m| !m.is_empty()) {
      let _ = write!(out, " | {}", memo);
    }
    if txn.cleared == "uncleared" {
      out.push_str(" (uncleared)");
    }
    if !txn.approved {
      out.push_str(" (unapproved)");
    }
    let _ = write!(out, " [{}]", txn.id);
    out.push('\n');
  }
  if transactions.len() > limit {
    let _ = writeln!(out, "... and {} more", transactions.len() - limit);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SyncedCache;
  use crate::ynab::types::{CategoryDelta, CategoryGroup, GroupWithCategories, PayeeDelta};
  use chrono::Utc;

  fn payee(id: &str, name: &str, deleted: bool) -> Payee {
    Payee {
      id: id.to_string(),
      name: name.to_string(),
      transfer_account_id: None,
      deleted,
    }
  }

  #[test]
  fn test_format_milliunits() {
    assert_eq!(format_milliunits(0), "0.00");
    assert_eq!(format_milliunits(12_340), "12.34");
    assert_eq!(format_milliunits(-12_340), "-12.34");
    assert_eq!(format_milliunits(1_005), "1.01");
    assert_eq!(format_milliunits(-4), "0.00");
  }

  #[test]
  fn test_parse_amount() {
    assert_eq!(parse_amount("12.34").unwrap(), 12_340);
    assert_eq!(parse_amount("-5").unwrap(), -5_000);
    assert_eq!(parse_amount("1,200.5").unwrap(), 1_200_500);
    assert_eq!(parse_amount(".25").unwrap(), 250);
    assert!(parse_amount("").is_err());
    assert!(parse_amount("abc").is_err());
    assert!(parse_amount("1.2345").is_err());
  }

  #[test]
  fn test_amount_text_accepts_numbers() {
    assert_eq!(amount_text(&serde_json::json!(12.5)).unwrap(), "12.5");
    assert_eq!(amount_text(&serde_json::json!("7")).unwrap(), "7");
    assert!(amount_text(&serde_json::json!(true)).is_err());
  }

  #[test]
  fn test_parse_args_null_means_defaults() {
    let args: ListArgs = parse_args(&Value::Null).unwrap();
    assert!(args.query.is_none());
    assert!(!args.offline);
  }

  #[test]
  fn test_parse_args_reports_missing_field() {
    let err = parse_args::<PayeeArgs>(&serde_json::json!({})).unwrap_err();
    assert!(err.to_string().contains("payee_id"));
  }

  #[test]
  fn test_transaction_args_flatten_filter() {
    let args: TransactionArgs = parse_args(&serde_json::json!({
      "payee": "amazon",
      "since": "2024-01-01",
      "limit": 5
    }))
    .unwrap();

    assert_eq!(args.limit, Some(5));
    assert_eq!(args.filter.payee.as_deref(), Some("amazon"));
    assert_eq!(args.filter.since, NaiveDate::from_ymd_opt(2024, 1, 1));
  }

  #[test]
  fn test_unknown_tool_suggests() {
    let err = unknown_tool("payee_list");
    assert!(err.to_string().starts_with("Unknown tool"));

    let err = unknown_tool("categ");
    assert!(err.to_string().contains("Did you mean: categories, category"));
  }

  #[test]
  fn test_render_payees_hides_deleted() {
    let (mut cache, _) = PayeeCache::from_full(
      PayeeDelta {
        payees: vec![payee("p1", "Amazon", false), payee("p2", "Costco", false)],
        server_knowledge: 1,
      },
      Utc::now(),
    );
    cache.payees[1].deleted = true;

    let out = render_payees(&cache, None, 10);
    assert!(out.contains("Amazon"));
    assert!(!out.contains("Costco"));

    assert_eq!(render_payees(&cache, Some("zzz"), 10), "No payees matching \"zzz\".");
  }

  #[test]
  fn test_render_payee_reports_tombstone() {
    let out = render_payee(&payee("p1", "Amazon", true));
    assert!(out.ends_with("This payee has been deleted."));
  }

  #[test]
  fn test_render_categories_grouped() {
    let category = Category {
      id: "c1".to_string(),
      category_group_id: "g1".to_string(),
      category_group_name: String::new(),
      name: "Rent".to_string(),
      hidden: false,
      note: None,
      budgeted: 1_000_000,
      activity: 0,
      balance: 1_000_000,
      goal_type: None,
      goal_percentage_complete: None,
      deleted: false,
    };
    let (cache, _) = CategoryCache::from_full(
      CategoryDelta {
        groups: vec![GroupWithCategories {
          group: CategoryGroup {
            id: "g1".to_string(),
            name: "Bills".to_string(),
            hidden: false,
            deleted: false,
          },
          categories: vec![category],
        }],
        server_knowledge: 1,
      },
      Utc::now(),
    );

    assert_eq!(
      render_categories(&cache, None, 10),
      "Bills\n  - Rent (c1): 1000.00 available\n"
    );
    assert_eq!(
      render_categories(&cache, Some("bills"), 10),
      "- Bills / Rent (c1): 1000.00 available\n"
    );
  }

  #[test]
  fn test_render_sync_summary() {
    let stats = SyncStats {
      new: 1,
      updated: 2,
      deleted: 0,
      total: 10,
    };
    assert_eq!(
      render_sync("payees", &stats),
      "10 active payees (1 new, 2 updated, 0 deleted)."
    );
    assert_eq!(
      render_sync("payees", &SyncStats::default()),
      "0 active payees (no changes)."
    );
  }
}
