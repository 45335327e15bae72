/// Available tools and name resolution

#[derive(Debug, Clone)]
pub struct Tool {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Argument summary shown in the tool listing
  pub args: &'static str,
}

/// All available tools
pub const TOOLS: &[Tool] = &[
  Tool {
    name: "budgets",
    aliases: &["list_budgets"],
    description: "List budgets available to the access token",
    args: "",
  },
  Tool {
    name: "accounts",
    aliases: &["list_accounts"],
    description: "List open accounts with balances",
    args: "budget_id?, include_closed?",
  },
  Tool {
    name: "payees",
    aliases: &["list_payees", "search_payees"],
    description: "Sync and list active payees, optionally filtered by name",
    args: "budget_id?, query?, offline?",
  },
  Tool {
    name: "payee",
    aliases: &["get_payee"],
    description: "Look up one payee by id, including deleted payees",
    args: "budget_id?, payee_id",
  },
  Tool {
    name: "categories",
    aliases: &["list_categories", "search_categories"],
    description: "Sync and list active categories by group, optionally filtered",
    args: "budget_id?, query?, offline?",
  },
  Tool {
    name: "category",
    aliases: &["get_category"],
    description: "Look up one category by id, including deleted or hidden ones",
    args: "budget_id?, category_id",
  },
  Tool {
    name: "rename_payee",
    aliases: &["update_payee"],
    description: "Rename a payee and refresh the payee cache",
    args: "budget_id?, payee_id, name",
  },
  Tool {
    name: "set_budgeted",
    aliases: &["assign", "budget_category"],
    description: "Set a category's assigned amount for a month",
    args: "budget_id?, category_id, month (YYYY-MM-DD), amount",
  },
  Tool {
    name: "transactions",
    aliases: &["search_transactions", "list_transactions"],
    description: "Search transactions by payee, category, memo, amount or date",
    args: "budget_id?, payee?, category?, memo?, account?, min_amount?, max_amount?, since?, until?, uncategorized_only?, unapproved_only?, limit?",
  },
  Tool {
    name: "clear_cache",
    aliases: &["reset_cache"],
    description: "Delete cached payees and categories for a budget",
    args: "budget_id?, kind? (payees|categories)",
  },
  Tool {
    name: "rate_limit",
    aliases: &["requests", "quota"],
    description: "Show API requests used in the current hour",
    args: "",
  },
];

/// Find the tool registered under a name or alias
pub fn find_tool(name: &str) -> Option<&'static Tool> {
  let name = name.to_lowercase();
  TOOLS
    .iter()
    .find(|t| t.name == name || t.aliases.contains(&name.as_str()))
}

/// Tools a (possibly misspelled) name could refer to, best first.
///
/// A name or alias resolves to just that tool. Otherwise tools whose name or
/// an alias starts with the input rank ahead of those that merely contain it.
pub fn get_suggestions(input: &str) -> Vec<&'static Tool> {
  let input = input.to_lowercase();
  if input.is_empty() {
    return TOOLS.iter().collect();
  }
  if let Some(tool) = find_tool(&input) {
    return vec![tool];
  }

  let mut ranked: Vec<(&'static Tool, u8)> = TOOLS
    .iter()
    .filter_map(|tool| match_rank(tool, &input).map(|rank| (tool, rank)))
    .collect();
  ranked.sort_by_key(|(_, rank)| *rank);
  ranked.into_iter().map(|(tool, _)| tool).collect()
}

fn match_rank(tool: &Tool, input: &str) -> Option<u8> {
  let names = || std::iter::once(tool.name).chain(tool.aliases.iter().copied());
  if names().any(|n| n.starts_with(input)) {
    Some(0)
  } else if names().any(|n| n.contains(input)) {
    Some(1)
  } else {
    None
  }
}
