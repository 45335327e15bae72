//! Category cache: category groups and their categories, synced together
//! under one cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::cache::{count_active, merge_records, seed_records, Cacheable, SyncStats, SyncedCache};

use super::types::{Category, CategoryDelta, CategoryGroup, GroupWithCategories};

impl Cacheable for CategoryGroup {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn is_deleted(&self) -> bool {
    self.deleted
  }

  fn is_active(&self) -> bool {
    !self.deleted && !self.hidden
  }
}

impl Cacheable for Category {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn is_deleted(&self) -> bool {
    self.deleted
  }

  fn is_active(&self) -> bool {
    !self.deleted && !self.hidden
  }
}

/// Change accounting for a category sync, groups and categories apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySyncStats {
  pub groups: SyncStats,
  pub categories: SyncStats,
}

/// Persisted category cache for one budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCache {
  pub server_knowledge: i64,
  pub last_synced: DateTime<Utc>,
  pub category_groups: Vec<CategoryGroup>,
  pub categories: Vec<Category>,
}

/// An active group with its active categories.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroupView<'a> {
  pub group: &'a CategoryGroup,
  pub categories: Vec<&'a Category>,
}

impl SyncedCache for CategoryCache {
  type Delta = CategoryDelta;
  type Stats = CategorySyncStats;

  fn record_name() -> &'static str {
    "categories"
  }

  fn server_knowledge(&self) -> i64 {
    self.server_knowledge
  }

  fn from_full(delta: CategoryDelta, now: DateTime<Utc>) -> (Self, CategorySyncStats) {
    let (groups, categories) = flatten(delta.groups);
    let (category_groups, mut group_stats) = seed_records(groups);
    let (mut categories, mut category_stats) = seed_records(categories);

    let names = group_names(&category_groups);
    for category in &mut categories {
      denormalize(category, &names);
    }

    group_stats.total = count_active(&category_groups);
    category_stats.total = count_active(&categories);

    let cache = Self {
      server_knowledge: delta.server_knowledge,
      last_synced: now,
      category_groups,
      categories,
    };
    let stats = CategorySyncStats {
      groups: group_stats,
      categories: category_stats,
    };
    (cache, stats)
  }

  fn apply(&mut self, delta: CategoryDelta, now: DateTime<Utc>) -> CategorySyncStats {
    let (groups, mut incoming) = flatten(delta.groups);
    let touched: HashSet<String> = groups.iter().map(|g| g.id.clone()).collect();

    // Groups first, so categories below see the merged names
    let mut group_stats = merge_records(&mut self.category_groups, groups);
    let names = group_names(&self.category_groups);

    for category in &mut self.categories {
      if touched.contains(&category.category_group_id) {
        denormalize(category, &names);
      }
    }
    for category in &mut incoming {
      denormalize(category, &names);
    }

    let mut category_stats = merge_records(&mut self.categories, incoming);

    group_stats.total = count_active(&self.category_groups);
    category_stats.total = count_active(&self.categories);

    self.server_knowledge = delta.server_knowledge;
    self.last_synced = now;

    CategorySyncStats {
      groups: group_stats,
      categories: category_stats,
    }
  }
}

impl CategoryCache {
  /// Categories that are neither deleted nor hidden.
  pub fn active(&self) -> Vec<&Category> {
    self.categories.iter().filter(|c| c.is_active()).collect()
  }

  /// Look up a category by id, including deleted and hidden ones.
  pub fn find_by_id(&self, id: &str) -> Option<&Category> {
    self.categories.iter().find(|c| c.id == id)
  }

  /// Active categories whose name or group name contains `query`, ignoring case.
  pub fn search(&self, query: &str) -> Vec<&Category> {
    let query = query.to_lowercase();
    self
      .categories
      .iter()
      .filter(|c| {
        c.is_active()
          && (c.name.to_lowercase().contains(&query)
            || c.category_group_name.to_lowercase().contains(&query))
      })
      .collect()
  }

  /// Active groups, each with its active categories, in cache order.
  pub fn grouped(&self) -> Vec<CategoryGroupView<'_>> {
    self
      .category_groups
      .iter()
      .filter(|g| g.is_active())
      .map(|group| CategoryGroupView {
        group,
        categories: self
          .categories
          .iter()
          .filter(|c| c.is_active() && c.category_group_id == group.id)
          .collect(),
      })
      .collect()
  }
}

/// Split the server's nested shape into group and category lists.
///
/// Categories default to the enclosing group for their group reference.
fn flatten(groups: Vec<GroupWithCategories>) -> (Vec<CategoryGroup>, Vec<Category>) {
  let mut flat_groups = Vec::with_capacity(groups.len());
  let mut flat_categories = Vec::new();

  for GroupWithCategories { group, categories } in groups {
    for mut category in categories {
      if category.category_group_id.is_empty() {
        category.category_group_id = group.id.clone();
      }
      if category.category_group_name.is_empty() {
        category.category_group_name = group.name.clone();
      }
      flat_categories.push(category);
    }
    flat_groups.push(group);
  }

  (flat_groups, flat_categories)
}

fn group_names(groups: &[CategoryGroup]) -> HashMap<&str, &str> {
  groups
    .iter()
    .map(|g| (g.id.as_str(), g.name.as_str()))
    .collect()
}

fn denormalize(category: &mut Category, names: &HashMap<&str, &str>) {
  if let Some(name) = names.get(category.category_group_id.as_str()) {
    category.category_group_name = name.to_string();
  }
}
