//! JSON document storage, namespaced by budget.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory under the root that holds one subdirectory per namespace.
const NAMESPACES_DIR: &str = "budgets";

/// File-backed store of pretty-printed JSON documents.
///
/// Namespaced records live at `<root>/budgets/<namespace>/<record>.json`,
/// global records at `<root>/<record>.json`. There is no locking here;
/// callers that need serialized access per namespace get it from
/// [`CacheLayer`](super::CacheLayer).
#[derive(Debug, Clone)]
pub struct JsonStore {
  root: PathBuf,
}

impl JsonStore {
  /// Create a store rooted at the given directory. Nothing is created on disk yet.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the default cache root.
  pub fn default_root() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("ynab-agent"))
  }

  /// Create (if needed) and return the directory for a namespace.
  pub fn ensure_namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
    let dir = self.namespace_dir(namespace)?;
    std::fs::create_dir_all(&dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;
    Ok(dir)
  }

  /// Load a namespaced record.
  ///
  /// A missing, unreadable or unparsable document is reported as `None`:
  /// the cache can always be rebuilt from the server, so it is never fatal.
  pub fn load<T: DeserializeOwned>(&self, namespace: &str, record: &str) -> Option<T> {
    let path = match self.namespace_dir(namespace) {
      Ok(dir) => dir.join(file_name(record)),
      Err(e) => {
        warn!("Not loading {} cache: {}", record, e);
        return None;
      }
    };
    read_document(&path)
  }

  /// Replace a namespaced record with `value`.
  pub fn save<T: Serialize>(&self, namespace: &str, record: &str, value: &T) -> Result<()> {
    let dir = self.ensure_namespace_dir(namespace)?;
    write_document(&dir.join(file_name(record)), value)
  }

  /// Remove one namespaced record. Returns whether it existed.
  pub fn delete_record(&self, namespace: &str, record: &str) -> Result<bool> {
    let path = self.namespace_dir(namespace)?.join(file_name(record));
    match std::fs::remove_file(&path) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(eyre!("Failed to delete {}: {}", path.display(), e)),
    }
  }

  /// Remove every record in a namespace.
  pub fn delete_namespace(&self, namespace: &str) -> Result<()> {
    let dir = self.namespace_dir(namespace)?;
    match std::fs::remove_dir_all(&dir) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!("Failed to delete {}: {}", dir.display(), e)),
    }
  }

  /// Load a record that is not scoped to any namespace.
  pub fn load_global<T: DeserializeOwned>(&self, record: &str) -> Option<T> {
    read_document(&self.root.join(file_name(record)))
  }

  /// Replace a record that is not scoped to any namespace.
  pub fn save_global<T: Serialize>(&self, record: &str, value: &T) -> Result<()> {
    std::fs::create_dir_all(&self.root).map_err(|e| {
      eyre!(
        "Failed to create cache directory {}: {}",
        self.root.display(),
        e
      )
    })?;
    write_document(&self.root.join(file_name(record)), value)
  }

  fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
    validate_namespace(namespace)?;
    Ok(self.root.join(NAMESPACES_DIR).join(namespace))
  }
}

/// Namespaces become directory names, so they must be a single path component.
fn validate_namespace(namespace: &str) -> Result<()> {
  if namespace.is_empty()
    || namespace == "."
    || namespace == ".."
    || namespace.contains(['/', '\\'])
  {
    return Err(eyre!("Invalid budget id: {:?}", namespace));
  }
  Ok(())
}

fn file_name(record: &str) -> String {
  format!("{}.json", record)
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
  let bytes = match std::fs::read(path) {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      debug!("No cache document at {}", path.display());
      return None;
    }
    Err(e) => {
      warn!("Failed to read cache document {}: {}", path.display(), e);
      return None;
    }
  };

  match serde_json::from_slice(&bytes) {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(
        "Ignoring corrupt cache document {}: {}",
        path.display(),
        e
      );
      None
    }
  }
}

/// Write to a sibling temp file and rename it over the target, so readers
/// see either the old document or the new one.
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  let data = serde_json::to_vec_pretty(value)
    .map_err(|e| eyre!("Failed to serialize {}: {}", path.display(), e))?;

  let tmp = path.with_extension("json.tmp");
  std::fs::write(&tmp, data).map_err(|e| eyre!("Failed to write {}: {}", tmp.display(), e))?;
  if let Err(e) = std::fs::rename(&tmp, path) {
    let _ = std::fs::remove_file(&tmp);
    return Err(eyre!("Failed to replace {}: {}", path.display(), e));
  }

  Ok(())
}
