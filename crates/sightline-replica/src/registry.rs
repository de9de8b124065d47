//! Service registry
//!
//! Replicas publish their address under `<prefix>/<id>`; clients and peers
//! list the children of the prefix to find each other.
//!
//! # Implementations
//!
//! - [`MemoryRegistry`]: shared map for tests and single-process setups
//! - [`FileRegistry`]: one JSON file per entry in a shared directory, so
//!   several processes on one host can discover each other

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sightline_core::{ReplicaId, Result, SightlineError};

/// One published replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Full registry path, `<prefix>/<id>`
    pub path: String,
    /// Transport address
    pub address: String,
}

impl RegistryEntry {
    /// Pair a path with an address
    pub fn new(path: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            address: address.into(),
        }
    }

    /// Replica id encoded in the last path segment
    pub fn replica_id(&self) -> Result<ReplicaId> {
        self.path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .parse()
    }
}

/// Name service used for discovery
#[async_trait]
pub trait Registry: Send + Sync {
    /// Bind `path` to `address`, replacing any previous binding
    async fn publish(&self, path: &str, address: &str) -> Result<()>;

    /// Remove the binding for `path`. Removing an absent path is not an
    /// error.
    async fn unpublish(&self, path: &str) -> Result<()>;

    /// Address bound to `path`
    async fn lookup(&self, path: &str) -> Result<String>;

    /// Every entry directly under `prefix`, ordered by path
    async fn list_children(&self, prefix: &str) -> Result<Vec<RegistryEntry>>;
}

fn is_child_of(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|leaf| !leaf.is_empty() && !leaf.contains('/'))
}

fn check_path(path: &str) -> Result<()> {
    if path.trim_matches('/').is_empty() {
        return Err(SightlineError::invalid_argument("registry path must not be blank"));
    }
    Ok(())
}

// =============================================================================
// In-memory registry
// =============================================================================

/// Registry backed by a shared in-memory map. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn publish(&self, path: &str, address: &str) -> Result<()> {
        check_path(path)?;
        self.entries
            .write()
            .insert(path.to_string(), address.to_string());
        Ok(())
    }

    async fn unpublish(&self, path: &str) -> Result<()> {
        self.entries.write().remove(path);
        Ok(())
    }

    async fn lookup(&self, path: &str) -> Result<String> {
        self.entries
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| SightlineError::not_found(format!("no registry entry at '{path}'")))
    }

    async fn list_children(&self, prefix: &str) -> Result<Vec<RegistryEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|(path, _)| is_child_of(path, prefix))
            .map(|(path, address)| RegistryEntry::new(path.clone(), address.clone()))
            .collect())
    }
}

// =============================================================================
// Directory-backed registry
// =============================================================================

/// Registry stored as JSON files in a directory
#[derive(Debug, Clone)]
pub struct FileRegistry {
    dir: PathBuf,
}

impl FileRegistry {
    /// Use `dir`, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Directory holding the entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_file(&self, path: &str) -> PathBuf {
        let name: String = path
            .trim_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    async fn read_entry(file: &Path) -> Result<RegistryEntry> {
        let bytes = tokio::fs::read(file).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SightlineError::internal(format!("corrupt registry entry {}: {e}", file.display()))
        })
    }
}

#[async_trait]
impl Registry for FileRegistry {
    async fn publish(&self, path: &str, address: &str) -> Result<()> {
        check_path(path)?;
        let entry = RegistryEntry::new(path, address);
        let bytes = serde_json::to_vec_pretty(&entry)
            .map_err(|e| SightlineError::internal(format!("encode registry entry: {e}")))?;

        // Write then rename so readers never see a partial file.
        let target = self.entry_file(path);
        let staging = target.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await?;
        debug!(path = %path, address = %address, "Published registry entry");
        Ok(())
    }

    async fn unpublish(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_file(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, path: &str) -> Result<String> {
        match Self::read_entry(&self.entry_file(path)).await {
            Ok(entry) if entry.path == path => Ok(entry.address),
            Ok(_) | Err(SightlineError::NotFound { .. }) => Err(SightlineError::not_found(
                format!("no registry entry at '{path}'"),
            )),
            Err(e) => Err(e),
        }
    }

    async fn list_children(&self, prefix: &str) -> Result<Vec<RegistryEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let file = item.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_entry(&file).await {
                Ok(entry) if is_child_of(&entry.path, prefix) => entries.push(entry),
                Ok(_) => {}
                // Unpublished between listing and reading.
                Err(SightlineError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}
