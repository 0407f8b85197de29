//! Template persistence.
//!
//! One [`TemplateStore`] is chosen at startup by [`open_store`] and shared for
//! the life of the process. Writes are last-write-wins per key.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::FormResult;
use crate::types::{Template, TemplateDraft};

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Short backend name reported by `/health`.
    fn backend(&self) -> &'static str;

    /// All templates, most recently updated first.
    async fn list(&self) -> FormResult<Vec<Template>>;

    async fn get(&self, key: &str) -> FormResult<Option<Template>>;

    /// Insert, or overwrite headers/rows/sourceFile keeping `createdAt`.
    async fn upsert(&self, draft: TemplateDraft) -> FormResult<Template>;

    /// [`upsert`](Self::upsert) every draft as one unit: either all are
    /// written or, on error, none are.
    async fn upsert_many(&self, drafts: Vec<TemplateDraft>) -> FormResult<Vec<Template>>;

    /// `Ok(false)` when the key did not exist.
    async fn remove(&self, key: &str) -> FormResult<bool>;
}

/// Where templates live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// SQLite database file; `None` keeps templates in memory.
    pub database: Option<PathBuf>,
}

/// Open the configured store, falling back to memory when SQLite is unusable.
pub fn open_store(config: &StorageConfig) -> Arc<dyn TemplateStore> {
    let Some(path) = &config.database else {
        info!("Using in-memory template store");
        return Arc::new(MemoryStore::new());
    };
    match SqliteStore::open(path) {
        Ok(store) => {
            info!("Using SQLite template store at {}", path.display());
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                "Database {} unavailable ({}), using in-memory template store",
                path.display(),
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

/// Timestamp for a write: now at microsecond precision, strictly after `previous`.
pub(crate) fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Newest `updatedAt` first; ties broken by key.
pub(crate) fn sort_newest_first(templates: &mut [Template]) {
    templates.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.key.cmp(&b.key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let future = Utc::now() + Duration::seconds(60);
        let next = next_timestamp(Some(future));
        assert!(next > future);
        assert_eq!(next - future, Duration::microseconds(1));

        let first = next_timestamp(None);
        assert_eq!(first, first.trunc_subsecs(6));
    }

    #[test]
    fn test_open_store_without_database_is_memory() {
        let store = open_store(&StorageConfig::default());
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn test_open_store_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&StorageConfig {
            database: Some(dir.path().join("missing").join("nested").join("t.db")),
        });
        assert_eq!(store.backend(), "memory");
    }
}
