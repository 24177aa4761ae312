//! File-backed consignment cache

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{CacheTable, ConsignmentCache, PersistedRecord};
use crate::types::{ConsignmentId, LineItemId};

/// Cache persisted as a JSON file, one file per checkout
///
/// Survives process restarts; `clear()` removes the file when the checkout
/// session ends.
#[derive(Debug)]
pub struct FileConsignmentCache {
    path: PathBuf,
    table: Mutex<CacheTable>,
}

impl FileConsignmentCache {
    /// Open (or start) the cache file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }

        let table = if path.exists() {
            let contents = fs::read_to_string(&path).context("Failed to read cache file")?;
            serde_json::from_str(&contents).context("Failed to parse cache file")?
        } else {
            CacheTable::default()
        };

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table(&self) -> MutexGuard<'_, CacheTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, table: &CacheTable) -> Result<()> {
        let contents = serde_json::to_string_pretty(table)?;
        fs::write(&self.path, contents).context("Failed to write cache file")?;
        debug!(path = %self.path.display(), records = table.len(), "consignment cache saved");
        Ok(())
    }
}

impl ConsignmentCache for FileConsignmentCache {
    fn get_by_line_item(
        &self,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Option<PersistedRecord> {
        self.table().get_by_line_item(line_item_id, quantity).cloned()
    }

    fn get_by_consignment(&self, consignment_id: &ConsignmentId) -> Option<PersistedRecord> {
        self.table().get_by_consignment(consignment_id).cloned()
    }

    fn put(&self, record: PersistedRecord) -> Result<()> {
        let mut table = self.table();
        table.put(record);
        self.save(&table)
    }

    fn delete(&self, consignment_id: &ConsignmentId) -> Result<()> {
        let mut table = self.table();
        if table.delete(consignment_id).is_some() {
            self.save(&table)?;
        }
        Ok(())
    }

    fn records(&self) -> Vec<PersistedRecord> {
        self.table().records()
    }

    fn clear(&self) -> Result<()> {
        self.table().clear();
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove cache file")?;
        }
        Ok(())
    }
}
