//! In-memory consignment cache

use anyhow::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CacheTable, ConsignmentCache, PersistedRecord};
use crate::types::{ConsignmentId, LineItemId};

/// Cache that lives as long as the process; used by tests and one-shot CLI runs
#[derive(Debug, Default)]
pub struct InMemoryConsignmentCache {
    table: Mutex<CacheTable>,
}

impl InMemoryConsignmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, CacheTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConsignmentCache for InMemoryConsignmentCache {
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
        self.table().put(record);
        Ok(())
    }

    fn delete(&self, consignment_id: &ConsignmentId) -> Result<()> {
        self.table().delete(consignment_id);
        Ok(())
    }

    fn records(&self) -> Vec<PersistedRecord> {
        self.table().records()
    }

    fn clear(&self) -> Result<()> {
        self.table().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn test_put_get_delete() {
        let cache = InMemoryConsignmentCache::new();
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-1"),
                LineItemId::from("li-1"),
                1,
                Address::default(),
                "opt-1",
            ))
            .unwrap();

        assert!(cache.get_by_consignment(&ConsignmentId::from("c-1")).is_some());
        assert!(cache.get_by_line_item(&LineItemId::from("li-1"), 1).is_some());

        cache.delete(&ConsignmentId::from("c-1")).unwrap();
        assert!(cache.records().is_empty());
    }
}
