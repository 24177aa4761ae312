//! Local consignment cache.
//!
//! Mirrors every confirmed (address, shipping option) pair so consignments the
//! platform strips or evicts can be replayed. Records are keyed redundantly by
//! consignment id and by (line item id, quantity).

mod file;
mod memory;

pub use file::FileConsignmentCache;
pub use memory::InMemoryConsignmentCache;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Address, ConsignmentId, LineItemId};

/// A confirmed consignment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub consignment_id: ConsignmentId,
    pub line_item_id: LineItemId,
    pub quantity: u32,
    pub shipping_address: Address,
    pub selected_shipping_option_id: String,
    #[serde(default)]
    pub selected_delivery_date: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedRecord {
    pub fn new(
        consignment_id: ConsignmentId,
        line_item_id: LineItemId,
        quantity: u32,
        shipping_address: Address,
        selected_shipping_option_id: impl Into<String>,
    ) -> Self {
        Self {
            consignment_id,
            line_item_id,
            quantity,
            shipping_address,
            selected_shipping_option_id: selected_shipping_option_id.into(),
            selected_delivery_date: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_delivery_date(mut self, date: Option<String>) -> Self {
        self.selected_delivery_date = date;
        self
    }

    /// Whether the record carries an option that can be replayed
    pub fn is_replayable(&self) -> bool {
        !self.selected_shipping_option_id.trim().is_empty()
    }
}

/// Durable store of confirmed consignment configurations, scoped to one checkout session
pub trait ConsignmentCache: Send + Sync {
    /// Most recent record stored for a line item at a given quantity
    fn get_by_line_item(&self, line_item_id: &LineItemId, quantity: u32)
        -> Option<PersistedRecord>;

    fn get_by_consignment(&self, consignment_id: &ConsignmentId) -> Option<PersistedRecord>;

    /// Insert or replace the record for its consignment id
    fn put(&self, record: PersistedRecord) -> Result<()>;

    fn delete(&self, consignment_id: &ConsignmentId) -> Result<()>;

    /// All records, ordered by consignment id
    fn records(&self) -> Vec<PersistedRecord>;

    /// Drop every record (end of the checkout session)
    fn clear(&self) -> Result<()>;
}

fn line_item_key(line_item_id: &LineItemId, quantity: u32) -> String {
    format!("{}:{}", line_item_id, quantity)
}

/// Both indexes of the cache, shared by the in-memory and file implementations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheTable {
    #[serde(default)]
    records: BTreeMap<ConsignmentId, PersistedRecord>,
    /// "lineItemId:quantity" -> consignment id of the latest record
    #[serde(default)]
    by_line_item: BTreeMap<String, ConsignmentId>,
}

impl CacheTable {
    pub fn get_by_line_item(
        &self,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Option<&PersistedRecord> {
        self.by_line_item
            .get(&line_item_key(line_item_id, quantity))
            .and_then(|id| self.records.get(id))
    }

    pub fn get_by_consignment(&self, consignment_id: &ConsignmentId) -> Option<&PersistedRecord> {
        self.records.get(consignment_id)
    }

    pub fn put(&mut self, record: PersistedRecord) {
        // A consignment may have moved to a different line item key
        if let Some(previous) = self.records.get(&record.consignment_id) {
            let old_key = line_item_key(&previous.line_item_id, previous.quantity);
            if self.by_line_item.get(&old_key) == Some(&record.consignment_id) {
                self.by_line_item.remove(&old_key);
            }
        }

        self.by_line_item.insert(
            line_item_key(&record.line_item_id, record.quantity),
            record.consignment_id.clone(),
        );
        self.records.insert(record.consignment_id.clone(), record);
    }

    pub fn delete(&mut self, consignment_id: &ConsignmentId) -> Option<PersistedRecord> {
        let removed = self.records.remove(consignment_id)?;
        let key = line_item_key(&removed.line_item_id, removed.quantity);
        if self.by_line_item.get(&key) == Some(consignment_id) {
            self.by_line_item.remove(&key);
            // Fall back to the newest remaining record for the same key
            if let Some(next) = self
                .records
                .values()
                .filter(|r| r.line_item_id == removed.line_item_id && r.quantity == removed.quantity)
                .max_by_key(|r| r.updated_at)
            {
                self.by_line_item.insert(key, next.consignment_id.clone());
            }
        }
        Some(removed)
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_line_item.clear();
    }
}
