//! Item configuration model: per-entry wizard state plus the original order.

pub mod completion;
mod order;

pub use completion::{all_configured, first_unconfigured_index, is_configured, CompletionRules};
pub use order::OriginalOrder;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::{Address, Cart, Consignment, ConsignmentId, LineItemId, ShippingOption};

/// Identity of a configuration entry
///
/// Slot 0 is a line item shipped as a whole; slots 1..n are the single
/// quantity siblings produced by splitting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryKey {
    pub line_item_id: LineItemId,
    pub slot: u32,
}

impl EntryKey {
    pub fn whole(line_item_id: LineItemId) -> Self {
        Self {
            line_item_id,
            slot: 0,
        }
    }

    pub fn slot(line_item_id: LineItemId, slot: u32) -> Self {
        Self { line_item_id, slot }
    }

    pub fn is_split(&self) -> bool {
        self.slot > 0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_split() {
            write!(f, "{}#{}", self.line_item_id, self.slot)
        } else {
            write!(f, "{}", self.line_item_id)
        }
    }
}

/// Current wizard state of one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemConfigurationEntry {
    pub key: EntryKey,
    pub quantity: u32,
    pub consignment_id: Option<ConsignmentId>,
    pub shipping_address: Option<Address>,
    pub selected_shipping_option: Option<ShippingOption>,
    pub available_shipping_options: Vec<ShippingOption>,
    pub delivery_date: Option<String>,
    pub configured: bool,
}

impl ItemConfigurationEntry {
    pub fn empty(key: EntryKey, quantity: u32) -> Self {
        Self {
            key,
            quantity,
            consignment_id: None,
            shipping_address: None,
            selected_shipping_option: None,
            available_shipping_options: Vec::new(),
            delivery_date: None,
            configured: false,
        }
    }

    /// Entry populated from the consignment that covers it
    pub fn from_consignment(key: EntryKey, quantity: u32, consignment: &Consignment) -> Self {
        Self {
            key,
            quantity,
            consignment_id: Some(consignment.id.clone()),
            shipping_address: consignment.shipping_address.clone(),
            selected_shipping_option: consignment.selected_shipping_option.clone(),
            available_shipping_options: consignment.available_shipping_options.clone(),
            delivery_date: None,
            configured: false,
        }
    }

    pub fn line_item_id(&self) -> &LineItemId {
        &self.key.line_item_id
    }

    pub fn has_address_and_option(&self) -> bool {
        self.shipping_address.is_some() && self.selected_shipping_option.is_some()
    }

    /// Forget everything tied to the remote consignment
    pub fn reset(&mut self) {
        let key = self.key.clone();
        *self = Self::empty(key, self.quantity);
    }
}

/// Errors from structural model operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("no entry for {0}")]
    UnknownEntry(EntryKey),
    #[error("{0} cannot be split")]
    NotSplittable(EntryKey),
}

/// Mapping from entry identity to its configuration, plus the original order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemConfigurationModel {
    entries: HashMap<EntryKey, ItemConfigurationEntry>,
    order: OriginalOrder,
}

impl ItemConfigurationModel {
    /// One empty entry per cart line item, in cart order
    pub fn from_cart(cart: &Cart) -> Self {
        let order = OriginalOrder::capture(cart);
        let entries = cart
            .line_items
            .iter()
            .map(|item| {
                let key = EntryKey::whole(item.id.clone());
                (
                    key.clone(),
                    ItemConfigurationEntry::empty(key, item.quantity),
                )
            })
            .collect();
        Self { entries, order }
    }

    pub fn order(&self) -> &OriginalOrder {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EntryKey) -> Option<&ItemConfigurationEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &EntryKey) -> Option<&mut ItemConfigurationEntry> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in original order
    pub fn entries(&self) -> Vec<&ItemConfigurationEntry> {
        self.order
            .keys()
            .iter()
            .filter_map(|key| self.entries.get(key))
            .collect()
    }

    /// Entries of one line item, in original order
    pub fn entries_for(&self, line_item_id: &LineItemId) -> Vec<&ItemConfigurationEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.line_item_id() == line_item_id)
            .collect()
    }

    pub fn is_split(&self, line_item_id: &LineItemId) -> bool {
        self.entries
            .keys()
            .any(|k| &k.line_item_id == line_item_id && k.is_split())
    }

    /// Consignment ids claimed by entries other than `except`
    pub fn claimed_consignments(&self, except: Option<&EntryKey>) -> Vec<&ConsignmentId> {
        self.entries
            .values()
            .filter(|e| Some(&e.key) != except)
            .filter_map(|e| e.consignment_id.as_ref())
            .collect()
    }

    /// Replace the whole entry set, keeping the original order in sync
    ///
    /// `entries` must be given in layout order (cart order, slots ascending).
    pub fn replace_entries(&mut self, entries: Vec<ItemConfigurationEntry>) {
        let keys: Vec<EntryKey> = entries.iter().map(|e| e.key.clone()).collect();
        self.order.sync(&keys);
        self.entries = entries.into_iter().map(|e| (e.key.clone(), e)).collect();
    }

    /// Drop entries of line items that left the cart and add empty ones for new items
    pub fn ensure_line_items(&mut self, cart: &Cart) {
        let mut entries: Vec<ItemConfigurationEntry> = Vec::new();
        for item in &cart.line_items {
            let existing = self.entries_for(&item.id);
            if existing.is_empty() {
                entries.push(ItemConfigurationEntry::empty(
                    EntryKey::whole(item.id.clone()),
                    item.quantity,
                ));
            } else {
                entries.extend(existing.into_iter().cloned());
            }
        }
        self.replace_entries(entries);
    }

    /// Split a whole multi-quantity entry into single-quantity siblings
    ///
    /// The first sibling takes the entry's position; the rest are appended.
    pub fn split(&mut self, key: &EntryKey) -> Result<Vec<EntryKey>, ModelError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ModelError::UnknownEntry(key.clone()))?;
        if key.is_split() || entry.quantity < 2 {
            return Err(ModelError::NotSplittable(key.clone()));
        }

        let quantity = entry.quantity;
        let siblings: Vec<EntryKey> = (1..=quantity)
            .map(|slot| EntryKey::slot(key.line_item_id.clone(), slot))
            .collect();

        self.entries.remove(key);
        for sibling in &siblings {
            self.entries.insert(
                sibling.clone(),
                ItemConfigurationEntry::empty(sibling.clone(), 1),
            );
        }
        self.order.replace(key, &siblings);
        Ok(siblings)
    }

    /// Recompute every entry's delivery date and configured flag from the cart
    ///
    /// `skip` is left untouched (an entry being edited keeps its flag).
    pub fn refresh_configured(&mut self, cart: &Cart, rules: &CompletionRules, skip: Option<&EntryKey>) {
        for entry in self.entries.values_mut() {
            let line_item = cart.line_item(entry.line_item_id());
            entry.delivery_date = rules.delivery_date(line_item);
            if Some(&entry.key) == skip {
                continue;
            }
            entry.configured = is_configured(entry, line_item, rules);
        }
    }
}
