//! Entry layout from a consignment snapshot, and precedence merge

use std::collections::{HashSet, VecDeque};

use crate::model::{
    is_configured, CompletionRules, EntryKey, ItemConfigurationEntry, ItemConfigurationModel,
};
use crate::types::{Cart, Consignment, ConsignmentId, LineItem, LineItemId};

/// Hands out split slot keys: freed existing slots first, then fresh numbers
struct SlotAllocator {
    line_item_id: LineItemId,
    free: VecDeque<EntryKey>,
    next_slot: u32,
}

impl SlotAllocator {
    fn new(line_item_id: &LineItemId, existing: &[&ItemConfigurationEntry], used: &HashSet<EntryKey>) -> Self {
        let free = existing
            .iter()
            .map(|e| e.key.clone())
            .filter(|k| k.is_split() && !used.contains(k))
            .collect();
        let next_slot = existing.iter().map(|e| e.key.slot).max().unwrap_or(0) + 1;
        Self {
            line_item_id: line_item_id.clone(),
            free,
            next_slot,
        }
    }

    fn take(&mut self) -> EntryKey {
        self.free.pop_front().unwrap_or_else(|| {
            let key = EntryKey::slot(self.line_item_id.clone(), self.next_slot);
            self.next_slot += 1;
            key
        })
    }
}

/// Single-item consignments covering `line_item_id`, in snapshot order
fn covering<'a>(consignments: &'a [Consignment], line_item_id: &LineItemId) -> Vec<&'a Consignment> {
    consignments
        .iter()
        .filter(|c| !c.is_multi_item() && c.covers(line_item_id))
        .collect()
}

fn is_laid_out_split(item: &LineItem, covering: &[&Consignment], model: &ItemConfigurationModel) -> bool {
    if model.is_split(&item.id) || covering.len() > 1 {
        return true;
    }
    covering
        .first()
        .and_then(|c| c.quantity_of(&item.id))
        .is_some_and(|q| q < item.quantity)
}

fn layout_split(
    item: &LineItem,
    covering: &[&Consignment],
    model: &ItemConfigurationModel,
) -> Vec<ItemConfigurationEntry> {
    let existing = model.entries_for(&item.id);
    let quantity_of = |c: &Consignment| c.quantity_of(&item.id).unwrap_or(1);

    let mut remaining = item.quantity;
    let mut laid_out = Vec::new();
    let mut used = HashSet::new();
    let mut unmatched = Vec::new();

    // Entries whose consignment is still live keep their slot
    for consignment in covering {
        match existing
            .iter()
            .find(|e| e.consignment_id.as_ref() == Some(&consignment.id) && e.key.is_split())
        {
            Some(entry) => {
                let quantity = quantity_of(consignment);
                used.insert(entry.key.clone());
                laid_out.push(ItemConfigurationEntry::from_consignment(
                    entry.key.clone(),
                    quantity,
                    consignment,
                ));
                remaining = remaining.saturating_sub(quantity);
            }
            None => unmatched.push(*consignment),
        }
    }

    let mut slots = SlotAllocator::new(&item.id, &existing, &used);
    for consignment in unmatched {
        let quantity = quantity_of(consignment);
        laid_out.push(ItemConfigurationEntry::from_consignment(
            slots.take(),
            quantity,
            consignment,
        ));
        remaining = remaining.saturating_sub(quantity);
    }

    // Whatever no consignment covers yet becomes single-quantity slots
    while remaining > 0 {
        laid_out.push(ItemConfigurationEntry::empty(slots.take(), 1));
        remaining -= 1;
    }

    laid_out.sort_by_key(|e| e.key.slot);
    laid_out
}

/// Build one set of entries covering every cart line item from a consignment snapshot
///
/// Multi-item consignments are ignored; items they cover get empty entries.
pub fn build_entries(
    cart: &Cart,
    consignments: &[Consignment],
    model: &ItemConfigurationModel,
    rules: &CompletionRules,
) -> Vec<ItemConfigurationEntry> {
    let mut entries = Vec::new();

    for item in &cart.line_items {
        let covering = covering(consignments, &item.id);
        let mut laid_out = if is_laid_out_split(item, &covering, model) {
            layout_split(item, &covering, model)
        } else {
            let key = EntryKey::whole(item.id.clone());
            vec![match covering.first() {
                Some(consignment) => {
                    ItemConfigurationEntry::from_consignment(key, item.quantity, consignment)
                }
                None => ItemConfigurationEntry::empty(key, item.quantity),
            }]
        };

        for entry in &mut laid_out {
            entry.delivery_date = rules.delivery_date(Some(item));
            entry.configured = is_configured(entry, Some(item), rules);
        }
        entries.extend(laid_out);
    }

    entries
}

/// Merge incoming entries into the model by precedence
///
/// - the pinned entry (being edited) keeps its local state, losing only a
///   consignment that is no longer live
/// - items in `reset` take the incoming entry unconditionally
/// - an incoming entry with address and option always wins
/// - otherwise an already configured local entry is kept while its
///   consignment is still live, so a stale read cannot clobber it
pub fn merge_entries(
    model: &mut ItemConfigurationModel,
    incoming: Vec<ItemConfigurationEntry>,
    pinned: Option<&EntryKey>,
    reset: &HashSet<LineItemId>,
    live: &HashSet<&ConsignmentId>,
) {
    let is_live = |entry: &ItemConfigurationEntry| {
        entry
            .consignment_id
            .as_ref()
            .map_or(true, |id| live.contains(id))
    };

    let merged: Vec<ItemConfigurationEntry> = incoming
        .into_iter()
        .map(|incoming| {
            let existing = model.get(&incoming.key);
            match existing {
                Some(entry) if Some(&incoming.key) == pinned => {
                    let mut kept = entry.clone();
                    if !is_live(&kept) {
                        kept.reset();
                    }
                    kept
                }
                _ if reset.contains(incoming.line_item_id()) => incoming,
                _ if incoming.has_address_and_option() => incoming,
                Some(entry) if entry.configured && is_live(entry) => {
                    let mut kept = entry.clone();
                    kept.quantity = incoming.quantity;
                    kept
                }
                _ => incoming,
            }
        })
        .collect();

    model.replace_entries(merged);
}
