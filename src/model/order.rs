//! Stable display/iteration order of configuration entries

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use super::EntryKey;
use crate::types::{Cart, LineItemId};

/// Entry keys in the order they were first presented
///
/// Captured once from the cart when the wizard starts; split siblings replace
/// their parent in place (first sibling) or are appended (the rest). The
/// remote consignment list never reorders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalOrder {
    keys: Vec<EntryKey>,
}

impl OriginalOrder {
    /// Capture the cart's line items as unsplit entries
    pub fn capture(cart: &Cart) -> Self {
        Self {
            keys: cart
                .line_items
                .iter()
                .map(|item| EntryKey::whole(item.id.clone()))
                .collect(),
        }
    }

    pub fn keys(&self) -> &[EntryKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntryKey> {
        self.keys.get(index)
    }

    pub fn position(&self, key: &EntryKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Compare two keys by recorded position; unknown keys sort last
    pub fn compare(&self, a: &EntryKey, b: &EntryKey) -> Ordering {
        let pa = self.position(a).unwrap_or(usize::MAX);
        let pb = self.position(b).unwrap_or(usize::MAX);
        pa.cmp(&pb).then_with(|| a.cmp(b))
    }

    /// Replace `key` with `replacements`: the first takes its place, the rest are appended
    pub fn replace(&mut self, key: &EntryKey, replacements: &[EntryKey]) {
        let Some((first, rest)) = replacements.split_first() else {
            self.keys.retain(|k| k != key);
            return;
        };
        match self.position(key) {
            Some(index) => self.keys[index] = first.clone(),
            None => self.keys.push(first.clone()),
        }
        self.keys.extend(rest.iter().cloned());
    }

    /// Bring the order in line with the live set of keys
    ///
    /// Keys that disappeared are dropped. A new key takes the slot of the
    /// first dropped key of the same line item, if any; other new keys are
    /// appended in the order given.
    pub fn sync(&mut self, live: &[EntryKey]) {
        let live_set: HashSet<&EntryKey> = live.iter().collect();
        let known: HashSet<&EntryKey> = self.keys.iter().collect();

        let mut fresh: HashMap<&LineItemId, VecDeque<&EntryKey>> = HashMap::new();
        for key in live.iter().filter(|k| !known.contains(k)) {
            fresh.entry(&key.line_item_id).or_default().push_back(key);
        }

        let mut placed: HashSet<EntryKey> = HashSet::new();
        let mut synced = Vec::with_capacity(live.len());
        for key in &self.keys {
            if live_set.contains(key) {
                synced.push(key.clone());
            } else if let Some(replacement) = fresh
                .get_mut(&key.line_item_id)
                .and_then(VecDeque::pop_front)
            {
                placed.insert(replacement.clone());
                synced.push(replacement.clone());
            }
        }

        for key in live {
            if !known.contains(key) && !placed.contains(key) {
                synced.push(key.clone());
            }
        }

        self.keys = synced;
    }
}
