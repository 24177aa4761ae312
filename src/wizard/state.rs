//! Per-item wizard states and the edit session

use serde::Serialize;
use std::fmt;

use crate::model::{CompletionRules, EntryKey, ItemConfigurationEntry};
use crate::types::LineItem;

/// Sub-state of the entry being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditStage {
    AddressPending,
    OptionsPending,
    OptionSelected,
    DatePending,
}

impl fmt::Display for EditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditStage::AddressPending => "address pending",
            EditStage::OptionsPending => "options pending",
            EditStage::OptionSelected => "option selected",
            EditStage::DatePending => "date pending",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemState {
    Idle,
    Editing(EditStage),
    Configured,
}

/// How the session was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditOrigin {
    /// Opened automatically on the next unconfigured entry
    Next,
    /// Re-opened on a configured entry by the shopper
    Existing,
}

/// The single entry currently open for editing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSession {
    pub key: EntryKey,
    pub stage: EditStage,
    pub origin: EditOrigin,
    /// A remote change has been made during this session
    pub touched: bool,
}

impl EditSession {
    pub fn new(key: EntryKey, stage: EditStage, origin: EditOrigin) -> Self {
        Self {
            key,
            stage,
            origin,
            touched: false,
        }
    }

    /// Mid-edit sessions block editing any other entry
    pub fn is_mid_edit(&self) -> bool {
        self.touched || self.origin == EditOrigin::Existing
    }
}

/// Where the wizard went after an item was finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Advance {
    Editing(EntryKey),
    AllConfigured,
}

/// Stage an entry resumes at, judged from what it already carries
pub fn stage_for(
    entry: &ItemConfigurationEntry,
    line_item: Option<&LineItem>,
    rules: &CompletionRules,
) -> EditStage {
    if entry.consignment_id.is_none() || entry.shipping_address.is_none() {
        EditStage::AddressPending
    } else if entry.selected_shipping_option.is_none() {
        EditStage::OptionsPending
    } else if rules.requires_delivery_date() && rules.delivery_date(line_item).is_none() {
        EditStage::DatePending
    } else {
        EditStage::OptionSelected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, ConsignmentId, LineItemId, ShippingOption};

    #[test]
    fn test_stage_follows_entry_contents() {
        let rules = CompletionRules {
            delivery_date_option_id: Some("dd".to_string()),
        };
        let mut entry = ItemConfigurationEntry::empty(EntryKey::whole(LineItemId::from("a")), 1);
        assert_eq!(stage_for(&entry, None, &rules), EditStage::AddressPending);

        entry.consignment_id = Some(ConsignmentId::from("c-1"));
        entry.shipping_address = Some(Address::default());
        assert_eq!(stage_for(&entry, None, &rules), EditStage::OptionsPending);

        entry.selected_shipping_option = Some(ShippingOption::default());
        assert_eq!(stage_for(&entry, None, &rules), EditStage::DatePending);
        assert_eq!(
            stage_for(&entry, None, &CompletionRules::default()),
            EditStage::OptionSelected
        );
    }

    #[test]
    fn test_mid_edit() {
        let key = EntryKey::whole(LineItemId::from("a"));
        let mut session = EditSession::new(key.clone(), EditStage::AddressPending, EditOrigin::Next);
        assert!(!session.is_mid_edit());
        session.touched = true;
        assert!(session.is_mid_edit());

        let existing = EditSession::new(key, EditStage::OptionSelected, EditOrigin::Existing);
        assert!(existing.is_mid_edit());
    }
}
