//! Completion aggregation over configuration entries

use super::{ItemConfigurationEntry, ItemConfigurationModel, OriginalOrder};
use crate::config::Config;
use crate::types::{Cart, LineItem};

/// What an entry needs before it counts as configured
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRules {
    /// Line item option that must carry a delivery date; `None` when dates are off
    pub delivery_date_option_id: Option<String>,
}

impl CompletionRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delivery_date_option_id: config
                .features
                .delivery_dates_enabled
                .then(|| config.line_item_options.delivery_date_option_id.clone()),
        }
    }

    pub fn requires_delivery_date(&self) -> bool {
        self.delivery_date_option_id.is_some()
    }

    /// Delivery date currently set on the line item, when dates are in use
    pub fn delivery_date(&self, line_item: Option<&LineItem>) -> Option<String> {
        let option_id = self.delivery_date_option_id.as_deref()?;
        line_item
            .and_then(|item| item.option_value(option_id))
            .map(str::to_string)
    }
}

/// Address and option present, plus a delivery date on the line item when required
pub fn is_configured(
    entry: &ItemConfigurationEntry,
    line_item: Option<&LineItem>,
    rules: &CompletionRules,
) -> bool {
    if !entry.has_address_and_option() {
        return false;
    }
    if rules.requires_delivery_date() {
        return rules.delivery_date(line_item).is_some();
    }
    true
}

/// Every cart line item is fully covered by configured entries
pub fn all_configured(model: &ItemConfigurationModel, cart: &Cart, rules: &CompletionRules) -> bool {
    cart.line_items.iter().all(|item| {
        let entries = model.entries_for(&item.id);
        let covered: u32 = entries.iter().map(|e| e.quantity).sum();
        !entries.is_empty()
            && covered == item.quantity
            && entries
                .iter()
                .all(|e| e.configured && is_configured(e, Some(item), rules))
    })
}

/// Index (in original order) of the first entry still needing configuration
pub fn first_unconfigured_index(
    order: &OriginalOrder,
    model: &ItemConfigurationModel,
) -> Option<usize> {
    order
        .keys()
        .iter()
        .position(|key| model.get(key).map_or(true, |e| !e.configured))
}
