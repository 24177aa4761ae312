//! Remote consignment resource

use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::{Address, ShippingOption};
use super::cart::LineItemId;

/// Gateway-assigned consignment identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsignmentId(pub String);

impl ConsignmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConsignmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConsignmentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A line item covered by a consignment
///
/// `quantity` is `None` when the gateway does not report a partial quantity,
/// meaning the consignment covers the line item's full quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsignmentLineItem {
    pub item_id: LineItemId,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// Binds line items to a shipping address and (optionally) a chosen option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consignment {
    pub id: ConsignmentId,
    pub line_items: Vec<ConsignmentLineItem>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub selected_shipping_option: Option<ShippingOption>,
    #[serde(default)]
    pub available_shipping_options: Vec<ShippingOption>,
}

impl Consignment {
    pub fn line_item_ids(&self) -> Vec<&LineItemId> {
        self.line_items.iter().map(|li| &li.item_id).collect()
    }

    /// A consignment without a selected shipping option does not survive reconciliation
    pub fn is_complete(&self) -> bool {
        self.selected_shipping_option.is_some()
    }

    /// Covers more than one distinct line item and must be split
    pub fn is_multi_item(&self) -> bool {
        let mut ids = self.line_item_ids();
        ids.sort();
        ids.dedup();
        ids.len() > 1
    }

    /// The sole line item of a single-item consignment
    pub fn sole_line_item(&self) -> Option<&ConsignmentLineItem> {
        if self.is_multi_item() {
            return None;
        }
        self.line_items.first()
    }

    pub fn covers(&self, line_item_id: &LineItemId) -> bool {
        self.line_items.iter().any(|li| &li.item_id == line_item_id)
    }

    /// Quantity of a line item this consignment covers (`None` = full quantity)
    pub fn quantity_of(&self, line_item_id: &LineItemId) -> Option<u32> {
        self.line_items
            .iter()
            .filter(|li| &li.item_id == line_item_id)
            .filter_map(|li| li.quantity)
            .reduce(|a, b| a + b)
    }

    pub fn find_option(&self, option_id: &str) -> Option<&ShippingOption> {
        self.available_shipping_options
            .iter()
            .find(|o| o.id == option_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consignment(items: &[(&str, Option<u32>)]) -> Consignment {
        Consignment {
            id: ConsignmentId::from("c-1"),
            line_items: items
                .iter()
                .map(|(id, qty)| ConsignmentLineItem {
                    item_id: LineItemId::from(*id),
                    quantity: *qty,
                })
                .collect(),
            shipping_address: None,
            selected_shipping_option: None,
            available_shipping_options: vec![],
        }
    }

    #[test]
    fn test_multi_item_detection() {
        assert!(!consignment(&[("a", None)]).is_multi_item());
        assert!(consignment(&[("a", None), ("b", None)]).is_multi_item());
        // Same line item listed twice is still single-item
        assert!(!consignment(&[("a", Some(1)), ("a", Some(1))]).is_multi_item());
    }

    #[test]
    fn test_quantity_of() {
        let c = consignment(&[("a", Some(2))]);
        assert_eq!(c.quantity_of(&LineItemId::from("a")), Some(2));
        assert_eq!(c.quantity_of(&LineItemId::from("b")), None);
        assert_eq!(
            consignment(&[("a", None)]).quantity_of(&LineItemId::from("a")),
            None
        );
    }

    #[test]
    fn test_completeness_follows_selected_option() {
        let mut c = consignment(&[("a", None)]);
        assert!(!c.is_complete());
        c.selected_shipping_option = Some(ShippingOption {
            id: "opt-1".to_string(),
            ..Default::default()
        });
        assert!(c.is_complete());
    }
}
