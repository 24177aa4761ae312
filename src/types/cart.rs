//! Cart and line item types (read-only to the orchestration core)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque line item identity, stable for the cart's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(pub String);

impl LineItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LineItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A product option selected on a cart line item (delivery date, gift message, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemOption {
    pub option_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// One distinct physical product line in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: LineItemId,
    #[serde(default)]
    pub product_id: u64,
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub options: Vec<LineItemOption>,
}

impl LineItem {
    /// Value of an option on this line item, if set and non-empty
    pub fn option_value(&self, option_id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.option_id == option_id)
            .map(|o| o.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Gift message carried as a line item option
    pub fn gift_message(&self, option_id: &str) -> Option<&str> {
        self.option_value(option_id)
    }

    /// Insert or replace an option value
    pub fn set_option(&mut self, option_id: &str, value: &str) {
        match self.options.iter_mut().find(|o| o.option_id == option_id) {
            Some(option) => option.value = value.to_string(),
            None => self.options.push(LineItemOption {
                option_id: option_id.to_string(),
                name: String::new(),
                value: value.to_string(),
            }),
        }
    }
}

/// The shopper's cart, physical items only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl Cart {
    pub fn line_item(&self, id: &LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| &item.id == id)
    }

    pub fn line_item_mut(&mut self, id: &LineItemId) -> Option<&mut LineItem> {
        self.line_items.iter_mut().find(|item| &item.id == id)
    }
}
