//! Shipping address and shipping option types

use serde::{Deserialize, Serialize};

/// A postal address a consignment ships to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state_or_province: String,
    #[serde(default)]
    pub state_or_province_code: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub phone: String,
}

impl Address {
    /// Look up a field by its wire name (e.g. "firstName", "postalCode")
    ///
    /// Returns `None` for names that are not address fields.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "firstName" => &self.first_name,
            "lastName" => &self.last_name,
            "company" => &self.company,
            "address1" => &self.address1,
            "address2" => &self.address2,
            "city" => &self.city,
            "stateOrProvince" => &self.state_or_province,
            "stateOrProvinceCode" => &self.state_or_province_code,
            "countryCode" => &self.country_code,
            "postalCode" => &self.postal_code,
            "phone" => &self.phone,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let parts: Vec<&str> = [
            name.trim(),
            self.address1.as_str(),
            self.city.as_str(),
            self.postal_code.as_str(),
            self.country_code.as_str(),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
        parts.join(", ")
    }
}

/// A carrier option offered for a consignment once its address is known
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, rename = "type")]
    pub option_type: String,
    #[serde(default)]
    pub transit_time: String,
    #[serde(default)]
    pub is_recommended: bool,
}
