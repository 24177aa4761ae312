//! Storefront checkout API gateway implementation

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::error::ApiError;
use super::gateway::CheckoutGateway;
use crate::config::GatewayConfig;
use crate::types::{
    Address, Cart, Consignment, ConsignmentId, ConsignmentLineItem, LineItem, LineItemId,
    LineItemOption, ShippingOption,
};

const CHECKOUT_RESOURCE: &str = "checkouts";
const CONSIGNMENT_RESOURCE: &str = "consignments";
const CART_RESOURCE: &str = "carts";

const CONSIGNMENT_INCLUDE: &str = "consignments.availableShippingOptions";
const CART_INCLUDE: &str = "lineItems.physicalItems.options";

/// HTTP gateway for one storefront checkout
pub struct StorefrontGateway {
    base_url: String,
    checkout_id: String,
    api_token: Option<String>,
    client: Client,
}

impl StorefrontGateway {
    /// Create a new gateway bound to a checkout
    pub fn new(base_url: &str, checkout_id: &str, api_token: Option<String>, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            checkout_id: checkout_id.to_string(),
            api_token,
            client,
        }
    }

    /// Create from config
    ///
    /// The API token (optional for storefront sessions) is read from the
    /// environment variable named in `config.api_token_env`.
    pub fn from_config(config: &GatewayConfig, checkout_id: &str) -> Result<Self, ApiError> {
        let api_token = config
            .api_token_env
            .as_deref()
            .and_then(|name| env::var(name).ok())
            .filter(|token| !token.is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::network(CHECKOUT_RESOURCE, e.to_string()))?;

        Ok(Self::new(&config.base_url, checkout_id, api_token, client))
    }

    fn checkout_path(&self) -> String {
        format!("/api/storefront/checkouts/{}", self.checkout_id)
    }

    fn consignment_path(&self, consignment_id: Option<&ConsignmentId>) -> String {
        match consignment_id {
            Some(id) => format!(
                "{}/consignments/{}?include={}",
                self.checkout_path(),
                id,
                CONSIGNMENT_INCLUDE
            ),
            None => format!(
                "{}/consignments?include={}",
                self.checkout_path(),
                CONSIGNMENT_INCLUDE
            ),
        }
    }

    /// Send a JSON request and return the raw response body on success
    async fn send(
        &self,
        method: Method,
        resource: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Storefront {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("Accept", "application/json");
        if let Some(token) = &self.api_token {
            request = request.header("X-Auth-Token", token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(resource, e.to_string()))?;

        let status = response.status();
        response_body(resource, status, response.text().await)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let text = self.send(method, resource, path, body).await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::decode(resource, format!("Parse error: {}", e)))
    }

    async fn mutate_consignments(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<Vec<Consignment>, ApiError> {
        let checkout: CheckoutWire = self
            .send_json(method, CONSIGNMENT_RESOURCE, path, Some(body))
            .await?;
        Ok(checkout.into_consignments())
    }
}

/// The body of a successful response, or the error a status and body stand for
fn response_body<E: fmt::Display>(
    resource: &str,
    status: StatusCode,
    body: Result<String, E>,
) -> Result<String, ApiError> {
    match body {
        Ok(text) if status.is_success() => Ok(text),
        Ok(text) => Err(ApiError::from_status(resource, status.as_u16(), &text)),
        Err(e) if status.is_success() => Err(ApiError::network(
            resource,
            format!("failed to read response body: {}", e),
        )),
        Err(_) => Err(ApiError::from_status(resource, status.as_u16(), "")),
    }
}

fn line_items_body(line_item_id: &LineItemId, quantity: u32) -> Value {
    json!([{ "itemId": line_item_id, "quantity": quantity }])
}

/// Option ids are numeric on the platform; keep non-numeric ids as strings
fn option_id_value(option_id: &str) -> Value {
    option_id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(option_id))
}

/// Build the cart item update body, preserving the item's other option selections
fn line_item_update_body(item: &LineItem, option_id: &str, value: &str) -> Value {
    let mut selections: Vec<Value> = item
        .options
        .iter()
        .filter(|o| o.option_id != option_id)
        .map(|o| json!({ "optionId": option_id_value(&o.option_id), "optionValue": o.value }))
        .collect();
    selections.push(json!({ "optionId": option_id_value(option_id), "optionValue": value }));

    json!({
        "lineItem": {
            "productId": item.product_id,
            "quantity": item.quantity,
            "optionSelections": selections,
        }
    })
}

// Storefront API response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutWire {
    #[serde(default)]
    consignments: Vec<ConsignmentWire>,
}

impl CheckoutWire {
    fn into_consignments(self) -> Vec<Consignment> {
        self.consignments.into_iter().map(Into::into).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsignmentWire {
    id: String,
    #[serde(default)]
    line_item_ids: Vec<String>,
    #[serde(default)]
    line_items: Vec<ConsignmentLineItemWire>,
    #[serde(default, alias = "address")]
    shipping_address: Option<Address>,
    #[serde(default)]
    selected_shipping_option: Option<ShippingOption>,
    #[serde(default)]
    available_shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsignmentLineItemWire {
    item_id: String,
    #[serde(default)]
    quantity: Option<u32>,
}

impl From<ConsignmentWire> for Consignment {
    fn from(wire: ConsignmentWire) -> Self {
        // Prefer per-item quantities when the platform reports them
        let line_items = if wire.line_items.is_empty() {
            wire.line_item_ids
                .into_iter()
                .map(|id| ConsignmentLineItem {
                    item_id: LineItemId(id),
                    quantity: None,
                })
                .collect()
        } else {
            wire.line_items
                .into_iter()
                .map(|li| ConsignmentLineItem {
                    item_id: LineItemId(li.item_id),
                    quantity: li.quantity,
                })
                .collect()
        };

        Consignment {
            id: ConsignmentId(wire.id),
            line_items,
            shipping_address: wire.shipping_address,
            selected_shipping_option: wire.selected_shipping_option,
            available_shipping_options: wire.available_shipping_options,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartWire {
    id: String,
    #[serde(default)]
    line_items: CartLineItemsWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLineItemsWire {
    #[serde(default)]
    physical_items: Vec<PhysicalItemWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhysicalItemWire {
    id: String,
    #[serde(default)]
    product_id: u64,
    name: String,
    quantity: u32,
    #[serde(default)]
    options: Vec<ItemOptionWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemOptionWire {
    #[serde(default)]
    name: String,
    name_id: u64,
    #[serde(default)]
    value: String,
}

impl From<CartWire> for Cart {
    fn from(wire: CartWire) -> Self {
        Cart {
            id: wire.id,
            line_items: wire
                .line_items
                .physical_items
                .into_iter()
                .map(|item| LineItem {
                    id: LineItemId(item.id),
                    product_id: item.product_id,
                    name: item.name,
                    quantity: item.quantity,
                    options: item
                        .options
                        .into_iter()
                        .map(|o| LineItemOption {
                            option_id: o.name_id.to_string(),
                            name: o.name,
                            value: o.value,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CheckoutGateway for StorefrontGateway {
    fn checkout_id(&self) -> &str {
        &self.checkout_id
    }

    async fn get_cart(&self) -> Result<Cart, ApiError> {
        let path = format!(
            "/api/storefront/carts/{}?include={}",
            self.checkout_id, CART_INCLUDE
        );
        let cart: CartWire = self
            .send_json(Method::GET, CART_RESOURCE, &path, None)
            .await?;
        Ok(cart.into())
    }

    async fn list_consignments(&self) -> Result<Vec<Consignment>, ApiError> {
        let path = format!("{}?include={}", self.checkout_path(), CONSIGNMENT_INCLUDE);
        let checkout: CheckoutWire = self
            .send_json(Method::GET, CHECKOUT_RESOURCE, &path, None)
            .await?;
        Ok(checkout.into_consignments())
    }

    async fn create_consignment(
        &self,
        address: &Address,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<Consignment>, ApiError> {
        let body = json!([{
            "shippingAddress": address,
            "lineItems": line_items_body(line_item_id, quantity),
        }]);
        self.mutate_consignments(Method::POST, &self.consignment_path(None), &body)
            .await
    }

    async fn update_consignment_address(
        &self,
        consignment_id: &ConsignmentId,
        address: &Address,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<Consignment>, ApiError> {
        let body = json!({
            "shippingAddress": address,
            "lineItems": line_items_body(line_item_id, quantity),
        });
        self.mutate_consignments(
            Method::PUT,
            &self.consignment_path(Some(consignment_id)),
            &body,
        )
        .await
    }

    async fn set_shipping_option(
        &self,
        consignment_id: &ConsignmentId,
        option_id: &str,
    ) -> Result<Vec<Consignment>, ApiError> {
        let body = json!({ "shippingOptionId": option_id });
        self.mutate_consignments(
            Method::PUT,
            &self.consignment_path(Some(consignment_id)),
            &body,
        )
        .await
    }

    async fn delete_consignment(&self, consignment_id: &ConsignmentId) -> Result<(), ApiError> {
        let path = format!("{}/consignments/{}", self.checkout_path(), consignment_id);
        self.send(Method::DELETE, CONSIGNMENT_RESOURCE, &path, None)
            .await
            .map(|_| ())
    }

    async fn set_line_item_option(
        &self,
        cart_id: &str,
        line_item_id: &LineItemId,
        option_id: &str,
        value: &str,
    ) -> Result<Cart, ApiError> {
        // The item update replaces all option selections, so start from the current cart
        let cart = self.get_cart().await?;
        let item = cart
            .line_item(line_item_id)
            .ok_or_else(|| ApiError::not_found(CART_RESOURCE))?;

        let body = line_item_update_body(item, option_id, value);
        let path = format!(
            "/api/storefront/carts/{}/items/{}?include={}",
            cart_id, line_item_id, CART_INCLUDE
        );
        let cart: CartWire = self
            .send_json(Method::PUT, CART_RESOURCE, &path, Some(&body))
            .await?;
        Ok(cart.into())
    }
}
