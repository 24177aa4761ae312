//! Remote checkout gateway trait

use async_trait::async_trait;

use crate::api::error::ApiError;
use crate::types::{Address, Cart, Consignment, ConsignmentId, LineItemId};

/// Resource API over one shopper checkout: carts, consignments and line item options
///
/// Consignment mutations return the checkout's full consignment list as the
/// platform reports it after the change.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Identifier of the checkout this gateway is bound to
    fn checkout_id(&self) -> &str;

    /// Fetch the cart with its physical line items and their options
    async fn get_cart(&self) -> Result<Cart, ApiError>;

    /// List every consignment currently attached to the checkout
    async fn list_consignments(&self) -> Result<Vec<Consignment>, ApiError>;

    /// Create a consignment covering exactly one line item
    async fn create_consignment(
        &self,
        address: &Address,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<Consignment>, ApiError>;

    /// Replace the address (and line item coverage) of an existing consignment
    async fn update_consignment_address(
        &self,
        consignment_id: &ConsignmentId,
        address: &Address,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<Consignment>, ApiError>;

    /// Select a shipping option on a consignment
    async fn set_shipping_option(
        &self,
        consignment_id: &ConsignmentId,
        option_id: &str,
    ) -> Result<Vec<Consignment>, ApiError>;

    async fn delete_consignment(&self, consignment_id: &ConsignmentId) -> Result<(), ApiError>;

    /// Set a product option value on a cart line item (delivery date, gift message)
    async fn set_line_item_option(
        &self,
        cart_id: &str,
        line_item_id: &LineItemId,
        option_id: &str,
        value: &str,
    ) -> Result<Cart, ApiError>;
}
