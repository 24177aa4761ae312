//! In-process checkout gateway for tests.
//!
//! Simulates the platform closely enough to drive reconciliation and the
//! wizard: consignment ids are assigned on creation, every addressed
//! consignment is offered the configured shipping options, an address change
//! clears the selected option, and failures can be queued per operation.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::error::ApiError;
use super::gateway::CheckoutGateway;
use crate::types::{
    Address, Cart, Consignment, ConsignmentId, ConsignmentLineItem, LineItemId, ShippingOption,
};

/// Gateway operations, used for call logs and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetCart,
    ListConsignments,
    CreateConsignment,
    UpdateConsignmentAddress,
    SetShippingOption,
    DeleteConsignment,
    SetLineItemOption,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: MockOperation,
    pub args: Vec<String>,
}

struct MockCheckout {
    cart: Cart,
    consignments: Vec<Consignment>,
    shipping_options: Vec<ShippingOption>,
    next_id: u32,
    report_quantities: bool,
    failures: HashMap<MockOperation, VecDeque<ApiError>>,
}

/// Mock implementation for testing
#[derive(Clone)]
pub struct MockCheckoutGateway {
    checkout_id: String,
    state: Arc<Mutex<MockCheckout>>,
    /// Record of calls made
    pub call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockCheckoutGateway {
    pub fn new(cart: Cart) -> Self {
        Self {
            checkout_id: cart.id.clone(),
            state: Arc::new(Mutex::new(MockCheckout {
                cart,
                consignments: Vec::new(),
                shipping_options: default_shipping_options(),
                next_id: 1,
                report_quantities: true,
                failures: HashMap::new(),
            })),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the options offered to every addressed consignment
    pub fn with_shipping_options(self, options: Vec<ShippingOption>) -> Self {
        self.state.lock().unwrap().shipping_options = options;
        self
    }

    /// Answer with consignments that only list line item ids, like the storefront API
    pub fn without_line_item_quantities(self) -> Self {
        self.state.lock().unwrap().report_quantities = false;
        self
    }

    /// Seed a consignment as if it already existed remotely
    pub fn insert_consignment(&self, consignment: Consignment) {
        self.state.lock().unwrap().consignments.push(consignment);
    }

    /// Simulate the platform dropping a consignment's selected option
    pub fn drop_selected_option(&self, consignment_id: &ConsignmentId) {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state
            .consignments
            .iter_mut()
            .find(|c| &c.id == consignment_id)
        {
            c.selected_shipping_option = None;
        }
    }

    /// Simulate the platform evicting a consignment entirely
    pub fn evict_consignment(&self, consignment_id: &ConsignmentId) {
        self.state
            .lock()
            .unwrap()
            .consignments
            .retain(|c| &c.id != consignment_id);
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: MockOperation, error: ApiError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn consignments(&self) -> Vec<Consignment> {
        self.state.lock().unwrap().consignments.clone()
    }

    pub fn cart(&self) -> Cart {
        self.state.lock().unwrap().cart.clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn calls_for(&self, operation: MockOperation) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear();
    }

    fn record(&self, operation: MockOperation, args: Vec<String>) -> Result<(), ApiError> {
        self.call_log
            .lock()
            .unwrap()
            .push(MockCall { operation, args });

        let mut state = self.state.lock().unwrap();
        match state
            .failures
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl MockCheckout {
    /// Consignments as the gateway answers with them
    fn reported(&self) -> Vec<Consignment> {
        let mut consignments = self.consignments.clone();
        if !self.report_quantities {
            for line_item in consignments.iter_mut().flat_map(|c| c.line_items.iter_mut()) {
                line_item.quantity = None;
            }
        }
        consignments
    }
}

fn default_shipping_options() -> Vec<ShippingOption> {
    vec![
        ShippingOption {
            id: "opt-ground".to_string(),
            description: "Ground".to_string(),
            cost: 5.0,
            ..Default::default()
        },
        ShippingOption {
            id: "opt-express".to_string(),
            description: "Express".to_string(),
            cost: 15.0,
            ..Default::default()
        },
    ]
}

#[async_trait]
impl CheckoutGateway for MockCheckoutGateway {
    fn checkout_id(&self) -> &str {
        &self.checkout_id
    }

    async fn get_cart(&self) -> Result<Cart, ApiError> {
        self.record(MockOperation::GetCart, vec![])?;
        Ok(self.cart())
    }

    async fn list_consignments(&self) -> Result<Vec<Consignment>, ApiError> {
        self.record(MockOperation::ListConsignments, vec![])?;
        Ok(self.state.lock().unwrap().reported())
    }

    async fn create_consignment(
        &self,
        address: &Address,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<Consignment>, ApiError> {
        self.record(
            MockOperation::CreateConsignment,
            vec![line_item_id.to_string(), quantity.to_string()],
        )?;

        let mut state = self.state.lock().unwrap();
        let id = ConsignmentId(format!("consignment-{}", state.next_id));
        state.next_id += 1;
        let options = state.shipping_options.clone();
        state.consignments.push(Consignment {
            id,
            line_items: vec![ConsignmentLineItem {
                item_id: line_item_id.clone(),
                quantity: Some(quantity),
            }],
            shipping_address: Some(address.clone()),
            selected_shipping_option: None,
            available_shipping_options: options,
        });
        Ok(state.reported())
    }

    async fn update_consignment_address(
        &self,
        consignment_id: &ConsignmentId,
        address: &Address,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<Consignment>, ApiError> {
        self.record(
            MockOperation::UpdateConsignmentAddress,
            vec![
                consignment_id.to_string(),
                line_item_id.to_string(),
                quantity.to_string(),
            ],
        )?;

        let mut state = self.state.lock().unwrap();
        let options = state.shipping_options.clone();
        let consignment = state
            .consignments
            .iter_mut()
            .find(|c| &c.id == consignment_id)
            .ok_or_else(|| ApiError::not_found("consignments"))?;
        consignment.shipping_address = Some(address.clone());
        consignment.line_items = vec![ConsignmentLineItem {
            item_id: line_item_id.clone(),
            quantity: Some(quantity),
        }];
        consignment.selected_shipping_option = None;
        consignment.available_shipping_options = options;
        Ok(state.reported())
    }

    async fn set_shipping_option(
        &self,
        consignment_id: &ConsignmentId,
        option_id: &str,
    ) -> Result<Vec<Consignment>, ApiError> {
        self.record(
            MockOperation::SetShippingOption,
            vec![consignment_id.to_string(), option_id.to_string()],
        )?;

        let mut state = self.state.lock().unwrap();
        let consignment = state
            .consignments
            .iter_mut()
            .find(|c| &c.id == consignment_id)
            .ok_or_else(|| ApiError::not_found("consignments"))?;
        let option = consignment
            .find_option(option_id)
            .cloned()
            .ok_or_else(|| ApiError::http("consignments", 400, "Invalid shipping option"))?;
        consignment.selected_shipping_option = Some(option);
        Ok(state.reported())
    }

    async fn delete_consignment(&self, consignment_id: &ConsignmentId) -> Result<(), ApiError> {
        self.record(
            MockOperation::DeleteConsignment,
            vec![consignment_id.to_string()],
        )?;

        let mut state = self.state.lock().unwrap();
        let before = state.consignments.len();
        state.consignments.retain(|c| &c.id != consignment_id);
        if state.consignments.len() == before {
            return Err(ApiError::not_found("consignments"));
        }
        Ok(())
    }

    async fn set_line_item_option(
        &self,
        cart_id: &str,
        line_item_id: &LineItemId,
        option_id: &str,
        value: &str,
    ) -> Result<Cart, ApiError> {
        self.record(
            MockOperation::SetLineItemOption,
            vec![
                cart_id.to_string(),
                line_item_id.to_string(),
                option_id.to_string(),
                value.to_string(),
            ],
        )?;

        let mut state = self.state.lock().unwrap();
        let item = state
            .cart
            .line_item_mut(line_item_id)
            .ok_or_else(|| ApiError::not_found("carts"))?;
        item.set_option(option_id, value);
        Ok(state.cart.clone())
    }
}
