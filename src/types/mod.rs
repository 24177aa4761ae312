//! Domain types shared by the gateway, cache, model and wizard.
//!
//! Serialized with camelCase names so the same shapes are used on the wire,
//! in the local consignment cache and in CLI JSON output.

mod address;
mod cart;
mod consignment;

pub use address::{Address, ShippingOption};
pub use cart::{Cart, LineItem, LineItemId, LineItemOption};
pub use consignment::{Consignment, ConsignmentId, ConsignmentLineItem};
