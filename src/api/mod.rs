//! Remote checkout gateway
//!
//! This module provides:
//! - The `CheckoutGateway` trait consumed by reconciliation and the wizard
//! - `StorefrontGateway`, the HTTP implementation
//! - `MockCheckoutGateway`, an in-process platform simulation for tests
//! - Error handling with platform message extraction

pub mod error;
pub mod gateway;
pub mod mock;
pub mod storefront;

pub use error::ApiError;
pub use gateway::CheckoutGateway;
pub use mock::{MockCall, MockCheckoutGateway, MockOperation};
pub use storefront::StorefrontGateway;
