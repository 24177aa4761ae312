//! Multiship - per-item shipping orchestration for storefront checkouts
//!
//! Lets a shopper send each line item (or each unit of one) to its own
//! address with its own shipping option, keeping the checkout's remote
//! consignments in agreement with the local wizard state.

pub mod api;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod env_vars;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod types;
pub mod wizard;

pub use api::{ApiError, CheckoutGateway};
pub use cache::{ConsignmentCache, PersistedRecord};
pub use config::Config;
pub use model::{EntryKey, ItemConfigurationEntry, ItemConfigurationModel};
pub use reconcile::{ReconcileReport, ReconcileScope, Reconciler};
pub use wizard::{ShippingWizard, WizardError, WizardSettings};
