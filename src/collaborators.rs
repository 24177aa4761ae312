//! Host collaborators the wizard calls out to.
//!
//! Address validation, step navigation and unhandled-error reporting belong to
//! the surrounding checkout; the wizard only depends on these traits.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

use crate::types::Address;
use crate::wizard::WizardError;

/// Decides whether an address may be used for a consignment
pub trait AddressValidator: Send + Sync {
    fn is_valid_address(&self, address: &Address, required_fields: &[String]) -> bool;
}

/// Every required field is present and non-blank
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFieldsValidator;

impl AddressValidator for RequiredFieldsValidator {
    fn is_valid_address(&self, address: &Address, required_fields: &[String]) -> bool {
        required_fields.iter().all(|field| {
            address
                .field(field)
                .is_some_and(|value| !value.trim().is_empty())
        })
    }
}

/// Moves the checkout past the shipping step
pub trait StepNavigator: Send + Sync {
    fn navigate_next_step(&self, is_billing_same_as_shipping: bool);
}

/// Navigator for headless use: logs the transition
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNavigator;

impl StepNavigator for LoggingNavigator {
    fn navigate_next_step(&self, is_billing_same_as_shipping: bool) {
        info!(
            billing_same_as_shipping = is_billing_same_as_shipping,
            "Shipping step complete, continuing to next checkout step"
        );
    }
}

/// Receives failures the wizard could not recover from on its own
pub trait ErrorSink: Send + Sync {
    fn on_unhandled_error(&self, error: &WizardError);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorSink;

impl ErrorSink for LoggingErrorSink {
    fn on_unhandled_error(&self, err: &WizardError) {
        error!(kind = ?err.kind(), "Unhandled shipping error: {}", err);
    }
}

/// Navigator that records each call, for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    calls: Arc<Mutex<Vec<bool>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `is_billing_same_as_shipping` of every navigation, in order
    pub fn calls(&self) -> Vec<bool> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StepNavigator for RecordingNavigator {
    fn navigate_next_step(&self, is_billing_same_as_shipping: bool) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(is_billing_same_as_shipping);
    }
}

/// Error sink that keeps the rendered errors
#[derive(Debug, Clone, Default)]
pub struct RecordingErrorSink {
    errors: Arc<Mutex<Vec<String>>>,
}

impl RecordingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn on_unhandled_error(&self, err: &WizardError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err.to_string());
    }
}
