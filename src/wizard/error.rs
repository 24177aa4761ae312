//! Wizard error taxonomy

use thiserror::Error;

use crate::api::ApiError;
use crate::model::EntryKey;

/// How a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Shown inline; no reconciliation, no error sink
    Validation,
    /// Remote failure: reported, followed by a reconciliation pass
    Transient,
    /// Rejected before any remote call
    Invariant,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("another item is being edited ({0})")]
    EditInProgress(EntryKey),

    #[error("no configuration entry for {0}")]
    UnknownEntry(String),

    #[error("{0} is not the item being edited")]
    NotEditing(EntryKey),

    #[error("the shipping address is missing required fields")]
    InvalidAddress,

    #[error("{key} cannot be split into {quantity}")]
    InvalidSplit { key: EntryKey, quantity: u32 },

    #[error("{0} already has a consignment; change its address instead of splitting")]
    HasConsignment(EntryKey),

    #[error("{0} is not configured yet")]
    NotConfigured(EntryKey),

    #[error("{0} needs a shipping address before a shipping option")]
    MissingSelection(EntryKey),

    #[error("shipping option {option_id} is not offered for {key}")]
    UnknownShippingOption { key: EntryKey, option_id: String },

    #[error("{0} is disabled")]
    FeatureDisabled(&'static str),

    #[error("the platform returned no consignment for {0}")]
    ConsignmentNotReturned(EntryKey),

    #[error("not every item has a complete shipping configuration")]
    Incomplete,

    #[error(transparent)]
    Gateway(#[from] ApiError),
}

impl WizardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WizardError::InvalidAddress
            | WizardError::EditInProgress(_)
            | WizardError::MissingSelection(_) => ErrorKind::Validation,
            WizardError::Gateway(_) | WizardError::ConsignmentNotReturned(_) => ErrorKind::Transient,
            _ => ErrorKind::Invariant,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Message to show the shopper; gateway failures hide endpoint details
    pub fn user_message(&self) -> String {
        match self {
            WizardError::Gateway(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
