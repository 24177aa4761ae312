//! Wizard controller.
//!
//! Drives the shopper through one entry at a time: address, then shipping
//! option, then (when enabled) delivery date. Every successful remote change
//! is merged back through the reconciler; every failed one aborts the action,
//! reports it and triggers a full reconciliation pass.

mod error;
mod state;

pub use error::{ErrorKind, WizardError};
pub use state::{stage_for, Advance, EditOrigin, EditSession, EditStage, ItemState};

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::CheckoutGateway;
use crate::cache::{ConsignmentCache, PersistedRecord};
use crate::collaborators::{
    AddressValidator, ErrorSink, LoggingErrorSink, LoggingNavigator, RequiredFieldsValidator,
    StepNavigator,
};
use crate::config::Config;
use crate::model::{
    all_configured, first_unconfigured_index, is_configured, CompletionRules, EntryKey,
    ItemConfigurationEntry, ItemConfigurationModel,
};
use crate::reconcile::{ReconcileReport, ReconcileScope, Reconciler};
use crate::types::{Address, Cart, Consignment, ConsignmentId};

/// Date format of the delivery date line item option
pub const DELIVERY_DATE_FORMAT: &str = "%m/%d/%Y";

/// Capabilities and field requirements the wizard runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSettings {
    pub delivery_dates_enabled: bool,
    pub gift_messages_enabled: bool,
    pub auto_recommend_option: bool,
    pub resurrect_from_cache: bool,
    pub delivery_date_option_id: String,
    pub gift_message_option_id: String,
    pub required_fields: Vec<String>,
}

impl WizardSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delivery_dates_enabled: config.features.delivery_dates_enabled,
            gift_messages_enabled: config.features.gift_messages_enabled,
            auto_recommend_option: config.features.auto_recommend_option,
            resurrect_from_cache: config.features.resurrect_from_cache,
            delivery_date_option_id: config.line_item_options.delivery_date_option_id.clone(),
            gift_message_option_id: config.line_item_options.gift_message_option_id.clone(),
            required_fields: config.address.required_fields.clone(),
        }
    }

    pub fn rules(&self) -> CompletionRules {
        CompletionRules {
            delivery_date_option_id: self
                .delivery_dates_enabled
                .then(|| self.delivery_date_option_id.clone()),
        }
    }
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Per-item shipping wizard over one checkout
pub struct ShippingWizard {
    gateway: Arc<dyn CheckoutGateway>,
    cache: Arc<dyn ConsignmentCache>,
    reconciler: Reconciler,
    validator: Arc<dyn AddressValidator>,
    navigator: Arc<dyn StepNavigator>,
    error_sink: Arc<dyn ErrorSink>,
    settings: WizardSettings,
    rules: CompletionRules,
    cart: Cart,
    model: ItemConfigurationModel,
    session: Option<EditSession>,
    last_error: Option<String>,
    navigated: bool,
}

impl ShippingWizard {
    pub fn new(
        gateway: Arc<dyn CheckoutGateway>,
        cache: Arc<dyn ConsignmentCache>,
        settings: WizardSettings,
    ) -> Self {
        let rules = settings.rules();
        let reconciler = Reconciler::new(gateway.clone(), cache.clone(), rules.clone())
            .with_resurrection(settings.resurrect_from_cache);
        Self {
            gateway,
            cache,
            reconciler,
            validator: Arc::new(RequiredFieldsValidator),
            navigator: Arc::new(LoggingNavigator),
            error_sink: Arc::new(LoggingErrorSink),
            settings,
            rules,
            cart: Cart::default(),
            model: ItemConfigurationModel::default(),
            session: None,
            last_error: None,
            navigated: false,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn AddressValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn StepNavigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = error_sink;
        self
    }

    pub fn settings(&self) -> &WizardSettings {
        &self.settings
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn model(&self) -> &ItemConfigurationModel {
        &self.model
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Entry currently open for editing
    pub fn current(&self) -> Option<&EntryKey> {
        self.session.as_ref().map(|s| &s.key)
    }

    /// Shopper-facing message of the last failed action, cleared when the next one starts
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_navigated(&self) -> bool {
        self.navigated
    }

    pub fn all_configured(&self) -> bool {
        all_configured(&self.model, &self.cart, &self.rules)
    }

    pub fn item_state(&self, key: &EntryKey) -> Option<ItemState> {
        let entry = self.model.get(key)?;
        Some(match &self.session {
            Some(session) if &session.key == key => ItemState::Editing(session.stage),
            _ if entry.configured => ItemState::Configured,
            _ => ItemState::Idle,
        })
    }

    /// Load the cart, reconcile and open the first unconfigured entry
    pub async fn start(&mut self) -> Result<ReconcileReport, WizardError> {
        self.last_error = None;
        let cart = match self.gateway.get_cart().await {
            Ok(cart) => cart,
            Err(e) => {
                let err = WizardError::from(e);
                error!("Failed to load cart: {}", err);
                self.last_error = Some(err.user_message());
                self.error_sink.on_unhandled_error(&err);
                return Err(err);
            }
        };
        info!(
            checkout = self.gateway.checkout_id(),
            items = cart.line_items.len(),
            "Starting shipping wizard"
        );

        self.model = ItemConfigurationModel::from_cart(&cart);
        self.cart = cart;
        self.session = None;
        self.navigated = false;

        let report = self
            .reconciler
            .reconcile(&self.cart, &mut self.model, &ReconcileScope::default())
            .await;
        self.open_next();
        Ok(report)
    }

    /// Re-read the cart and run a reconciliation pass, keeping the current session
    pub async fn refresh(&mut self) -> ReconcileReport {
        self.last_error = None;
        match self.gateway.get_cart().await {
            Ok(cart) => self.cart = cart,
            Err(e) => warn!("Could not refresh cart, using the last one: {}", e),
        }
        let scope = ReconcileScope::pinned(self.current().cloned());
        let report = self
            .reconciler
            .reconcile(&self.cart, &mut self.model, &scope)
            .await;
        self.resume_session();
        report
    }

    /// Accept an address for `key` and create or update its consignment
    ///
    /// Does not advance: the offered options have to be chosen from first.
    pub async fn select_address(&mut self, key: &EntryKey, address: Address) -> Result<(), WizardError> {
        self.last_error = None;
        if let Err(err) = self.ensure_editable(key) {
            return Err(self.reject(err));
        }

        if !self
            .validator
            .is_valid_address(&address, &self.settings.required_fields)
        {
            self.set_stage(EditStage::AddressPending);
            return Err(self.reject(WizardError::InvalidAddress));
        }

        let (consignment_id, quantity) = match self.model.get(key) {
            Some(entry) => (entry.consignment_id.clone(), entry.quantity),
            None => return Err(self.reject(WizardError::UnknownEntry(key.to_string()))),
        };
        let line_item_id = &key.line_item_id;

        debug!(entry = %key, consignment = ?consignment_id, "Submitting shipping address");
        let result = match &consignment_id {
            Some(id) => {
                self.gateway
                    .update_consignment_address(id, &address, line_item_id, quantity)
                    .await
            }
            None => {
                self.gateway
                    .create_consignment(&address, line_item_id, quantity)
                    .await
            }
        };
        let consignments = match result {
            Ok(consignments) => consignments,
            Err(e) => return Err(self.abort(e.into(), false).await),
        };

        let claimed: HashSet<ConsignmentId> = self
            .model
            .claimed_consignments(Some(key))
            .into_iter()
            .cloned()
            .collect();
        let found = consignments
            .iter()
            .find(|c| consignment_id.as_ref() == Some(&c.id))
            .or_else(|| {
                consignments.iter().find(|c| {
                    !c.is_multi_item() && c.covers(line_item_id) && !claimed.contains(&c.id)
                })
            })
            .cloned();
        let Some(found) = found else {
            return Err(self
                .abort(WizardError::ConsignmentNotReturned(key.clone()), false)
                .await);
        };

        if let Some(entry) = self.model.get_mut(key) {
            entry.consignment_id = Some(found.id.clone());
            entry.shipping_address = found.shipping_address.clone().or(Some(address));
            entry.selected_shipping_option = found.selected_shipping_option.clone();
            entry.available_shipping_options = found.available_shipping_options.clone();
            entry.configured = false;
        }
        self.touch(EditStage::OptionsPending);
        self.merge(&consignments);
        info!(
            entry = %key,
            consignment = %found.id,
            options = found.available_shipping_options.len(),
            "Shipping address accepted"
        );

        if self.settings.auto_recommend_option {
            let recommended = found
                .available_shipping_options
                .iter()
                .find(|o| o.is_recommended)
                .map(|o| o.id.clone());
            if let Some(option_id) = recommended {
                debug!(entry = %key, option = %option_id, "Selecting recommended option");
                return self.select_shipping_option(key, &option_id).await;
            }
        }
        Ok(())
    }

    /// Select one of the options offered for the current entry's consignment
    pub async fn select_shipping_option(&mut self, key: &EntryKey, option_id: &str) -> Result<(), WizardError> {
        self.last_error = None;
        if let Err(err) = self.require_current(key) {
            return Err(self.reject(err));
        }

        let checked = match self.model.get(key) {
            Some(ItemConfigurationEntry {
                consignment_id: Some(id),
                shipping_address: Some(address),
                available_shipping_options,
                quantity,
                ..
            }) => {
                if available_shipping_options.iter().any(|o| o.id == option_id) {
                    Ok((id.clone(), address.clone(), *quantity))
                } else {
                    Err(WizardError::UnknownShippingOption {
                        key: key.clone(),
                        option_id: option_id.to_string(),
                    })
                }
            }
            Some(_) => Err(WizardError::MissingSelection(key.clone())),
            None => Err(WizardError::UnknownEntry(key.to_string())),
        };
        let (consignment_id, address, quantity) = match checked {
            Ok(checked) => checked,
            Err(err) => return Err(self.reject(err)),
        };

        let consignments = match self
            .gateway
            .set_shipping_option(&consignment_id, option_id)
            .await
        {
            Ok(consignments) => consignments,
            Err(e) => return Err(self.abort(e.into(), true).await),
        };

        let delivery_date = self.rules.delivery_date(self.cart.line_item(&key.line_item_id));
        let record = PersistedRecord::new(
            consignment_id.clone(),
            key.line_item_id.clone(),
            quantity,
            address,
            option_id,
        )
        .with_delivery_date(delivery_date);
        match self.cache.put(record) {
            Ok(()) => debug!(consignment = %consignment_id, "Cached shipping selection"),
            Err(e) => warn!("Failed to cache shipping selection for {}: {}", consignment_id, e),
        }

        if let Some(entry) = self.model.get_mut(key) {
            let selected = consignments
                .iter()
                .find(|c| c.id == consignment_id)
                .and_then(|c| c.selected_shipping_option.clone())
                .or_else(|| entry.available_shipping_options.iter().find(|o| o.id == option_id).cloned());
            entry.selected_shipping_option = selected;
        }
        self.merge(&consignments);

        let stage = self.current_stage(key);
        self.touch(stage);
        info!(entry = %key, option = %option_id, stage = %stage, "Shipping option selected");

        self.auto_advance(key);
        Ok(())
    }

    /// Set the delivery date of the current entry's line item
    ///
    /// Split siblings share it: the date lives on the cart line item.
    pub async fn select_delivery_date(&mut self, key: &EntryKey, date: NaiveDate) -> Result<(), WizardError> {
        self.last_error = None;
        if !self.settings.delivery_dates_enabled {
            return Err(self.reject(WizardError::FeatureDisabled("delivery dates")));
        }
        if let Err(err) = self.require_current(key) {
            return Err(self.reject(err));
        }

        let value = date.format(DELIVERY_DATE_FORMAT).to_string();
        let cart = match self
            .gateway
            .set_line_item_option(
                &self.cart.id,
                &key.line_item_id,
                &self.settings.delivery_date_option_id,
                &value,
            )
            .await
        {
            Ok(cart) => cart,
            Err(e) => return Err(self.abort(e.into(), true).await),
        };
        self.cart = cart;
        self.model
            .refresh_configured(&self.cart, &self.rules, Some(key));

        let consignment_id = self.model.get(key).and_then(|e| e.consignment_id.clone());
        if let Some(record) = consignment_id.and_then(|id| self.cache.get_by_consignment(&id)) {
            let id = record.consignment_id.clone();
            if let Err(e) = self.cache.put(record.with_delivery_date(Some(value.clone()))) {
                warn!("Failed to cache delivery date for {}: {}", id, e);
            }
        }

        let stage = self.current_stage(key);
        self.touch(stage);
        info!(entry = %key, date = %value, "Delivery date selected");

        self.auto_advance(key);
        Ok(())
    }

    /// Attach a gift message to the current entry's line item
    pub async fn set_gift_message(&mut self, key: &EntryKey, message: &str) -> Result<(), WizardError> {
        self.last_error = None;
        if !self.settings.gift_messages_enabled {
            return Err(self.reject(WizardError::FeatureDisabled("gift messages")));
        }
        if let Err(err) = self.require_current(key) {
            return Err(self.reject(err));
        }

        let cart = match self
            .gateway
            .set_line_item_option(
                &self.cart.id,
                &key.line_item_id,
                &self.settings.gift_message_option_id,
                message,
            )
            .await
        {
            Ok(cart) => cart,
            Err(e) => return Err(self.abort(e.into(), true).await),
        };
        self.cart = cart;
        self.model
            .refresh_configured(&self.cart, &self.rules, Some(key));

        let stage = self.current_stage(key);
        self.touch(stage);
        info!(entry = %key, "Gift message saved");
        Ok(())
    }

    /// Mark the current entry configured and open the next unconfigured one
    pub fn continue_to_next(&mut self) -> Result<Advance, WizardError> {
        self.last_error = None;
        let Some(key) = self.current().cloned() else {
            return Ok(self.open_next());
        };

        let line_item = self.cart.line_item(&key.line_item_id);
        let ready = self
            .model
            .get(&key)
            .map(|entry| is_configured(entry, line_item, &self.rules));
        match ready {
            Some(true) => {}
            Some(false) => return Err(self.reject(WizardError::NotConfigured(key))),
            None => return Err(self.reject(WizardError::UnknownEntry(key.to_string()))),
        }
        if let Some(entry) = self.model.get_mut(&key) {
            entry.configured = true;
        }
        info!(entry = %key, "Item configured");

        self.session = None;
        Ok(self.open_next())
    }

    /// Re-open an already configured entry, by position in the original order
    pub fn edit_existing(&mut self, index: usize) -> Result<(), WizardError> {
        self.last_error = None;
        let Some(key) = self.model.order().get(index).cloned() else {
            return Err(self.reject(WizardError::UnknownEntry(format!("#{}", index))));
        };

        if let Some(session) = &self.session {
            if session.key == key && session.origin == EditOrigin::Existing {
                return Ok(());
            }
            if session.key != key && session.is_mid_edit() {
                let current = session.key.clone();
                return Err(self.reject(WizardError::EditInProgress(current)));
            }
        }

        match self.model.get(&key).map(|entry| entry.configured) {
            Some(true) => {}
            Some(false) => return Err(self.reject(WizardError::NotConfigured(key))),
            None => return Err(self.reject(WizardError::UnknownEntry(key.to_string()))),
        }
        if let Some(entry) = self.model.get_mut(&key) {
            entry.configured = false;
        }

        let stage = self.current_stage(&key);
        info!(entry = %key, "Editing configured item");
        self.session = Some(EditSession::new(key, stage, EditOrigin::Existing));
        Ok(())
    }

    /// Leave edit mode; the entry's configured flag is recomputed from what it holds
    pub fn cancel_edit(&mut self) -> Advance {
        self.last_error = None;
        if let Some(session) = self.session.take() {
            let line_item = self.cart.line_item(&session.key.line_item_id);
            if let Some(entry) = self.model.get_mut(&session.key) {
                entry.configured = is_configured(entry, line_item, &self.rules);
            }
            info!(entry = %session.key, "Edit cancelled");
        }
        self.open_next()
    }

    /// Split a multi-quantity entry into `quantity` single-quantity entries
    ///
    /// Only an unsplit entry without a consignment can be split, into exactly
    /// its quantity. The first sibling is opened for editing; each sibling
    /// gets its consignment on its first address.
    pub fn split_item(&mut self, key: &EntryKey, quantity: u32) -> Result<Vec<EntryKey>, WizardError> {
        self.last_error = None;
        if let Err(err) = self.ensure_editable(key) {
            return Err(self.reject(err));
        }

        let checked = match self.model.get(key) {
            Some(entry) if entry.consignment_id.is_some() => {
                Err(WizardError::HasConsignment(key.clone()))
            }
            Some(entry) if key.is_split() || quantity < 2 || quantity != entry.quantity => {
                Err(WizardError::InvalidSplit {
                    key: key.clone(),
                    quantity,
                })
            }
            Some(_) => Ok(()),
            None => Err(WizardError::UnknownEntry(key.to_string())),
        };
        if let Err(err) = checked {
            return Err(self.reject(err));
        }

        let siblings = match self.model.split(key) {
            Ok(siblings) => siblings,
            Err(_) => {
                return Err(self.reject(WizardError::InvalidSplit {
                    key: key.clone(),
                    quantity,
                }))
            }
        };

        // A record for the whole item no longer describes any consignment
        if let Some(record) = self.cache.get_by_line_item(&key.line_item_id, quantity) {
            if let Err(e) = self.cache.delete(&record.consignment_id) {
                warn!("Failed to drop cache record for {}: {}", record.consignment_id, e);
            }
        }

        info!(entry = %key, quantity, "Split item into single-quantity entries");
        self.session = siblings
            .first()
            .map(|first| EditSession::new(first.clone(), EditStage::AddressPending, EditOrigin::Next));
        Ok(siblings)
    }

    /// Leave the shipping step; navigates exactly once, and only when everything is configured
    pub fn complete(&mut self, is_billing_same_as_shipping: bool) -> Result<(), WizardError> {
        self.last_error = None;
        if self.navigated {
            return Ok(());
        }
        if !self.all_configured() {
            return Err(self.reject(WizardError::Incomplete));
        }
        self.navigator.navigate_next_step(is_billing_same_as_shipping);
        self.navigated = true;
        info!("Shipping step completed");
        Ok(())
    }

    fn open_next(&mut self) -> Advance {
        let next = first_unconfigured_index(self.model.order(), &self.model)
            .and_then(|index| self.model.order().get(index).cloned());
        match next {
            Some(key) => {
                let stage = self.current_stage(&key);
                debug!(entry = %key, stage = %stage, "Opening next item");
                self.session = Some(EditSession::new(key.clone(), stage, EditOrigin::Next));
                Advance::Editing(key)
            }
            None => {
                self.session = None;
                Advance::AllConfigured
            }
        }
    }

    /// Re-derive the session after the model changed underneath it
    fn resume_session(&mut self) {
        match self.session.as_ref().map(|s| s.key.clone()) {
            Some(key) if self.model.contains(&key) => {
                let stage = self.current_stage(&key);
                self.set_stage(stage);
            }
            _ => {
                self.open_next();
            }
        }
    }

    fn current_stage(&self, key: &EntryKey) -> EditStage {
        match self.model.get(key) {
            Some(entry) => stage_for(entry, self.cart.line_item(&key.line_item_id), &self.rules),
            None => EditStage::AddressPending,
        }
    }

    /// Focus `key` unless another entry is mid-edit
    fn ensure_editable(&mut self, key: &EntryKey) -> Result<(), WizardError> {
        let configured = self
            .model
            .get(key)
            .map(|entry| entry.configured)
            .ok_or_else(|| WizardError::UnknownEntry(key.to_string()))?;

        if let Some(session) = &self.session {
            if &session.key == key {
                return Ok(());
            }
            if session.is_mid_edit() {
                return Err(WizardError::EditInProgress(session.key.clone()));
            }
        }
        if configured {
            return Err(WizardError::NotEditing(key.clone()));
        }

        let stage = self.current_stage(key);
        debug!(entry = %key, stage = %stage, "Focusing item");
        self.session = Some(EditSession::new(key.clone(), stage, EditOrigin::Next));
        Ok(())
    }

    fn require_current(&self, key: &EntryKey) -> Result<(), WizardError> {
        if !self.model.contains(key) {
            return Err(WizardError::UnknownEntry(key.to_string()));
        }
        match &self.session {
            Some(session) if &session.key == key => Ok(()),
            _ => Err(WizardError::NotEditing(key.clone())),
        }
    }

    fn set_stage(&mut self, stage: EditStage) {
        if let Some(session) = self.session.as_mut() {
            session.stage = stage;
        }
    }

    fn touch(&mut self, stage: EditStage) {
        if let Some(session) = self.session.as_mut() {
            session.stage = stage;
            session.touched = true;
        }
    }

    fn merge(&mut self, consignments: &[Consignment]) {
        let scope = ReconcileScope::pinned(self.current().cloned());
        self.reconciler
            .merge_snapshot(&self.cart, consignments, &mut self.model, &scope);
    }

    fn auto_advance(&mut self, key: &EntryKey) {
        if self.settings.gift_messages_enabled {
            return;
        }
        let line_item = self.cart.line_item(&key.line_item_id);
        let ready = self
            .model
            .get(key)
            .is_some_and(|entry| is_configured(entry, line_item, &self.rules));
        if ready {
            if let Ok(advance) = self.continue_to_next() {
                debug!(?advance, "Auto-advanced");
            }
        }
    }

    /// Reject an action before any remote call
    fn reject(&mut self, err: WizardError) -> WizardError {
        warn!(kind = ?err.kind(), "Shipping action rejected: {}", err);
        self.last_error = Some(err.user_message());
        err
    }

    /// Abort a failed remote action: report it, then reconcile to clean up
    async fn abort(&mut self, err: WizardError, exit_edit: bool) -> WizardError {
        error!(kind = ?err.kind(), "Shipping action failed: {}", err);
        self.last_error = Some(err.user_message());
        self.error_sink.on_unhandled_error(&err);

        if exit_edit {
            self.session = None;
        }
        let scope = ReconcileScope::pinned(self.current().cloned());
        let report = self
            .reconciler
            .reconcile(&self.cart, &mut self.model, &scope)
            .await;
        debug!(?report, "Reconciled after failure");

        match self.session.as_ref().map(|s| s.key.clone()) {
            Some(key) if self.model.contains(&key) => self.set_stage(EditStage::AddressPending),
            _ => {
                self.open_next();
            }
        }
        err
    }
}
