//! Consignment reconciliation.
//!
//! Brings the remote consignment list and the local configuration model back
//! into agreement after any state-changing action or on load. A pass:
//!
//! 1. deletes consignments covering more than one line item
//! 2. replays cached shipping options onto incomplete consignments
//! 3. recreates consignments the platform evicted, from cache
//! 4. re-fetches when anything was attempted
//! 5. deletes consignments that are still incomplete
//! 6. lays out entries from the snapshot and merges them into the model
//!
//! Individual failures are logged and counted; a pass never aborts midway.

mod layout;

pub use layout::{build_entries, merge_entries};

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::CheckoutGateway;
use crate::cache::{ConsignmentCache, PersistedRecord};
use crate::model::{CompletionRules, EntryKey, ItemConfigurationModel};
use crate::types::{Cart, Consignment, ConsignmentId, LineItemId};

/// Context of the action that triggered a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileScope {
    /// Entry currently being edited; its local state survives the merge
    pub pinned: Option<EntryKey>,
    /// Line items of a multi-item consignment deliberately kept while a split is applied
    pub split_in_flight: Option<BTreeSet<LineItemId>>,
}

impl ReconcileScope {
    pub fn pinned(key: Option<EntryKey>) -> Self {
        Self {
            pinned: key,
            split_in_flight: None,
        }
    }

    fn keeps_multi_item(&self, consignment: &Consignment) -> bool {
        let ids: BTreeSet<LineItemId> = consignment.line_item_ids().into_iter().cloned().collect();
        self.split_in_flight.as_ref() == Some(&ids)
    }
}

/// What a pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub restored: usize,
    pub deleted: usize,
    pub split_resets: usize,
    pub resurrected: usize,
    pub failures: usize,
    /// The consignment list could not be read; local state was kept as is
    pub remote_unavailable: bool,
}

impl ReconcileReport {
    /// Incomplete consignments either completed from cache or removed
    pub fn incomplete_handled(&self) -> usize {
        self.restored + self.deleted
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0 && !self.remote_unavailable
    }
}

/// Reconciles remote consignments against the local model and cache
pub struct Reconciler {
    gateway: Arc<dyn CheckoutGateway>,
    cache: Arc<dyn ConsignmentCache>,
    rules: CompletionRules,
    resurrect_from_cache: bool,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn CheckoutGateway>,
        cache: Arc<dyn ConsignmentCache>,
        rules: CompletionRules,
    ) -> Self {
        Self {
            gateway,
            cache,
            rules,
            resurrect_from_cache: true,
        }
    }

    pub fn with_resurrection(mut self, enabled: bool) -> Self {
        self.resurrect_from_cache = enabled;
        self
    }

    pub fn rules(&self) -> &CompletionRules {
        &self.rules
    }

    /// Run a full reconciliation pass and update `model` in place
    pub async fn reconcile(
        &self,
        cart: &Cart,
        model: &mut ItemConfigurationModel,
        scope: &ReconcileScope,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut consignments = match self.gateway.list_consignments().await {
            Ok(consignments) => consignments,
            Err(e) => {
                warn!("Could not list consignments, keeping local state: {}", e);
                report.failures += 1;
                report.remote_unavailable = true;
                model.ensure_line_items(cart);
                model.refresh_configured(cart, &self.rules, scope.pinned.as_ref());
                return report;
            }
        };
        debug!(count = consignments.len(), "Reconciling consignments");
        self.fill_quantities(&mut consignments);

        let reset = self
            .remove_multi_item(&mut consignments, scope, &mut report)
            .await;

        let mut attempted = self
            .restore_incomplete(cart, &consignments, &mut report)
            .await;
        if self.resurrect_from_cache {
            attempted |= self
                .resurrect_missing(cart, &consignments, model, scope, &mut report)
                .await;
        }

        let mut refreshed = true;
        if attempted {
            match self.gateway.list_consignments().await {
                Ok(fresh) => {
                    consignments = fresh
                        .into_iter()
                        .filter(|c| !c.is_multi_item() || scope.keeps_multi_item(c))
                        .collect();
                    self.fill_quantities(&mut consignments);
                }
                Err(e) => {
                    // Which restorations landed is unknown; leave them for the next pass
                    warn!("Could not re-fetch consignments after restoring: {}", e);
                    report.failures += 1;
                    refreshed = false;
                    consignments.retain(Consignment::is_complete);
                }
            }
        }

        if refreshed {
            self.delete_incomplete(&mut consignments, &mut report).await;
        }

        self.apply_snapshot(cart, &consignments, model, scope, &reset);

        if report.incomplete_handled() + report.split_resets + report.resurrected > 0
            || report.failures > 0
        {
            info!(
                restored = report.restored,
                deleted = report.deleted,
                split_resets = report.split_resets,
                resurrected = report.resurrected,
                failures = report.failures,
                "Reconciliation pass finished"
            );
        }
        report
    }

    /// Lay out and merge a consignment snapshot without touching the remote side
    ///
    /// Used after a successful wizard action, whose response already carries
    /// the platform's consignment list.
    pub fn merge_snapshot(
        &self,
        cart: &Cart,
        consignments: &[Consignment],
        model: &mut ItemConfigurationModel,
        scope: &ReconcileScope,
    ) {
        let mut consignments: Vec<Consignment> = consignments
            .iter()
            .filter(|c| !c.is_multi_item() || scope.keeps_multi_item(c))
            .cloned()
            .collect();
        self.fill_quantities(&mut consignments);
        self.apply_snapshot(cart, &consignments, model, scope, &HashSet::new());
    }

    /// Take quantities the gateway leaves out from each consignment's cache record
    ///
    /// The storefront lists only line item ids, so a split sibling would
    /// otherwise read as covering its item's full quantity.
    fn fill_quantities(&self, consignments: &mut [Consignment]) {
        for consignment in consignments.iter_mut().filter(|c| !c.is_multi_item()) {
            if consignment.line_items.iter().all(|li| li.quantity.is_some()) {
                continue;
            }
            let Some(record) = self.cache.get_by_consignment(&consignment.id) else {
                continue;
            };
            for line_item in &mut consignment.line_items {
                if line_item.quantity.is_none() && line_item.item_id == record.line_item_id {
                    line_item.quantity = Some(record.quantity);
                }
            }
        }
    }

    fn apply_snapshot(
        &self,
        cart: &Cart,
        consignments: &[Consignment],
        model: &mut ItemConfigurationModel,
        scope: &ReconcileScope,
        reset: &HashSet<LineItemId>,
    ) {
        let incoming = build_entries(cart, consignments, model, &self.rules);
        let live: HashSet<&ConsignmentId> = consignments.iter().map(|c| &c.id).collect();
        merge_entries(model, incoming, scope.pinned.as_ref(), reset, &live);
        model.refresh_configured(cart, &self.rules, scope.pinned.as_ref());
    }

    /// Delete consignments covering several line items; returns the items to reset
    async fn remove_multi_item(
        &self,
        consignments: &mut Vec<Consignment>,
        scope: &ReconcileScope,
        report: &mut ReconcileReport,
    ) -> HashSet<LineItemId> {
        let mut reset = HashSet::new();
        let mut kept = Vec::with_capacity(consignments.len());

        for consignment in std::mem::take(consignments) {
            if !consignment.is_multi_item() {
                kept.push(consignment);
                continue;
            }
            if scope.keeps_multi_item(&consignment) {
                debug!(consignment = %consignment.id, "Keeping multi-item consignment during split");
                kept.push(consignment);
                continue;
            }

            match self.gateway.delete_consignment(&consignment.id).await {
                Ok(()) => {
                    info!(consignment = %consignment.id, "Deleted multi-item consignment");
                    report.split_resets += 1;
                }
                Err(e) => {
                    warn!("Failed to delete multi-item consignment {}: {}", consignment.id, e);
                    report.failures += 1;
                }
            }
            if let Err(e) = self.cache.delete(&consignment.id) {
                warn!("Failed to purge cache record for {}: {}", consignment.id, e);
            }
            reset.extend(consignment.line_item_ids().into_iter().cloned());
        }

        *consignments = kept;
        reset
    }

    /// Replay cached options onto incomplete consignments; returns whether any call was made
    async fn restore_incomplete(
        &self,
        cart: &Cart,
        consignments: &[Consignment],
        report: &mut ReconcileReport,
    ) -> bool {
        let live: HashSet<&ConsignmentId> = consignments.iter().map(|c| &c.id).collect();
        let mut claimed: HashSet<ConsignmentId> = HashSet::new();
        let mut attempted = false;

        for consignment in consignments
            .iter()
            .filter(|c| !c.is_complete() && !c.is_multi_item())
        {
            let Some(line_item) = consignment.sole_line_item() else {
                continue;
            };
            let quantity = line_item
                .quantity
                .or_else(|| cart.line_item(&line_item.item_id).map(|i| i.quantity))
                .unwrap_or(1);

            let record = self
                .cache
                .get_by_consignment(&consignment.id)
                .or_else(|| self.unclaimed_record(&line_item.item_id, quantity, &live, &claimed))
                .filter(PersistedRecord::is_replayable);
            let Some(record) = record else {
                debug!(consignment = %consignment.id, "No cached option to restore");
                continue;
            };
            claimed.insert(record.consignment_id.clone());
            attempted = true;

            match self
                .gateway
                .set_shipping_option(&consignment.id, &record.selected_shipping_option_id)
                .await
            {
                Ok(_) => {
                    info!(
                        consignment = %consignment.id,
                        option = %record.selected_shipping_option_id,
                        "Restored shipping option from cache"
                    );
                    report.restored += 1;
                    if record.consignment_id != consignment.id {
                        self.rebind(record, &consignment.id);
                    }
                }
                Err(e) => {
                    warn!("Failed to restore shipping option on {}: {}", consignment.id, e);
                    report.failures += 1;
                }
            }
        }

        attempted
    }

    /// Latest record for (line item, quantity) that no live consignment owns
    fn unclaimed_record(
        &self,
        line_item_id: &LineItemId,
        quantity: u32,
        live: &HashSet<&ConsignmentId>,
        claimed: &HashSet<ConsignmentId>,
    ) -> Option<PersistedRecord> {
        let free = |r: &PersistedRecord| !live.contains(&r.consignment_id) && !claimed.contains(&r.consignment_id);
        self.cache
            .get_by_line_item(line_item_id, quantity)
            .filter(|r| free(r))
            .or_else(|| {
                self.cache
                    .records()
                    .into_iter()
                    .filter(|r| &r.line_item_id == line_item_id && r.quantity == quantity && free(r))
                    .max_by_key(|r| r.updated_at)
            })
    }

    /// Move a cache record to the consignment that now carries it
    fn rebind(&self, record: PersistedRecord, consignment_id: &ConsignmentId) {
        let previous = record.consignment_id.clone();
        let rebound = PersistedRecord::new(
            consignment_id.clone(),
            record.line_item_id,
            record.quantity,
            record.shipping_address,
            record.selected_shipping_option_id,
        )
        .with_delivery_date(record.selected_delivery_date);

        if let Err(e) = self.cache.delete(&previous) {
            warn!("Failed to drop cache record for {}: {}", previous, e);
        }
        if let Err(e) = self.cache.put(rebound) {
            warn!("Failed to cache record for {}: {}", consignment_id, e);
        }
    }

    /// Recreate consignments the platform evicted for unsplit items; returns whether any call was made
    async fn resurrect_missing(
        &self,
        cart: &Cart,
        consignments: &[Consignment],
        model: &ItemConfigurationModel,
        scope: &ReconcileScope,
        report: &mut ReconcileReport,
    ) -> bool {
        let mut live: HashSet<ConsignmentId> = consignments.iter().map(|c| c.id.clone()).collect();
        let mut attempted = false;

        for item in &cart.line_items {
            if model.is_split(&item.id)
                || scope.pinned.as_ref().is_some_and(|k| k.line_item_id == item.id)
                || consignments.iter().any(|c| c.covers(&item.id))
            {
                continue;
            }
            let Some(record) = self
                .cache
                .get_by_line_item(&item.id, item.quantity)
                .filter(PersistedRecord::is_replayable)
            else {
                continue;
            };
            attempted = true;

            let created = match self
                .gateway
                .create_consignment(&record.shipping_address, &item.id, item.quantity)
                .await
            {
                Ok(list) => list
                    .into_iter()
                    .find(|c| !c.is_multi_item() && c.covers(&item.id) && !live.contains(&c.id)),
                Err(e) => {
                    warn!("Failed to recreate consignment for {}: {}", item.id, e);
                    report.failures += 1;
                    continue;
                }
            };
            let Some(created) = created else {
                warn!("Platform did not return a consignment for {}", item.id);
                report.failures += 1;
                continue;
            };
            live.insert(created.id.clone());

            match self
                .gateway
                .set_shipping_option(&created.id, &record.selected_shipping_option_id)
                .await
            {
                Ok(_) => {
                    info!(
                        line_item = %item.id,
                        consignment = %created.id,
                        "Recreated evicted consignment from cache"
                    );
                    report.resurrected += 1;
                    self.rebind(record, &created.id);
                }
                Err(e) => {
                    warn!("Failed to restore shipping option on {}: {}", created.id, e);
                    report.failures += 1;
                }
            }
        }

        attempted
    }

    /// Delete consignments still missing a shipping option and purge their cache records
    async fn delete_incomplete(&self, consignments: &mut Vec<Consignment>, report: &mut ReconcileReport) {
        let (complete, incomplete): (Vec<Consignment>, Vec<Consignment>) = std::mem::take(consignments)
            .into_iter()
            .partition(|c| c.is_complete() || c.is_multi_item());

        for consignment in incomplete {
            match self.gateway.delete_consignment(&consignment.id).await {
                Ok(()) => {
                    info!(consignment = %consignment.id, "Deleted incomplete consignment");
                    report.deleted += 1;
                    if let Err(e) = self.cache.delete(&consignment.id) {
                        warn!("Failed to purge cache record for {}: {}", consignment.id, e);
                    }
                }
                Err(e) => {
                    warn!("Failed to delete incomplete consignment {}: {}", consignment.id, e);
                    report.failures += 1;
                }
            }
        }

        *consignments = complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockCheckoutGateway, MockOperation};
    use crate::cache::InMemoryConsignmentCache;
    use crate::model::all_configured;
    use crate::types::{Address, ConsignmentLineItem, LineItem, ShippingOption};

    fn cart(items: &[(&str, u32)]) -> Cart {
        Cart {
            id: "cart-1".to_string(),
            line_items: items
                .iter()
                .map(|(id, qty)| LineItem {
                    id: LineItemId::from(*id),
                    product_id: 1,
                    name: id.to_uppercase(),
                    quantity: *qty,
                    options: vec![],
                })
                .collect(),
        }
    }

    fn address(name: &str) -> Address {
        Address {
            first_name: name.to_string(),
            address1: "1 Main St".to_string(),
            ..Default::default()
        }
    }

    fn option(id: &str) -> ShippingOption {
        ShippingOption {
            id: id.to_string(),
            description: id.to_string(),
            ..Default::default()
        }
    }

    fn remote(id: &str, items: &[&str], selected: Option<&str>) -> Consignment {
        Consignment {
            id: ConsignmentId::from(id),
            line_items: items
                .iter()
                .map(|i| ConsignmentLineItem {
                    item_id: LineItemId::from(*i),
                    quantity: None,
                })
                .collect(),
            shipping_address: Some(address("Ann")),
            selected_shipping_option: selected.map(option),
            available_shipping_options: vec![option("opt-1"), option("opt-9")],
        }
    }

    fn setup(cart: &Cart) -> (MockCheckoutGateway, Arc<InMemoryConsignmentCache>, Reconciler) {
        let gateway = MockCheckoutGateway::new(cart.clone());
        let cache = Arc::new(InMemoryConsignmentCache::new());
        let reconciler = Reconciler::new(
            Arc::new(gateway.clone()),
            cache.clone(),
            CompletionRules::default(),
        );
        (gateway, cache, reconciler)
    }

    #[tokio::test]
    async fn test_restores_cached_option_exactly_once() {
        let cart = cart(&[("li-1", 1)]);
        let (gateway, cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-1", &["li-1"], None));
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-1"),
                LineItemId::from("li-1"),
                1,
                address("Ann"),
                "opt-9",
            ))
            .unwrap();

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        let calls = gateway.calls_for(MockOperation::SetShippingOption);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["c-1", "opt-9"]);
        assert!(gateway.calls_for(MockOperation::DeleteConsignment).is_empty());
        assert_eq!(report.restored, 1);
        assert_eq!(report.incomplete_handled(), 1);

        let entry = model.get(&EntryKey::whole(LineItemId::from("li-1"))).unwrap();
        assert!(entry.configured);
        assert_eq!(entry.selected_shipping_option.as_ref().unwrap().id, "opt-9");
    }

    #[tokio::test]
    async fn test_deletes_incomplete_without_cache_record() {
        let cart = cart(&[("li-1", 1)]);
        let (gateway, cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-1", &["li-1"], None));
        // A record under another line item does not count
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-7"),
                LineItemId::from("li-2"),
                1,
                address("Bo"),
                "opt-1",
            ))
            .unwrap();

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.deleted, 1);
        assert!(gateway.consignments().is_empty());
        assert!(cache.get_by_consignment(&ConsignmentId::from("c-1")).is_none());
        let entry = model.get(&EntryKey::whole(LineItemId::from("li-1"))).unwrap();
        assert!(entry.consignment_id.is_none());
        assert!(!entry.configured);
    }

    #[tokio::test]
    async fn test_restores_by_line_item_for_a_replaced_consignment() {
        let cart = cart(&[("li-1", 2)]);
        let (gateway, cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-2", &["li-1"], None));
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-old"),
                LineItemId::from("li-1"),
                2,
                address("Ann"),
                "opt-1",
            ))
            .unwrap();

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.restored, 1);
        assert!(cache.get_by_consignment(&ConsignmentId::from("c-old")).is_none());
        let rebound = cache.get_by_consignment(&ConsignmentId::from("c-2")).unwrap();
        assert_eq!(rebound.selected_shipping_option_id, "opt-1");
    }

    #[tokio::test]
    async fn test_quantity_less_sibling_keeps_split_layout() {
        let cart = cart(&[("b", 2)]);
        let (gateway, cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-1", &["b"], None));
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-1"),
                LineItemId::from("b"),
                1,
                address("Ann"),
                "opt-1",
            ))
            .unwrap();

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.restored, 1);
        let keys: Vec<String> = model.entries().iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["b#1", "b#2"]);
        let first = model.get(&EntryKey::slot(LineItemId::from("b"), 1)).unwrap();
        assert_eq!(first.quantity, 1);
        assert!(first.configured);
        assert!(!all_configured(&model, &cart, reconciler.rules()));
    }

    #[tokio::test]
    async fn test_multi_item_consignment_is_deleted_and_items_reset() {
        let cart = cart(&[("a", 1), ("b", 1)]);
        let (gateway, _cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-ab", &["a", "b"], Some("opt-1")));

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.split_resets, 1);
        assert!(gateway.consignments().is_empty());
        assert_eq!(model.len(), 2);
        assert!(model.entries().iter().all(|e| e.consignment_id.is_none()));
    }

    #[tokio::test]
    async fn test_split_in_flight_keeps_matching_consignment() {
        let cart = cart(&[("a", 1), ("b", 1)]);
        let (gateway, _cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-ab", &["a", "b"], Some("opt-1")));

        let scope = ReconcileScope {
            pinned: None,
            split_in_flight: Some(
                [LineItemId::from("a"), LineItemId::from("b")]
                    .into_iter()
                    .collect(),
            ),
        };
        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler.reconcile(&cart, &mut model, &scope).await;

        assert_eq!(report.split_resets, 0);
        assert_eq!(gateway.consignments().len(), 1);
        assert!(gateway.calls_for(MockOperation::DeleteConsignment).is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let cart = cart(&[("a", 1), ("b", 1), ("c", 1)]);
        let (gateway, _cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-a", &["a"], Some("opt-1")));
        gateway.insert_consignment(remote("c-b", &["b"], None));

        let mut model = ItemConfigurationModel::from_cart(&cart);
        reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;
        let after_first = model.clone();
        let remote_after_first = gateway.consignments();
        gateway.clear_calls();

        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report, ReconcileReport::default());
        assert_eq!(model, after_first);
        assert_eq!(gateway.consignments(), remote_after_first);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_one_entry_per_unsplit_item_in_cart_order() {
        let cart = cart(&[("a", 1), ("b", 2), ("c", 1)]);
        let (gateway, _cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-c", &["c"], Some("opt-1")));

        let mut model = ItemConfigurationModel::from_cart(&cart);
        reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        let keys: Vec<String> = model.entries().iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(!all_configured(&model, &cart, reconciler.rules()));
    }

    #[tokio::test]
    async fn test_restore_failure_is_tolerated() {
        let cart = cart(&[("a", 1), ("b", 1)]);
        let (gateway, cache, reconciler) = setup(&cart);
        gateway.insert_consignment(remote("c-a", &["a"], None));
        gateway.insert_consignment(remote("c-b", &["b"], None));
        for (id, item) in [("c-a", "a"), ("c-b", "b")] {
            cache
                .put(PersistedRecord::new(
                    ConsignmentId::from(id),
                    LineItemId::from(item),
                    1,
                    address("Ann"),
                    "opt-1",
                ))
                .unwrap();
        }
        gateway.fail_next(
            MockOperation::SetShippingOption,
            ApiError::http("consignments", 500, "boom"),
        );

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.restored, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures, 1);
        let remaining = gateway.consignments();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_complete());
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_local_state() {
        let cart = cart(&[("a", 1)]);
        let (gateway, _cache, reconciler) = setup(&cart);
        gateway.fail_next(
            MockOperation::ListConsignments,
            ApiError::network("consignments", "connection reset"),
        );

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert!(report.remote_unavailable);
        assert!(!report.is_clean());
        assert_eq!(model.len(), 1);
    }

    #[tokio::test]
    async fn test_resurrects_evicted_consignment() {
        let cart = cart(&[("a", 1)]);
        let (gateway, cache, reconciler) = setup(&cart);
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-gone"),
                LineItemId::from("a"),
                1,
                address("Ann"),
                "opt-ground",
            ))
            .unwrap();

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.resurrected, 1);
        let remote = gateway.consignments();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].selected_shipping_option.as_ref().unwrap().id, "opt-ground");
        assert!(cache.get_by_consignment(&ConsignmentId::from("c-gone")).is_none());
        assert!(cache.get_by_consignment(&remote[0].id).is_some());
        assert!(model.get(&EntryKey::whole(LineItemId::from("a"))).unwrap().configured);
    }

    #[tokio::test]
    async fn test_resurrection_can_be_disabled() {
        let cart = cart(&[("a", 1)]);
        let (gateway, cache, reconciler) = setup(&cart);
        let reconciler = reconciler.with_resurrection(false);
        cache
            .put(PersistedRecord::new(
                ConsignmentId::from("c-gone"),
                LineItemId::from("a"),
                1,
                address("Ann"),
                "opt-ground",
            ))
            .unwrap();

        let mut model = ItemConfigurationModel::from_cart(&cart);
        let report = reconciler
            .reconcile(&cart, &mut model, &ReconcileScope::default())
            .await;

        assert_eq!(report.resurrected, 0);
        assert!(gateway.consignments().is_empty());
    }
}
