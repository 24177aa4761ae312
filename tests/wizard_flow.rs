//! End-to-end wizard flows against the in-process checkout gateway
//!
//! ```bash
//! cargo test --test wizard_flow
//! ```

use chrono::NaiveDate;
use std::sync::Arc;

use multiship::api::{ApiError, MockCheckoutGateway, MockOperation};
use multiship::cache::{ConsignmentCache, FileConsignmentCache, InMemoryConsignmentCache};
use multiship::collaborators::{RecordingErrorSink, RecordingNavigator};
use multiship::model::EntryKey;
use multiship::types::{Address, Cart, LineItem, LineItemId, ShippingOption};
use multiship::wizard::{
    Advance, EditStage, ErrorKind, ItemState, ShippingWizard, WizardError, WizardSettings,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn cart(items: &[(&str, u32)]) -> Cart {
    Cart {
        id: "cart-1".to_string(),
        line_items: items
            .iter()
            .enumerate()
            .map(|(i, (id, quantity))| LineItem {
                id: LineItemId::from(*id),
                product_id: i as u64 + 100,
                name: format!("Product {}", id.to_uppercase()),
                quantity: *quantity,
                options: vec![],
            })
            .collect(),
    }
}

fn address(name: &str) -> Address {
    Address {
        first_name: name.to_string(),
        last_name: "Doe".to_string(),
        address1: format!("{} Elm St", name.len()),
        city: "Portland".to_string(),
        state_or_province: "Oregon".to_string(),
        state_or_province_code: "OR".to_string(),
        country_code: "US".to_string(),
        postal_code: "97201".to_string(),
        ..Default::default()
    }
}

fn whole(id: &str) -> EntryKey {
    EntryKey::whole(LineItemId::from(id))
}

struct Harness {
    wizard: ShippingWizard,
    gateway: MockCheckoutGateway,
    cache: Arc<InMemoryConsignmentCache>,
    sink: RecordingErrorSink,
    navigator: RecordingNavigator,
}

async fn harness_with(gateway: MockCheckoutGateway, settings: WizardSettings) -> Harness {
    let cache = Arc::new(InMemoryConsignmentCache::new());
    let sink = RecordingErrorSink::new();
    let navigator = RecordingNavigator::new();
    let mut wizard = ShippingWizard::new(Arc::new(gateway.clone()), cache.clone(), settings)
        .with_error_sink(Arc::new(sink.clone()))
        .with_navigator(Arc::new(navigator.clone()));
    wizard.start().await.unwrap();
    Harness {
        wizard,
        gateway,
        cache,
        sink,
        navigator,
    }
}

async fn harness(items: &[(&str, u32)], settings: WizardSettings) -> Harness {
    harness_with(MockCheckoutGateway::new(cart(items)), settings).await
}

async fn configure(wizard: &mut ShippingWizard, key: &EntryKey, name: &str, option: &str) {
    wizard.select_address(key, address(name)).await.unwrap();
    wizard.select_shipping_option(key, option).await.unwrap();
}

// ─── Main scenario ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_configure_one_item_then_split_another() {
    let mut h = harness(&[("a", 1), ("b", 3)], WizardSettings::default()).await;
    assert_eq!(h.wizard.current(), Some(&whole("a")));

    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;

    assert_eq!(h.wizard.item_state(&whole("a")), Some(ItemState::Configured));
    assert_eq!(h.wizard.current(), Some(&whole("b")));
    assert!(!h.wizard.all_configured());

    let siblings = h.wizard.split_item(&whole("b"), 3).unwrap();
    let keys: Vec<String> = h
        .wizard
        .model()
        .entries()
        .iter()
        .map(|e| e.key.to_string())
        .collect();
    assert_eq!(keys, vec!["a", "b#1", "b#2", "b#3"]);
    assert_eq!(h.wizard.current(), Some(&siblings[0]));
    assert!(siblings
        .iter()
        .all(|k| !h.wizard.model().get(k).unwrap().configured));

    for (i, sibling) in siblings.iter().enumerate() {
        assert_eq!(h.wizard.current(), Some(sibling));
        assert!(!h.wizard.all_configured());
        configure(&mut h.wizard, sibling, &format!("Recipient {}", i), "opt-express").await;
    }

    assert!(h.wizard.all_configured());
    assert!(h.wizard.current().is_none());

    let remote = h.gateway.consignments();
    assert_eq!(remote.len(), 4);
    assert!(remote.iter().all(|c| c.is_complete()));
    let b_quantities: Vec<Option<u32>> = remote
        .iter()
        .filter(|c| c.covers(&LineItemId::from("b")))
        .map(|c| c.quantity_of(&LineItemId::from("b")))
        .collect();
    assert_eq!(b_quantities, vec![Some(1), Some(1), Some(1)]);
    assert_eq!(h.cache.records().len(), 4);
    assert!(h.sink.errors().is_empty());
}

#[tokio::test]
async fn test_next_item_does_not_inherit_selections() {
    let mut h = harness(&[("a", 1), ("b", 1)], WizardSettings::default()).await;
    configure(&mut h.wizard, &whole("a"), "Ann", "opt-express").await;

    assert_eq!(h.wizard.current(), Some(&whole("b")));
    let b = h.wizard.model().get(&whole("b")).unwrap();
    assert!(b.shipping_address.is_none());
    assert!(b.selected_shipping_option.is_none());
    assert_eq!(
        h.wizard.item_state(&whole("b")),
        Some(ItemState::Editing(EditStage::AddressPending))
    );
}

// ─── Single editor ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_only_one_item_mid_edit() {
    let mut h = harness(&[("a", 1), ("b", 1)], WizardSettings::default()).await;
    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;

    h.wizard.select_address(&whole("b"), address("Bo")).await.unwrap();
    let err = h.wizard.edit_existing(0).unwrap_err();
    assert!(matches!(err, WizardError::EditInProgress(ref key) if key == &whole("b")));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.wizard.last_error().is_some());

    // Leaving B lets A be revisited
    assert_eq!(h.wizard.cancel_edit(), Advance::Editing(whole("b")));
    h.wizard.edit_existing(0).unwrap();
    assert_eq!(h.wizard.current(), Some(&whole("a")));
    assert!(!h.wizard.model().get(&whole("a")).unwrap().configured);
    assert!(!h.wizard.all_configured());

    let calls_before = h.gateway.calls().len();
    let err = h
        .wizard
        .select_address(&whole("b"), address("Bo"))
        .await
        .unwrap_err();
    assert!(matches!(err, WizardError::EditInProgress(_)));
    assert_eq!(h.gateway.calls().len(), calls_before);

    // Nothing changed, so continuing re-confirms A
    assert_eq!(h.wizard.continue_to_next().unwrap(), Advance::Editing(whole("b")));
    assert!(h.wizard.model().get(&whole("a")).unwrap().configured);
}

#[tokio::test]
async fn test_second_edit_existing_rejected_while_first_is_open() {
    let mut h = harness(&[("a", 1), ("b", 1)], WizardSettings::default()).await;
    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;
    configure(&mut h.wizard, &whole("b"), "Bo", "opt-express").await;
    assert!(h.wizard.all_configured());

    h.wizard.edit_existing(0).unwrap();
    h.gateway.clear_calls();

    let err = h.wizard.edit_existing(1).unwrap_err();

    assert!(matches!(err, WizardError::EditInProgress(ref key) if key == &whole("a")));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.wizard.model().get(&whole("b")).unwrap().configured);
    assert_eq!(h.wizard.current(), Some(&whole("a")));
    assert!(h.gateway.calls().is_empty());
    assert!(h.sink.errors().is_empty());
}

#[tokio::test]
async fn test_cancel_edit_reevaluates_entry() {
    let mut h = harness(&[("a", 1), ("b", 1)], WizardSettings::default()).await;
    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;

    h.wizard.edit_existing(0).unwrap();
    assert_eq!(
        h.wizard.item_state(&whole("a")),
        Some(ItemState::Editing(EditStage::OptionSelected))
    );

    let advance = h.wizard.cancel_edit();
    assert_eq!(advance, Advance::Editing(whole("b")));
    assert_eq!(h.wizard.item_state(&whole("a")), Some(ItemState::Configured));
}

#[tokio::test]
async fn test_edit_existing_requires_configured_entry() {
    let mut h = harness(&[("a", 1), ("b", 1)], WizardSettings::default()).await;
    let err = h.wizard.edit_existing(1).unwrap_err();
    assert!(matches!(err, WizardError::NotConfigured(_)));

    let err = h.wizard.edit_existing(7).unwrap_err();
    assert!(matches!(err, WizardError::UnknownEntry(_)));
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_address_stays_local() {
    let mut h = harness(&[("a", 1)], WizardSettings::default()).await;
    h.gateway.clear_calls();

    let incomplete = Address {
        first_name: "Ann".to_string(),
        ..Default::default()
    };
    let err = h
        .wizard
        .select_address(&whole("a"), incomplete)
        .await
        .unwrap_err();

    assert!(matches!(err, WizardError::InvalidAddress));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.gateway.calls().is_empty());
    assert!(h.sink.errors().is_empty());
    assert_eq!(
        h.wizard.item_state(&whole("a")),
        Some(ItemState::Editing(EditStage::AddressPending))
    );
    assert!(h.wizard.last_error().is_some());
}

#[tokio::test]
async fn test_address_failure_reports_and_keeps_item_open() {
    let mut h = harness(&[("a", 1), ("b", 1)], WizardSettings::default()).await;
    h.gateway.fail_next(
        MockOperation::CreateConsignment,
        ApiError::network("consignments", "connection reset"),
    );

    let err = h
        .wizard
        .select_address(&whole("a"), address("Ann"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(h.sink.errors().len(), 1);
    assert_eq!(
        h.wizard.last_error(),
        Some("We could not reach the checkout service. Please try again.")
    );
    assert_eq!(h.wizard.current(), Some(&whole("a")));
    assert_eq!(
        h.wizard.item_state(&whole("a")),
        Some(ItemState::Editing(EditStage::AddressPending))
    );
    assert!(h.wizard.model().get(&whole("a")).unwrap().consignment_id.is_none());
    // A reconciliation pass followed the failure
    assert_eq!(h.gateway.calls_for(MockOperation::ListConsignments).len(), 2);

    // The next attempt goes through
    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;
    assert_eq!(h.wizard.current(), Some(&whole("b")));
    assert!(h.wizard.last_error().is_none());
}

#[tokio::test]
async fn test_option_requires_address_first() {
    let mut h = harness(&[("a", 1)], WizardSettings::default()).await;
    let err = h
        .wizard
        .select_shipping_option(&whole("a"), "opt-ground")
        .await
        .unwrap_err();
    assert!(matches!(err, WizardError::MissingSelection(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.gateway.calls_for(MockOperation::SetShippingOption).is_empty());
}

// ─── Capabilities ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delivery_date_completes_item() {
    let settings = WizardSettings {
        delivery_dates_enabled: true,
        ..WizardSettings::default()
    };
    let mut h = harness(&[("a", 1), ("b", 1)], settings).await;

    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;
    assert_eq!(h.wizard.current(), Some(&whole("a")));
    assert_eq!(
        h.wizard.item_state(&whole("a")),
        Some(ItemState::Editing(EditStage::DatePending))
    );

    let date = NaiveDate::from_ymd_opt(2026, 12, 24).unwrap();
    h.wizard.select_delivery_date(&whole("a"), date).await.unwrap();

    let calls = h.gateway.calls_for(MockOperation::SetLineItemOption);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec!["cart-1", "a", "delivery_date", "12/24/2026"]);
    assert_eq!(h.wizard.current(), Some(&whole("b")));
    assert_eq!(
        h.wizard.model().get(&whole("a")).unwrap().delivery_date.as_deref(),
        Some("12/24/2026")
    );

    let record = h
        .cache
        .get_by_line_item(&LineItemId::from("a"), 1)
        .unwrap();
    assert_eq!(record.selected_delivery_date.as_deref(), Some("12/24/2026"));
}

#[tokio::test]
async fn test_gift_messages_hold_auto_advance() {
    let settings = WizardSettings {
        gift_messages_enabled: true,
        ..WizardSettings::default()
    };
    let mut h = harness(&[("a", 1), ("b", 1)], settings).await;

    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;
    assert_eq!(h.wizard.current(), Some(&whole("a")));
    assert_eq!(
        h.wizard.item_state(&whole("a")),
        Some(ItemState::Editing(EditStage::OptionSelected))
    );

    h.wizard
        .set_gift_message(&whole("a"), "Happy birthday!")
        .await
        .unwrap();
    let item = h.wizard.cart().line_item(&LineItemId::from("a")).unwrap();
    assert_eq!(item.gift_message("gift_message"), Some("Happy birthday!"));

    assert_eq!(h.wizard.continue_to_next().unwrap(), Advance::Editing(whole("b")));
    assert_eq!(h.wizard.item_state(&whole("a")), Some(ItemState::Configured));
}

#[tokio::test]
async fn test_recommended_option_selected_automatically() {
    let gateway = MockCheckoutGateway::new(cart(&[("a", 1), ("b", 1)])).with_shipping_options(vec![
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
            is_recommended: true,
            ..Default::default()
        },
    ]);
    let settings = WizardSettings {
        auto_recommend_option: true,
        ..WizardSettings::default()
    };
    let mut h = harness_with(gateway, settings).await;

    h.wizard.select_address(&whole("a"), address("Ann")).await.unwrap();

    let a = h.wizard.model().get(&whole("a")).unwrap();
    assert_eq!(a.selected_shipping_option.as_ref().unwrap().id, "opt-express");
    assert!(a.configured);
    assert_eq!(h.wizard.current(), Some(&whole("b")));
}

// ─── Completion ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_complete_navigates_once() {
    let mut h = harness(&[("a", 1)], WizardSettings::default()).await;
    assert!(matches!(h.wizard.complete(true), Err(WizardError::Incomplete)));
    assert!(h.navigator.calls().is_empty());

    configure(&mut h.wizard, &whole("a"), "Ann", "opt-ground").await;
    h.wizard.complete(true).unwrap();
    h.wizard.complete(false).unwrap();

    assert_eq!(h.navigator.calls(), vec![true]);
    assert!(h.wizard.is_navigated());
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cached_selection_survives_platform_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consignments").join("checkout-1.json");
    let gateway = MockCheckoutGateway::new(cart(&[("a", 1)]));

    {
        let cache = Arc::new(FileConsignmentCache::open(&path).unwrap());
        let mut wizard =
            ShippingWizard::new(Arc::new(gateway.clone()), cache, WizardSettings::default());
        wizard.start().await.unwrap();
        configure(&mut wizard, &whole("a"), "Ann", "opt-express").await;
        assert!(wizard.all_configured());
    }

    let consignment_id = gateway.consignments()[0].id.clone();
    gateway.drop_selected_option(&consignment_id);
    gateway.clear_calls();

    let cache = Arc::new(FileConsignmentCache::open(&path).unwrap());
    let mut wizard = ShippingWizard::new(Arc::new(gateway.clone()), cache, WizardSettings::default());
    let report = wizard.start().await.unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(report.deleted, 0);
    let calls = gateway.calls_for(MockOperation::SetShippingOption);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![consignment_id.to_string(), "opt-express".to_string()]);
    assert!(wizard.all_configured());
    assert!(wizard.current().is_none());
}
