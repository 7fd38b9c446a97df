//! End-to-end lifecycle tests against the in-memory charger client

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use wattpilot_client::testing::MockCharger;
use wattpilot_client::ChargerClient;
use wattpilot_entities::EntityStateStore;
use wattpilot_entry::{apply_options, entry_diagnostics, setup_entry, unload_entry, ConfigEntry};

fn charger() -> Arc<MockCharger> {
    Arc::new(
        MockCharger::new("12345678")
            .with_property("fwv", json!("40.7"))
            .with_property("car", json!(1))
            .with_property("acu", json!(16))
            .with_property("fup", json!(false))
            .with_property("lmo", json!(3))
            .with_property("amp", json!(16))
            .with_property("ocu", json!(["38.5", "40.7"]))
            .with_property("tma", json!([23.5, 24.0]))
            .with_property("cak", json!("certificate"))
            .with_named_value("variant", json!("11 kW")),
    )
}

async fn wait_for_state(store: &EntityStateStore, unique_id: &str, want: &str) {
    for _ in 0..100 {
        if store.get_state(unique_id).as_deref() == Some(want) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "state of {unique_id} never became {want:?}, last seen {:?}",
        store.get_state(unique_id)
    );
}

#[tokio::test]
async fn test_setup_seeds_all_platform_states() {
    let mock = charger();
    let entry = ConfigEntry::new("Garage charger");
    let client: Arc<dyn ChargerClient> = mock.clone();
    let runtime = setup_entry(&entry, client).await.unwrap();

    let store = &runtime.store;
    assert_eq!(store.get_state("12345678_fwv").as_deref(), Some("40.7"));
    assert_eq!(store.get_state("12345678_car").as_deref(), Some("Idle"));
    assert_eq!(store.get_state("12345678_acu").as_deref(), Some("16"));
    assert_eq!(store.get_state("12345678_fup").as_deref(), Some("off"));
    assert_eq!(store.get_state("12345678_lmo").as_deref(), Some("Default"));
    assert_eq!(store.get_state("12345678_tma").as_deref(), Some("23.5"));
    assert_eq!(store.get_state("12345678_variant").as_deref(), Some("11 kW"));
    // The update entity reports the newest advertised firmware
    assert_eq!(store.get_state("12345678_ocu").as_deref(), Some("40.7"));

    unload_entry(&entry.entry_id, runtime).await;
}

#[tokio::test]
async fn test_pushed_property_reaches_the_entity_state() {
    let mock = charger();
    let entry = ConfigEntry::new("Garage charger");
    let client: Arc<dyn ChargerClient> = mock.clone();
    let runtime = setup_entry(&entry, client).await.unwrap();

    mock.push_property("car", json!(2));
    wait_for_state(&runtime.store, "12345678_car", "Charging").await;

    unload_entry(&entry.entry_id, runtime).await;
}

#[tokio::test]
async fn test_unload_stops_the_dispatcher_and_disconnects() {
    let mock = charger();
    let entry = ConfigEntry::new("Garage charger");
    let client: Arc<dyn ChargerClient> = mock.clone();
    let runtime = setup_entry(&entry, client).await.unwrap();

    let store = runtime.store.clone();
    unload_entry(&entry.entry_id, runtime).await;
    assert!(!mock.connected());
    assert!(store.is_empty());

    // Events pushed after unload no longer reach the store
    mock.push_property("car", json!(2));
    sleep(Duration::from_millis(50)).await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_apply_options_rebuilds_with_new_parameters() {
    let mock = charger();
    let mut entry = ConfigEntry::new("Garage charger").with_options(HashMap::from([
        ("timeout".to_string(), json!(5)),
        ("poll_interval".to_string(), json!(60)),
    ]));
    let client: Arc<dyn ChargerClient> = mock.clone();
    let runtime = setup_entry(&entry, client).await.unwrap();
    assert_eq!(runtime.params.timeout, 30);

    let runtime = apply_options(&mut entry, runtime).await.unwrap();
    assert_eq!(runtime.params.timeout, 5);
    assert_eq!(runtime.params.poll_interval, 60);
    assert!(mock.connected());
    assert_eq!(runtime.store.get_state("12345678_car").as_deref(), Some("Idle"));

    unload_entry(&entry.entry_id, runtime).await;
}

#[tokio::test]
async fn test_diagnostics_redact_credentials_and_properties() {
    let mock = charger();
    let entry = ConfigEntry::new("Garage charger").with_data(HashMap::from([
        ("ip_address".to_string(), json!("192.168.1.50")),
        ("password".to_string(), json!("hunter2")),
        ("serial".to_string(), json!("12345678")),
        ("timeout".to_string(), json!(30)),
    ]));
    let client: Arc<dyn ChargerClient> = mock.clone();
    let runtime = setup_entry(&entry, client).await.unwrap();

    let diag = entry_diagnostics(&entry, &runtime);
    assert_eq!(diag["config"]["data"]["ip_address"], json!("**REDACTED**"));
    assert_eq!(diag["config"]["data"]["password"], json!("**REDACTED**"));
    assert_eq!(diag["config"]["data"]["timeout"], json!(30));
    assert_eq!(diag["charger_properties"]["cak"], json!("**REDACTED**"));
    assert_eq!(diag["charger_properties"]["acu"], json!(16));
    assert_eq!(diag["charger_info"]["serial"], json!("**REDACTED**"));

    unload_entry(&entry.entry_id, runtime).await;
}
