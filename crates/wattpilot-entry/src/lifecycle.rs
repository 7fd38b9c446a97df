//! Entry lifecycle: setup, unload and options reload
//!
//! Setup connects the charger, builds every platform from the bundled YAML
//! definitions, seeds the initial states through one pull pass and then
//! hands updates over to the background tasks (push dispatcher and pull
//! poller). Unload is the reverse: signal shutdown, await the tasks, drop
//! the registrations and states, disconnect.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use wattpilot_client::{ChargerClient, ClientError};
use wattpilot_core::Source;
use wattpilot_entities::{setup, spawn_dispatcher, ChargerEntity, EntityStateStore, PushRegistry};

use crate::entry::ConfigEntry;
use crate::runtime::RuntimeData;

const SENSOR_YAML: &str = include_str!("../config/sensor.yaml");
const SWITCH_YAML: &str = include_str!("../config/switch.yaml");
const SELECT_YAML: &str = include_str!("../config/select.yaml");
const NUMBER_YAML: &str = include_str!("../config/number.yaml");
const BUTTON_YAML: &str = include_str!("../config/button.yaml");
const UPDATE_YAML: &str = include_str!("../config/update.yaml");

/// Errors that keep an entry from loading
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("connecting to the charger failed: {0}")]
    Connect(#[source] ClientError),
}

/// Set up a charger from its config entry.
///
/// Entities that fail to initialize are excluded by their platform setup;
/// only a failed connection aborts the entry.
pub async fn setup_entry(
    entry: &ConfigEntry,
    charger: Arc<dyn ChargerClient>,
) -> Result<RuntimeData, SetupError> {
    let entry_id = entry.entry_id.as_str();
    debug!(entry_id, title = %entry.title, "setting up config entry");

    let params = entry.params();
    charger.connect().await.map_err(SetupError::Connect)?;
    debug!(
        entry_id,
        charger = charger.serial(),
        firmware = charger.firmware().as_deref().unwrap_or("unknown"),
        "charger connected"
    );

    let registry = Arc::new(PushRegistry::new());
    let store = Arc::new(EntityStateStore::new());
    let (shutdown, shutdown_rx) = watch::channel(false);

    let mut entities: Vec<Arc<dyn ChargerEntity>> = Vec::new();
    entities.extend(setup::sensor(entry_id, &charger, &store, &registry, SENSOR_YAML));
    entities.extend(setup::switch(entry_id, &charger, &store, &registry, SWITCH_YAML));
    entities.extend(setup::select(entry_id, &charger, &store, &registry, SELECT_YAML));
    entities.extend(setup::number(entry_id, &charger, &store, &registry, NUMBER_YAML));
    entities.extend(setup::button(entry_id, &charger, &store, &registry, BUTTON_YAML));
    entities.extend(setup::update(
        entry_id,
        &charger,
        &store,
        &registry,
        UPDATE_YAML,
        params.timeout,
        &shutdown_rx,
    ));

    // Seed every entity's state before the background paths take over
    for entity in &entities {
        entity.poll().await;
    }

    let dispatcher = spawn_dispatcher(
        registry.clone(),
        charger.subscribe_properties(),
        shutdown_rx.clone(),
    );
    let pull_entities: Vec<Arc<dyn ChargerEntity>> = entities
        .iter()
        .filter(|e| {
            matches!(
                e.base().source(),
                Source::Attribute | Source::NamespaceList
            )
        })
        .cloned()
        .collect();
    let poller = spawn_poll_loop(pull_entities, params.poll_interval, shutdown_rx);

    info!(entry_id, count = entities.len(), "config entry set up");
    Ok(RuntimeData {
        charger,
        registry,
        store,
        params,
        entities,
        shutdown,
        tasks: vec![dispatcher, poller],
    })
}

/// Spawn the pull-poll loop for entities the charger never pushes
fn spawn_poll_loop(
    entities: Vec<Arc<dyn ChargerEntity>>,
    poll_interval: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(poll_interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Setup already seeded the states, skip the immediate first tick
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for entity in &entities {
                        entity.poll().await;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("pull poller stopped");
    })
}

/// Unload a config entry, tearing its runtime down.
///
/// A failed disconnect is logged but never fails the unload; the charger
/// keeps the stale session open until it restarts.
pub async fn unload_entry(entry_id: &str, runtime: RuntimeData) {
    debug!(entry_id, "unloading config entry");

    let _ = runtime.shutdown.send(true);
    for task in runtime.tasks {
        if let Err(err) = task.await {
            warn!(entry_id, %err, "background task ended abnormally");
        }
    }

    runtime.registry.clear();
    runtime.store.clear();

    if let Err(err) = runtime.charger.disconnect().await {
        error!(
            entry_id,
            charger = runtime.charger.serial(),
            %err,
            "could not disconnect charger, session stays open until the charger restarts"
        );
    }
    info!(entry_id, "config entry unloaded");
}

/// Apply updated entry options by folding them into the entry data and
/// rebuilding the runtime from scratch.
pub async fn apply_options(
    entry: &mut ConfigEntry,
    runtime: RuntimeData,
) -> Result<RuntimeData, SetupError> {
    debug!(entry_id = %entry.entry_id, "applying updated options, reloading entry");

    entry.data.extend(entry.options.clone());
    entry.modified_at = chrono::Utc::now();

    let charger = runtime.charger.clone();
    unload_entry(&entry.entry_id, runtime).await;
    setup_entry(entry, charger).await
}
