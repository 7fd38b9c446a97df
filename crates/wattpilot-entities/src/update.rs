//! Firmware update entities for the Wattpilot charger
//!
//! The update entity tracks the list of firmware versions the charger
//! advertises, reports the newest as its state and triggers installs. The
//! charger reboots mid-install, so the install call waits for the connection
//! to drop and come back before returning.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use wattpilot_client::ChargerClient;
use wattpilot_core::{value_display, EntityConfig, Platform, SetType, STATE_UNKNOWN};

use crate::entity::{build_entities, ChargerEntity, EntityBase};
use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;
use crate::version::{clean_version, VersionTable};

/// Reported as the installed version when the charger does not expose one
pub const DUMMY_VERSION: &str = "0.0.1";

/// Set up the update platform from its YAML definitions
pub fn setup_platform(
    entry_id: &str,
    charger: &Arc<dyn ChargerClient>,
    store: &Arc<EntityStateStore>,
    registry: &PushRegistry,
    yaml: &str,
    timeout: u64,
    shutdown: &watch::Receiver<bool>,
) -> Vec<Arc<dyn ChargerEntity>> {
    let charger = charger.clone();
    let store = store.clone();
    let shutdown = shutdown.clone();
    build_entities(Platform::Update, entry_id, yaml, registry, move |config| {
        ChargerUpdate::new(
            entry_id,
            charger.clone(),
            config,
            store.clone(),
            timeout,
            shutdown.clone(),
        )
    })
}

enum WaitOutcome {
    Satisfied,
    TimedOut,
    Cancelled,
}

/// Update entity over the charger's advertised firmware list.
///
/// The bound property holds the list of available versions; `id_installed`
/// names the property with the running version and `id_trigger` the property
/// an install is written to.
pub struct ChargerUpdate {
    base: EntityBase,
    id_installed: String,
    id_trigger: String,
    id_status: Option<String>,
    set_type: Option<SetType>,
    timeout: u64,
    shutdown: watch::Receiver<bool>,
    versions: Mutex<VersionTable>,
}

impl ChargerUpdate {
    pub fn new(
        entry_id: &str,
        charger: Arc<dyn ChargerClient>,
        config: EntityConfig,
        store: Arc<EntityStateStore>,
        timeout: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, EntityError> {
        let id_installed = config.id_installed.clone().ok_or_else(|| {
            EntityError::Init("required configuration option 'id_installed' missing".to_string())
        })?;
        let id_trigger = config.id_trigger.clone().ok_or_else(|| {
            EntityError::Init("required configuration option 'id_trigger' missing".to_string())
        })?;
        let id_status = config.id_status.clone();
        let set_type = config.set_type;
        let base = EntityBase::new(entry_id, charger, config, store);
        Ok(Self {
            base,
            id_installed,
            id_trigger,
            id_status,
            set_type,
            timeout,
            shutdown,
            versions: Mutex::new(VersionTable::default()),
        })
    }

    fn versions(&self) -> std::sync::MutexGuard<'_, VersionTable> {
        self.versions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Normalized version the charger currently runs
    pub fn installed_version(&self) -> String {
        match self.base.charger().property(&self.id_installed) {
            Some(raw) => clean_version(&value_display(&raw)),
            None => DUMMY_VERSION.to_string(),
        }
    }

    /// Normalized newest advertised version, if any is known
    pub fn latest_version(&self) -> Option<String> {
        self.versions().latest().map(str::to_string)
    }

    /// Raw install status the charger reports, if a status property is bound
    pub fn status(&self) -> Option<String> {
        let id_status = self.id_status.as_ref()?;
        self.base
            .charger()
            .property(id_status)
            .map(|raw| value_display(&raw))
    }

    /// Trigger a firmware install and wait for the charger to reboot.
    ///
    /// `version` is a normalized version key; `None` installs the newest
    /// advertised version. An unknown version is an error and performs no
    /// write. After the trigger write the charger is expected to disconnect
    /// and reconnect; each phase is waited out with a deadline of four times
    /// the entry timeout, and a missed deadline is logged and tolerated.
    pub async fn install(&self, version: Option<&str>) -> Result<(), EntityError> {
        let raw = {
            let table = self.versions();
            let clean = match version {
                Some(version) => version.to_string(),
                None => table
                    .latest()
                    .map(str::to_string)
                    .ok_or_else(|| CoercionError::UnknownVersion {
                        version: STATE_UNKNOWN.to_string(),
                    })?,
            };
            table
                .raw(&clean)
                .ok_or_else(|| CoercionError::UnknownVersion { version: clean })?
                .to_string()
        };

        info!(
            charger = %self.base.charger_id(),
            identifier = %self.id_trigger,
            version = %raw,
            "triggering firmware install"
        );
        self.base
            .charger()
            .set_property(&self.id_trigger, Value::String(raw), true, self.set_type)
            .await?;

        if matches!(
            self.wait_for_connection("disconnect", false).await,
            WaitOutcome::Cancelled
        ) {
            return Ok(());
        }
        self.wait_for_connection("reconnect", true).await;
        Ok(())
    }

    /// Wait until the charger connection matches `want_connected`, polling
    /// once a second. Gives up after four times the entry timeout; shutdown
    /// cancels the wait immediately.
    async fn wait_for_connection(&self, phase: &str, want_connected: bool) -> WaitOutcome {
        let deadline = Duration::from_secs(self.timeout * 4);
        let start = Instant::now();
        let mut shutdown = self.shutdown.clone();

        loop {
            if self.base.charger().connected() == want_connected {
                debug!(
                    charger = %self.base.charger_id(),
                    phase,
                    elapsed = start.elapsed().as_secs(),
                    "install wait phase complete"
                );
                return WaitOutcome::Satisfied;
            }
            if start.elapsed() >= deadline {
                error!(
                    charger = %self.base.charger_id(),
                    phase,
                    deadline = deadline.as_secs(),
                    "timed out waiting for the charger during install"
                );
                return WaitOutcome::TimedOut;
            }
            tokio::select! {
                _ = sleep(Duration::from_secs(1)) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(charger = %self.base.charger_id(), phase, "install wait cancelled");
                        return WaitOutcome::Cancelled;
                    }
                }
            }
        }
    }
}

impl ChargerEntity for ChargerUpdate {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    /// The raw value is the list of advertised versions. Rebuilds the
    /// version table and reports the newest normalized key as the state.
    fn coerce(&self, raw: Value) -> Result<Option<String>, CoercionError> {
        let list = raw.as_array().ok_or_else(|| CoercionError::InvalidType {
            expected: "version list",
            value: value_display(&raw),
        })?;
        let raw_versions: Vec<String> = list.iter().map(value_display).collect();
        let table = VersionTable::from_raw(&raw_versions);
        let state = table
            .latest()
            .map(str::to_string)
            .unwrap_or_else(|| STATE_UNKNOWN.to_string());
        *self.versions() = table;
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wattpilot_client::testing::MockCharger;
    use wattpilot_core::load_platform_configs;

    const FIRMWARE_YAML: &str = r#"
update:
  - id: ocu
    name: Firmware
    id_installed: fwv
    id_trigger: oct
"#;

    fn make_update(
        mock: Arc<MockCharger>,
        timeout: u64,
    ) -> (ChargerUpdate, watch::Sender<bool>) {
        let config = load_platform_configs(FIRMWARE_YAML, Platform::Update)
            .unwrap()
            .remove(0);
        let (tx, rx) = watch::channel(false);
        let charger: Arc<dyn ChargerClient> = mock;
        let update = ChargerUpdate::new(
            "entry",
            charger,
            config,
            Arc::new(EntityStateStore::new()),
            timeout,
            rx,
        )
        .unwrap();
        (update, tx)
    }

    #[test]
    fn test_coerce_reports_newest_version() {
        let (update, _tx) = make_update(Arc::new(MockCharger::new("12345678")), 30);
        let state = update
            .coerce(json!(["v1.2.0", "1.10.0-beta1", "V2.0"]))
            .unwrap()
            .unwrap();
        assert_eq!(state, "2.0");
        assert_eq!(update.latest_version().as_deref(), Some("2.0"));
    }

    #[test]
    fn test_installed_version_is_cleaned() {
        let mock = Arc::new(MockCharger::new("12345678").with_property("fwv", json!("v38.5")));
        let (update, _tx) = make_update(mock, 30);
        assert_eq!(update.installed_version(), "38.5");

        let (update, _tx) = make_update(Arc::new(MockCharger::new("12345678")), 30);
        assert_eq!(update.installed_version(), DUMMY_VERSION);
    }

    #[tokio::test]
    async fn test_unknown_version_performs_no_write() {
        let mock = Arc::new(MockCharger::new("12345678"));
        let (update, _tx) = make_update(mock.clone(), 30);
        update.coerce(json!(["v1.2.0"])).unwrap();

        let err = update.install(Some("9.9.9")).await.unwrap_err();
        assert!(matches!(
            err,
            EntityError::Coercion(CoercionError::UnknownVersion { .. })
        ));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_waits_out_a_stuck_connection() {
        let mock = Arc::new(MockCharger::new("12345678"));
        let (update, _tx) = make_update(mock.clone(), 5);
        update.coerce(json!(["V2.0"])).unwrap();

        // The mock never disconnects, so the disconnect phase runs the full
        // 20 seconds and the reconnect phase completes immediately.
        let start = Instant::now();
        update.install(None).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed < Duration::from_secs(22));
        assert_eq!(mock.writes(), vec![("oct".to_string(), json!("V2.0"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_returns_after_reboot_cycle() {
        let mock = Arc::new(MockCharger::new("12345678"));
        mock.set_connected(false);
        let (update, _tx) = make_update(mock.clone(), 5);
        update.coerce(json!(["V2.0"])).unwrap();

        let reconnect = mock.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(3)).await;
            reconnect.set_connected(true);
        });

        let start = Instant::now();
        update.install(Some("2.0")).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_the_install_wait() {
        let mock = Arc::new(MockCharger::new("12345678"));
        let (update, tx) = make_update(mock, 30);
        update.coerce(json!(["V2.0"])).unwrap();

        tokio::spawn(async move {
            sleep(Duration::from_secs(2)).await;
            let _ = tx.send(true);
        });

        let start = Instant::now();
        update.install(None).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
