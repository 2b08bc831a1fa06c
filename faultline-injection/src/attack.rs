//! ## faultline-injection::attack
//! **Prepare/Start/Stop for settings-store fault injection**
//!
//! Start writes the enable marker and a fresh revision first, then every
//! encoded key. A failed write stops the sequence and is reported with the
//! key name; keys already written stay (the revision marks the partial state
//! and the next start or stop overwrites it).
//!
//! Stop depends on the namespace. The global namespace is only flipped to
//! disabled with a new revision. A suffix namespace is listed completely and
//! then deleted key by key.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use faultline_config::InjectionConfig;
use faultline_core::attack::action_id;
use faultline_core::params::{
    self, ExceptionParams, FillDiskParams, LatencyParams, StatusCodeParams,
};
use faultline_core::{Attack, AttackError, CredentialProvider, PrepareRequest};
use faultline_telemetry::MetricsRecorder;

use crate::encoder::{FaultInjectionConfig, InjectionMode, MARKER_DISABLED, MARKER_ENABLED};
use crate::location::{StoreLocation, TargetFamily};
use crate::store::{collect_keys, SettingsStore, StoreConnector};

/// The closed set of faults a workload middleware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Latency,
    Exception,
    StatusCode,
    FillDisk,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Latency => "latency",
            FaultKind::Exception => "exception",
            FaultKind::StatusCode => "status_code",
            FaultKind::FillDisk => "fill_disk",
        }
    }

    pub fn injection_mode(&self) -> InjectionMode {
        match self {
            FaultKind::Latency => InjectionMode::Delay,
            FaultKind::Exception => InjectionMode::Exception,
            FaultKind::StatusCode => InjectionMode::StatusCode,
            FaultKind::FillDisk => InjectionMode::FillDisk,
        }
    }

    /// Parses the kind's parameters into a fresh fault config.
    fn build_config(
        &self,
        request: &PrepareRequest,
    ) -> Result<FaultInjectionConfig, AttackError> {
        let config = match self {
            FaultKind::Latency => {
                let p: LatencyParams = params::parse(&request.config)?;
                FaultInjectionConfig {
                    min_latency: Some(p.minimum_latency),
                    max_latency: Some(p.maximum_latency),
                    ..FaultInjectionConfig::new(self.injection_mode(), p.rate)
                }
            }
            FaultKind::Exception => {
                let p: ExceptionParams = params::parse(&request.config)?;
                FaultInjectionConfig {
                    exception_message: Some(p.exception_msg),
                    ..FaultInjectionConfig::new(self.injection_mode(), p.rate)
                }
            }
            FaultKind::StatusCode => {
                let p: StatusCodeParams = params::parse(&request.config)?;
                FaultInjectionConfig {
                    status_code: Some(p.status_code),
                    ..FaultInjectionConfig::new(self.injection_mode(), p.rate)
                }
            }
            FaultKind::FillDisk => {
                let p: FillDiskParams = params::parse(&request.config)?;
                FaultInjectionConfig {
                    disk_fill_megabytes: Some(p.megabytes),
                    ..FaultInjectionConfig::new(self.injection_mode(), p.rate)
                }
            }
        };
        Ok(config)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultInjectionState {
    pub location: StoreLocation,
    pub config: FaultInjectionConfig,
    pub experiment_key: Option<String>,
    pub execution_id: Option<i64>,
}

pub struct FaultInjectionAttack {
    family: TargetFamily,
    kind: FaultKind,
    action_id: String,
    injection: InjectionConfig,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn StoreConnector>,
    metrics: Option<MetricsRecorder>,
}

impl FaultInjectionAttack {
    pub fn new(
        family: TargetFamily,
        kind: FaultKind,
        injection: InjectionConfig,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            family,
            kind,
            action_id: action_id(family.as_str(), kind.as_str()),
            injection,
            credentials,
            connector,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn family(&self) -> TargetFamily {
        self.family
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    fn connect(&self, location: &StoreLocation) -> Result<Arc<dyn SettingsStore>, AttackError> {
        let credential = self.credentials.credential()?;
        debug!(method = credential.method(), "Connecting to {}", location.endpoint);
        self.connector
            .connect(&location.endpoint, &credential)
            .map_err(|source| AttackError::ClientConstruction {
                client: "app configuration",
                source,
            })
    }

    async fn write(
        &self,
        store: &dyn SettingsStore,
        key: &str,
        value: &str,
    ) -> Result<(), AttackError> {
        store
            .set_setting(key, value)
            .await
            .map_err(|e| AttackError::remote(format!("failed to set setting {}", key), e))?;
        if let Some(metrics) = &self.metrics {
            metrics.settings_written.inc();
        }
        Ok(())
    }
}

#[async_trait]
impl Attack for FaultInjectionAttack {
    type State = FaultInjectionState;

    fn action_id(&self) -> &str {
        &self.action_id
    }

    #[instrument(skip_all, fields(action = %self.action_id))]
    async fn prepare(&self, request: &PrepareRequest) -> Result<FaultInjectionState, AttackError> {
        let location = StoreLocation::resolve(self.family, &request.target, &self.injection)?;
        let mut config = self.kind.build_config(request)?;
        config.namespace_suffix = location.namespace.clone();

        Ok(FaultInjectionState {
            location,
            config,
            experiment_key: request.execution_context.experiment_key.clone(),
            execution_id: request.execution_context.execution_id,
        })
    }

    #[instrument(
        skip_all,
        fields(
            action = %self.action_id,
            store = state.location.store_name().unwrap_or(state.location.endpoint.as_str()),
            experiment = state.experiment_key.as_deref().unwrap_or("-"),
            execution = ?state.execution_id,
        )
    )]
    async fn start(&self, state: &mut FaultInjectionState) -> Result<(), AttackError> {
        let store = self.connect(&state.location)?;
        let location = &state.location;

        self.write(store.as_ref(), &location.key("Enabled"), MARKER_ENABLED)
            .await?;
        let revision = Uuid::new_v4().to_string();
        self.write(store.as_ref(), &location.key("Revision"), &revision)
            .await?;

        for (key, value) in state.config.to_settings() {
            self.write(store.as_ref(), &key, &value).await?;
        }

        info!(
            revision = %revision,
            "Injected {} into {} at {}",
            state.config.injection_mode,
            location.prefix(),
            location.endpoint
        );
        Ok(())
    }

    #[instrument(
        skip_all,
        fields(
            action = %self.action_id,
            store = state.location.store_name().unwrap_or(state.location.endpoint.as_str()),
            experiment = state.experiment_key.as_deref().unwrap_or("-"),
            execution = ?state.execution_id,
        )
    )]
    async fn stop(&self, state: &mut FaultInjectionState) -> Result<(), AttackError> {
        let store = self.connect(&state.location)?;
        let location = &state.location;

        if location.namespace.is_none() {
            self.write(store.as_ref(), &location.key("Enabled"), MARKER_DISABLED)
                .await?;
            self.write(
                store.as_ref(),
                &location.key("Revision"),
                &Uuid::new_v4().to_string(),
            )
            .await?;
            info!("Disabled fault injection at {}", location.endpoint);
            return Ok(());
        }

        let keys = collect_keys(store.as_ref(), &location.key_filter())
            .await
            .map_err(|e| AttackError::remote("failed to list settings", e))?;

        for key in &keys {
            store
                .delete_setting(key)
                .await
                .map_err(|e| AttackError::remote(format!("failed to delete setting {}", key), e))?;
            if let Some(metrics) = &self.metrics {
                metrics.settings_deleted.inc();
            }
        }

        info!(
            deleted = keys.len(),
            "Removed fault injection settings under {}",
            location.prefix()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FUNCTION_ENDPOINT_ATTRIBUTE, STORE_ID_ATTRIBUTE};
    use crate::store::{matches_filter, SettingsPage};
    use faultline_core::request::LABEL_ATTRIBUTE;
    use faultline_core::{Credential, CredentialError, ExecutionContext, RemoteError, Target};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Set(String, String),
        List(String),
        Delete(String),
    }

    #[derive(Default)]
    struct MemoryStore {
        settings: Mutex<BTreeMap<String, String>>,
        calls: Mutex<Vec<Call>>,
        fail_on: Mutex<Option<String>>,
        page_size: usize,
    }

    impl MemoryStore {
        fn failing(&self, key: &str) -> Result<(), RemoteError> {
            match self.fail_on.lock().as_deref() {
                Some(k) if k == key => Err(RemoteError::Service {
                    status: 503,
                    message: "unavailable".into(),
                }),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn set_setting(&self, key: &str, value: &str) -> Result<(), RemoteError> {
            self.calls.lock().push(Call::Set(key.into(), value.into()));
            self.failing(key)?;
            self.settings.lock().insert(key.into(), value.into());
            Ok(())
        }

        async fn list_settings(
            &self,
            key_filter: &str,
            continuation: Option<String>,
        ) -> Result<SettingsPage, RemoteError> {
            self.calls.lock().push(Call::List(key_filter.into()));
            let keys: Vec<String> = self
                .settings
                .lock()
                .keys()
                .filter(|k| matches_filter(k, key_filter))
                .cloned()
                .collect();
            let start: usize = continuation.map_or(0, |c| c.parse().unwrap());
            let size = self.page_size.max(1);
            let end = (start + size).min(keys.len());
            Ok(SettingsPage {
                keys: keys[start..end].to_vec(),
                next: (end < keys.len()).then(|| end.to_string()),
            })
        }

        async fn delete_setting(&self, key: &str) -> Result<(), RemoteError> {
            self.calls.lock().push(Call::Delete(key.into()));
            self.failing(key)?;
            self.settings.lock().remove(key);
            Ok(())
        }
    }

    struct Connector {
        store: Arc<MemoryStore>,
        connects: Mutex<Vec<String>>,
        fail: bool,
    }

    impl StoreConnector for Connector {
        fn connect(
            &self,
            endpoint: &str,
            _credential: &Credential,
        ) -> Result<Arc<dyn SettingsStore>, RemoteError> {
            self.connects.lock().push(endpoint.to_string());
            if self.fail {
                return Err(RemoteError::Transport("bad endpoint".into()));
            }
            Ok(self.store.clone())
        }
    }

    struct StaticCredentials(bool);

    impl CredentialProvider for StaticCredentials {
        fn credential(&self) -> Result<Credential, CredentialError> {
            if self.0 {
                Ok(Credential::DefaultIdentity)
            } else {
                Err(CredentialError::MissingSetting("AZURE_TENANT_ID"))
            }
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        connector: Arc<Connector>,
    }

    fn fixture(page_size: usize) -> Fixture {
        let store = Arc::new(MemoryStore {
            page_size,
            ..Default::default()
        });
        let connector = Arc::new(Connector {
            store: store.clone(),
            connects: Mutex::new(Vec::new()),
            fail: false,
        });
        Fixture { store, connector }
    }

    fn attack(fixture: &Fixture, family: TargetFamily, kind: FaultKind) -> FaultInjectionAttack {
        FaultInjectionAttack::new(
            family,
            kind,
            InjectionConfig {
                app_config_endpoint: Some("https://global.azconfig.io".into()),
            },
            Arc::new(StaticCredentials(true)),
            fixture.connector.clone(),
        )
    }

    fn namespaced_function(label: &str) -> Target {
        Target::default()
            .with_attribute(FUNCTION_ENDPOINT_ATTRIBUTE, "https://shared.azconfig.io")
            .with_attribute(LABEL_ATTRIBUTE, label)
    }

    fn status_code_request(target: Target) -> PrepareRequest {
        PrepareRequest::new(target)
            .with_param("rate", 50.0)
            .with_param("statusCode", 500.0)
            .with_param("duration", "30s")
    }

    #[test]
    fn action_ids_combine_family_and_fault() {
        let f = fixture(10);
        assert_eq!(
            attack(&f, TargetFamily::ContainerApp, FaultKind::StatusCode).action_id(),
            "com.steadybit.extension_azure.container_app.status_code"
        );
    }

    #[tokio::test]
    async fn prepare_touches_no_store() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();

        assert_eq!(state.config.injection_mode, InjectionMode::StatusCode);
        assert_eq!(state.config.status_code, Some(500));
        assert_eq!(state.config.namespace_suffix.as_deref(), Some("func1"));
        assert!(f.connector.connects.lock().is_empty());
    }

    #[tokio::test]
    async fn prepare_rejects_missing_attributes() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::ContainerApp, FaultKind::Latency);
        let request = PrepareRequest::new(Target::default())
            .with_param("rate", 10)
            .with_param("minimumLatency", 100)
            .with_param("maximumLatency", 200);
        assert!(attack.prepare(&request).await.is_err());
    }

    #[tokio::test]
    async fn start_writes_markers_before_fault_fields() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();
        attack.start(&mut state).await.unwrap();

        let calls = f.store.calls.lock().clone();
        assert_eq!(calls.len(), 6);
        assert_eq!(
            calls[0],
            Call::Set("Steadybit:FaultInjection:func1:Enabled".into(), "Yes".into())
        );
        match &calls[1] {
            Call::Set(key, value) => {
                assert_eq!(key, "Steadybit:FaultInjection:func1:Revision");
                assert!(Uuid::parse_str(value).is_ok());
            }
            other => panic!("unexpected call {:?}", other),
        }

        let settings = f.store.settings.lock();
        assert_eq!(settings["Steadybit:FaultInjection:func1:Injection"], "StatusCode");
        assert_eq!(settings["Steadybit:FaultInjection:func1:Rate"], "50");
        assert_eq!(settings["Steadybit:FaultInjection:func1:Enabled"], "true");
        assert_eq!(settings["Steadybit:FaultInjection:func1:StatusCode"], "500");
        assert_eq!(*f.connector.connects.lock(), vec!["https://shared.azconfig.io"]);
    }

    #[tokio::test]
    async fn failed_write_names_key_and_keeps_earlier_writes() {
        let f = fixture(10);
        *f.store.fail_on.lock() = Some("Steadybit:FaultInjection:func1:Rate".into());
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();

        let err = attack.start(&mut state).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed to set setting Steadybit:FaultInjection:func1:Rate"));
        let settings = f.store.settings.lock();
        assert!(settings.contains_key("Steadybit:FaultInjection:func1:Revision"));
        assert!(!f
            .store
            .calls
            .lock()
            .iter()
            .any(|c| matches!(c, Call::Delete(_))));
    }

    #[tokio::test]
    async fn global_stop_only_flips_enabled_and_revision() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::Exception);
        let request = PrepareRequest::new(Target::default())
            .with_param("rate", 20)
            .with_param("exceptionMsg", "boom");
        let mut state = attack.prepare(&request).await.unwrap();
        attack.start(&mut state).await.unwrap();
        f.store.calls.lock().clear();

        attack.stop(&mut state).await.unwrap();

        let calls = f.store.calls.lock().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            Call::Set("Steadybit:FaultInjection:Enabled".into(), "No".into())
        );
        assert!(matches!(&calls[1], Call::Set(k, _) if k == "Steadybit:FaultInjection:Revision"));
        assert_eq!(
            *f.connector.connects.lock(),
            vec!["https://global.azconfig.io", "https://global.azconfig.io"]
        );
    }

    #[tokio::test]
    async fn namespaced_stop_drains_listing_then_deletes_everything() {
        let f = fixture(2);
        f.store
            .settings
            .lock()
            .insert("Steadybit:FaultInjection:other:Rate".into(), "1".into());
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();
        attack.start(&mut state).await.unwrap();
        f.store.calls.lock().clear();

        attack.stop(&mut state).await.unwrap();

        let calls = f.store.calls.lock().clone();
        let first_delete = calls
            .iter()
            .position(|c| matches!(c, Call::Delete(_)))
            .unwrap();
        assert!(calls[..first_delete].iter().all(|c| matches!(c, Call::List(_))));
        assert_eq!(first_delete, 3);
        assert!(!calls.iter().any(|c| matches!(c, Call::Set(..))));

        let settings = f.store.settings.lock();
        assert_eq!(settings.len(), 1);
        assert!(settings.contains_key("Steadybit:FaultInjection:other:Rate"));
    }

    #[tokio::test]
    async fn delete_failure_aborts_with_key_name() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();
        attack.start(&mut state).await.unwrap();
        *f.store.fail_on.lock() = Some("Steadybit:FaultInjection:func1:Injection".into());

        let err = attack.stop(&mut state).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("failed to delete setting Steadybit:FaultInjection:func1:Injection"));
        assert!(f
            .store
            .settings
            .lock()
            .contains_key("Steadybit:FaultInjection:func1:Rate"));
    }

    #[tokio::test]
    async fn credential_failure_is_fatal_before_connecting() {
        let f = fixture(10);
        let attack = FaultInjectionAttack::new(
            TargetFamily::AppConfiguration,
            FaultKind::FillDisk,
            InjectionConfig::default(),
            Arc::new(StaticCredentials(false)),
            f.connector.clone(),
        );
        let request = PrepareRequest::new(Target::default().with_attribute(
            STORE_ID_ATTRIBUTE,
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.AppConfiguration/configurationStores/store1",
        ))
        .with_param("rate", 100)
        .with_param("megabytes", 64);
        let mut state = attack.prepare(&request).await.unwrap();

        let err = attack.start(&mut state).await.unwrap_err();
        assert!(matches!(err, AttackError::Credential(_)));
        assert!(f.connector.connects.lock().is_empty());
    }

    #[tokio::test]
    async fn client_construction_failure_is_wrapped() {
        let store = Arc::new(MemoryStore::default());
        let connector = Arc::new(Connector {
            store,
            connects: Mutex::new(Vec::new()),
            fail: true,
        });
        let attack = FaultInjectionAttack::new(
            TargetFamily::FunctionApp,
            FaultKind::StatusCode,
            InjectionConfig::default(),
            Arc::new(StaticCredentials(true)),
            connector,
        );
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();
        let err = attack.start(&mut state).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to create app configuration client: transport failure: bad endpoint"
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn start_logs_injected_mode() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();
        attack.start(&mut state).await.unwrap();
        assert!(logs_contain("Injected StatusCode into Steadybit:FaultInjection:func1"));
    }

    #[traced_test]
    #[tokio::test]
    async fn spans_carry_store_and_execution() {
        let f = fixture(10);
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode);
        let mut request = status_code_request(namespaced_function("func1"));
        request.execution_context = ExecutionContext {
            experiment_key: Some("EXP-42".into()),
            execution_id: Some(4711),
        };
        let mut state = attack.prepare(&request).await.unwrap();
        assert_eq!(state.experiment_key.as_deref(), Some("EXP-42"));

        attack.start(&mut state).await.unwrap();
        attack.stop(&mut state).await.unwrap();
        assert!(logs_contain("store=\"shared\""));
        assert!(logs_contain("EXP-42"));
        assert!(logs_contain("Some(4711)"));
    }

    #[tokio::test]
    async fn counts_written_settings() {
        let f = fixture(10);
        let metrics = MetricsRecorder::new().unwrap();
        let attack = attack(&f, TargetFamily::FunctionApp, FaultKind::StatusCode)
            .with_metrics(metrics.clone());
        let mut state = attack
            .prepare(&status_code_request(namespaced_function("func1")))
            .await
            .unwrap();
        attack.start(&mut state).await.unwrap();
        attack.stop(&mut state).await.unwrap();
        assert_eq!(metrics.settings_written.get(), 6);
        assert_eq!(metrics.settings_deleted.get(), 5);
    }
}
