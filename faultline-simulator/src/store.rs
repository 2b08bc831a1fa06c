//! Simulated settings stores, one per endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use faultline_core::{Credential, RemoteError};
use faultline_injection::store::matches_filter;
use faultline_injection::{SettingsPage, SettingsStore, StoreConnector};

use crate::cloud::{CloudCall, SimulatedCloud};

pub struct SimulatedStore {
    cloud: SimulatedCloud,
    endpoint: String,
}

impl StoreConnector for SimulatedCloud {
    fn connect(
        &self,
        endpoint: &str,
        _credential: &Credential,
    ) -> Result<Arc<dyn SettingsStore>, RemoteError> {
        self.record(CloudCall::Connect {
            service: "app configuration".into(),
            target: endpoint.into(),
        });
        if self.with_failures_ref(|plan| plan.connect) {
            return Err(RemoteError::Transport(format!("cannot reach {}", endpoint)));
        }
        Ok(Arc::new(SimulatedStore {
            cloud: self.clone(),
            endpoint: endpoint.to_string(),
        }))
    }
}

impl SimulatedStore {
    fn unavailable(key: &str) -> RemoteError {
        RemoteError::Service {
            status: 503,
            message: format!("simulated failure for {}", key),
        }
    }
}

#[async_trait]
impl SettingsStore for SimulatedStore {
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), RemoteError> {
        self.cloud.record(CloudCall::SetSetting {
            endpoint: self.endpoint.clone(),
            key: key.into(),
            value: value.into(),
        });
        if self.cloud.with_failures_ref(|plan| plan.set_setting.contains(key)) {
            return Err(Self::unavailable(key));
        }
        self.cloud.with_state(|state| {
            state
                .stores
                .entry(self.endpoint.clone())
                .or_default()
                .insert(key.to_string(), value.to_string())
        });
        Ok(())
    }

    async fn list_settings(
        &self,
        key_filter: &str,
        continuation: Option<String>,
    ) -> Result<SettingsPage, RemoteError> {
        self.cloud.record(CloudCall::ListSettings {
            endpoint: self.endpoint.clone(),
            filter: key_filter.into(),
        });
        if self.cloud.with_failures_ref(|plan| plan.list_settings) {
            return Err(Self::unavailable(key_filter));
        }

        let start = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::Service {
                    status: 400,
                    message: format!("invalid continuation token {}", token),
                })?,
            None => 0,
        };
        let keys: Vec<String> = self.cloud.with_state(|state| {
            state
                .stores
                .get(&self.endpoint)
                .map(|settings| {
                    settings
                        .keys()
                        .filter(|key| matches_filter(key, key_filter))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });

        let end = (start + self.cloud.tuning().page_size).min(keys.len());
        let page = keys.get(start..end).map(<[String]>::to_vec).unwrap_or_default();
        trace!(start, end, "Listing {} at {}", key_filter, self.endpoint);
        Ok(SettingsPage {
            keys: page,
            next: (end < keys.len()).then(|| end.to_string()),
        })
    }

    async fn delete_setting(&self, key: &str) -> Result<(), RemoteError> {
        self.cloud.record(CloudCall::DeleteSetting {
            endpoint: self.endpoint.clone(),
            key: key.into(),
        });
        if self.cloud.with_failures_ref(|plan| plan.delete_setting.contains(key)) {
            return Err(Self::unavailable(key));
        }
        self.cloud.with_state(|state| {
            if let Some(settings) = state.stores.get_mut(&self.endpoint) {
                settings.remove(key);
            }
        });
        Ok(())
    }
}
