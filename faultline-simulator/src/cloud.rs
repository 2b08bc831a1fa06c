//! ## faultline-simulator::cloud
//! **Shared state of the simulated cloud**
//!
//! `SimulatedCloud` is a cheap handle; clones share state, failure plan and
//! call log. Every boundary implementation in this crate records one
//! [`CloudCall`] per request before deciding whether to fail it.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use blake3::Hasher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use faultline_core::{Credential, CredentialError, CredentialProvider};
use faultline_prevention::{SecurityGroup, SecurityRule, Site};

use crate::chaos::FailurePlan;

/// Revision markers are random; the state hash sees this instead.
const REVISION_PLACEHOLDER: &str = "<revision>";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudState {
    /// Settings per store endpoint.
    pub stores: BTreeMap<String, BTreeMap<String, String>>,
    /// Security groups per resource group.
    pub security_groups: BTreeMap<String, Vec<SecurityGroup>>,
    /// Web apps per resource group.
    pub sites: BTreeMap<String, Vec<Site>>,
    /// Power state per machine name, per resource group.
    pub machines: BTreeMap<String, BTreeMap<String, String>>,
    /// Power state per instance id, per scale set, per resource group.
    pub scale_sets: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
    pub dns: BTreeMap<String, Vec<IpAddr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum CloudCall {
    Connect { service: String, target: String },
    SetSetting { endpoint: String, key: String, value: String },
    ListSettings { endpoint: String, filter: String },
    DeleteSetting { endpoint: String, key: String },
    ListSecurityGroups { resource_group: String },
    GetSecurityGroup { resource_group: String, name: String },
    CreateRule { security_group: String, name: String, priority: u16 },
    DeleteRule { security_group: String, name: String },
    GetSite { resource_group: String, name: String },
    VmOperation { resource_group: String, name: String, action: String },
    InstanceOperation {
        resource_group: String,
        scale_set: String,
        instance_id: String,
        action: String,
    },
    Lookup { host: String },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Tuning {
    pub page_size: usize,
    pub pending_polls: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            page_size: 2,
            pending_polls: 1,
        }
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<CloudState>,
    failures: Mutex<FailurePlan>,
    calls: Mutex<Vec<CloudCall>>,
    tuning: Mutex<Tuning>,
}

#[derive(Clone, Default)]
pub struct SimulatedCloud {
    shared: Arc<Shared>,
}

impl SimulatedCloud {
    pub fn new(state: CloudState) -> Self {
        let cloud = Self::default();
        *cloud.shared.state.lock() = state;
        cloud
    }

    pub fn with_failures(self, plan: FailurePlan) -> Self {
        self.set_failures(plan);
        self
    }

    /// Listing page size for settings and security groups.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.shared.tuning.lock().page_size = page_size.max(1);
        self
    }

    /// Polls a rule operation reports pending before it completes.
    pub fn with_pending_polls(self, pending_polls: u32) -> Self {
        self.shared.tuning.lock().pending_polls = pending_polls;
        self
    }

    pub fn set_failures(&self, plan: FailurePlan) {
        *self.shared.failures.lock() = plan;
    }

    pub fn failures(&self) -> FailurePlan {
        self.shared.failures.lock().clone()
    }

    pub fn state(&self) -> CloudState {
        self.shared.state.lock().clone()
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.shared.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.shared.calls.lock().clear();
    }

    pub fn settings(&self, endpoint: &str) -> BTreeMap<String, String> {
        self.shared
            .state
            .lock()
            .stores
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    pub fn rules(&self, resource_group: &str, security_group: &str) -> Vec<SecurityRule> {
        self.shared
            .state
            .lock()
            .security_groups
            .get(resource_group)
            .and_then(|groups| groups.iter().find(|g| g.name == security_group))
            .map(|g| g.rules.clone())
            .unwrap_or_default()
    }

    pub fn power_state(&self, resource_group: &str, vm_name: &str) -> Option<String> {
        self.shared
            .state
            .lock()
            .machines
            .get(resource_group)
            .and_then(|machines| machines.get(vm_name))
            .cloned()
    }

    pub fn instance_state(
        &self,
        resource_group: &str,
        scale_set: &str,
        instance_id: &str,
    ) -> Option<String> {
        self.shared
            .state
            .lock()
            .scale_sets
            .get(resource_group)
            .and_then(|sets| sets.get(scale_set))
            .and_then(|instances| instances.get(instance_id))
            .cloned()
    }

    /// Hex BLAKE3 digest of the cloud state, stable across runs.
    pub fn state_hash(&self) -> String {
        let state = self.state();
        let mut hasher = Hasher::new();

        for (endpoint, settings) in &state.stores {
            feed(&mut hasher, endpoint);
            for (key, value) in settings {
                feed(&mut hasher, key);
                if key.ends_with(":Revision") {
                    feed(&mut hasher, REVISION_PLACEHOLDER);
                } else {
                    feed(&mut hasher, value);
                }
            }
        }
        for (resource_group, groups) in &state.security_groups {
            feed(&mut hasher, resource_group);
            for group in groups {
                feed(&mut hasher, &group.name);
                for subnet in &group.subnet_ids {
                    feed(&mut hasher, subnet);
                }
                for rule in &group.rules {
                    feed(&mut hasher, &format!("{:?}", rule));
                }
            }
        }
        for (resource_group, sites) in &state.sites {
            feed(&mut hasher, resource_group);
            for site in sites {
                feed(&mut hasher, &format!("{:?}", site));
            }
        }
        for (resource_group, machines) in &state.machines {
            feed(&mut hasher, resource_group);
            for (name, power) in machines {
                feed(&mut hasher, name);
                feed(&mut hasher, power);
            }
        }
        for (resource_group, sets) in &state.scale_sets {
            feed(&mut hasher, resource_group);
            for (scale_set, instances) in sets {
                feed(&mut hasher, scale_set);
                for (instance_id, power) in instances {
                    feed(&mut hasher, instance_id);
                    feed(&mut hasher, power);
                }
            }
        }

        hex::encode(hasher.finalize().as_bytes())
    }

    pub(crate) fn record(&self, call: CloudCall) {
        self.shared.calls.lock().push(call);
    }

    pub(crate) fn tuning(&self) -> Tuning {
        *self.shared.tuning.lock()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut CloudState) -> R) -> R {
        let mut state = self.shared.state.lock();
        f(&mut *state)
    }

    pub(crate) fn with_failures_ref<R>(&self, f: impl FnOnce(&FailurePlan) -> R) -> R {
        let failures = self.shared.failures.lock();
        f(&*failures)
    }
}

fn feed(hasher: &mut Hasher, part: &str) {
    hasher.update(part.as_bytes());
    hasher.update(b"\0");
}

impl CredentialProvider for SimulatedCloud {
    fn credential(&self) -> Result<Credential, CredentialError> {
        if self.with_failures_ref(|plan| plan.credentials) {
            return Err(CredentialError::MissingSetting("AZURE_CLIENT_ID"));
        }
        Ok(Credential::DefaultIdentity)
    }
}
