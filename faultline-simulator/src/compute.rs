//! Simulated virtual machines and scale set instances.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use faultline_core::params::VmAction;
use faultline_core::{ComputeApi, ComputeConnector, Credential, RemoteError, ScaleSetApi};

use crate::cloud::{CloudCall, SimulatedCloud};

/// Power state a machine settles in once `action` completes. `None` removes it.
fn settled_state(action: VmAction) -> Option<&'static str> {
    match action {
        VmAction::Restart | VmAction::Start => Some("running"),
        VmAction::PowerOff => Some("stopped"),
        VmAction::Deallocate => Some("deallocated"),
        VmAction::Delete => None,
    }
}

impl ComputeConnector for SimulatedCloud {
    fn compute(
        &self,
        subscription_id: &str,
        _credential: &Credential,
    ) -> Result<Arc<dyn ComputeApi>, RemoteError> {
        self.record(CloudCall::Connect {
            service: "compute".into(),
            target: subscription_id.into(),
        });
        if self.with_failures_ref(|plan| plan.connect) {
            return Err(RemoteError::Transport("compute endpoint unreachable".into()));
        }
        Ok(Arc::new(self.clone()))
    }

    fn scale_sets(
        &self,
        subscription_id: &str,
        _credential: &Credential,
    ) -> Result<Arc<dyn ScaleSetApi>, RemoteError> {
        self.record(CloudCall::Connect {
            service: "scale set instances".into(),
            target: subscription_id.into(),
        });
        if self.with_failures_ref(|plan| plan.connect) {
            return Err(RemoteError::Transport("compute endpoint unreachable".into()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ComputeApi for SimulatedCloud {
    async fn begin_operation(
        &self,
        resource_group: &str,
        vm_name: &str,
        action: VmAction,
    ) -> Result<(), RemoteError> {
        self.record(CloudCall::VmOperation {
            resource_group: resource_group.into(),
            name: vm_name.into(),
            action: action.as_str().into(),
        });
        if self.with_failures_ref(|plan| plan.vm_operation) {
            return Err(RemoteError::Service {
                status: 409,
                message: format!("operation {} is not allowed on {}", action.as_str(), vm_name),
            });
        }

        self.with_state(|state| {
            let machines = state
                .machines
                .get_mut(resource_group)
                .filter(|machines| machines.contains_key(vm_name))
                .ok_or_else(|| RemoteError::NotFound(format!("virtual machine {}", vm_name)))?;
            match settled_state(action) {
                Some(power) => {
                    machines.insert(vm_name.to_string(), power.to_string());
                }
                None => {
                    machines.remove(vm_name);
                }
            }
            Ok(())
        })?;
        debug!("{} accepted for {}", action.as_str(), vm_name);
        Ok(())
    }
}

#[async_trait]
impl ScaleSetApi for SimulatedCloud {
    async fn begin_instance_operation(
        &self,
        resource_group: &str,
        scale_set: &str,
        instance_id: &str,
        action: VmAction,
    ) -> Result<(), RemoteError> {
        self.record(CloudCall::InstanceOperation {
            resource_group: resource_group.into(),
            scale_set: scale_set.into(),
            instance_id: instance_id.into(),
            action: action.as_str().into(),
        });
        if self.with_failures_ref(|plan| plan.instance_operation) {
            return Err(RemoteError::Service {
                status: 409,
                message: format!(
                    "operation {} is not allowed on instance {} of {}",
                    action.as_str(),
                    instance_id,
                    scale_set
                ),
            });
        }

        self.with_state(|state| {
            let instances = state
                .scale_sets
                .get_mut(resource_group)
                .and_then(|sets| sets.get_mut(scale_set))
                .filter(|instances| instances.contains_key(instance_id))
                .ok_or_else(|| {
                    RemoteError::NotFound(format!(
                        "instance {} of scale set {}",
                        instance_id, scale_set
                    ))
                })?;
            match settled_state(action) {
                Some(power) => {
                    instances.insert(instance_id.to_string(), power.to_string());
                }
                None => {
                    instances.remove(instance_id);
                }
            }
            Ok(())
        })?;
        debug!("{} accepted for {}/{}", action.as_str(), scale_set, instance_id);
        Ok(())
    }
}
