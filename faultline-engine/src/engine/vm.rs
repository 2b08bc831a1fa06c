//! Virtual machine state change.
//!
//! An instantaneous attack: start asks the cloud to begin the power
//! operation and returns once it is accepted, stop has nothing to revert.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use faultline_core::attack::action_id;
use faultline_core::params::{self, StateChangeParams, VmAction};
use faultline_core::{Attack, AttackError, ComputeConnector, CredentialProvider, PrepareRequest};

pub const VM_NAME_ATTRIBUTE: &str = "azure-vm.vm.name";
pub const VM_SUBSCRIPTION_ATTRIBUTE: &str = "azure-vm.subscription.id";
pub const VM_RESOURCE_GROUP_ATTRIBUTE: &str = "azure-vm.resource-group.name";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmState {
    pub subscription_id: String,
    pub resource_group: String,
    pub vm_name: String,
    pub action: VmAction,
}

pub struct VmStateAttack {
    action_id: String,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn ComputeConnector>,
}

impl VmStateAttack {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn ComputeConnector>,
    ) -> Self {
        Self {
            action_id: action_id("vm", "state"),
            credentials,
            connector,
        }
    }
}

#[async_trait]
impl Attack for VmStateAttack {
    type State = VmState;

    fn action_id(&self) -> &str {
        &self.action_id
    }

    #[instrument(skip_all, fields(action = %self.action_id))]
    async fn prepare(&self, request: &PrepareRequest) -> Result<VmState, AttackError> {
        let target = &request.target;
        let vm_name = target.require_attribute(VM_NAME_ATTRIBUTE)?;
        let subscription_id = target.require_attribute(VM_SUBSCRIPTION_ATTRIBUTE)?;
        let resource_group = target.require_attribute(VM_RESOURCE_GROUP_ATTRIBUTE)?;
        let change: StateChangeParams = params::parse(&request.config)?;

        Ok(VmState {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            vm_name: vm_name.to_string(),
            action: change.action,
        })
    }

    #[instrument(skip_all, fields(action = %self.action_id, vm = %state.vm_name))]
    async fn start(&self, state: &mut VmState) -> Result<(), AttackError> {
        let credential = self.credentials.credential()?;
        let compute = self
            .connector
            .compute(&state.subscription_id, &credential)
            .map_err(|source| AttackError::ClientConstruction {
                client: "virtual machines",
                source,
            })?;

        compute
            .begin_operation(&state.resource_group, &state.vm_name, state.action)
            .await
            .map_err(|e| {
                AttackError::remote(
                    format!(
                        "failed to {} virtual machine {}",
                        state.action.as_str(),
                        state.vm_name
                    ),
                    e,
                )
            })?;
        info!("Requested {} of {}", state.action.as_str(), state.vm_name);
        Ok(())
    }

    async fn stop(&self, _state: &mut VmState) -> Result<(), AttackError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::Target;
    use faultline_simulator::{CloudState, FailurePlan, SimulatedCloud};

    fn cloud() -> Arc<SimulatedCloud> {
        let mut state = CloudState::default();
        state
            .machines
            .entry("rg".into())
            .or_default()
            .insert("vm1".into(), "running".into());
        Arc::new(SimulatedCloud::new(state))
    }

    fn request(action: &str) -> PrepareRequest {
        PrepareRequest::new(
            Target::default()
                .with_attribute(VM_NAME_ATTRIBUTE, "vm1")
                .with_attribute(VM_SUBSCRIPTION_ATTRIBUTE, "sub")
                .with_attribute(VM_RESOURCE_GROUP_ATTRIBUTE, "rg"),
        )
        .with_param("action", action)
    }

    #[tokio::test]
    async fn deallocates_on_start_and_ignores_stop() {
        let cloud = cloud();
        let attack = VmStateAttack::new(cloud.clone(), cloud.clone());
        assert_eq!(attack.action_id(), "com.steadybit.extension_azure.vm.state");

        let mut state = attack.prepare(&request("deallocate")).await.unwrap();
        assert_eq!(state.action, VmAction::Deallocate);
        attack.start(&mut state).await.unwrap();
        assert_eq!(cloud.power_state("rg", "vm1").as_deref(), Some("deallocated"));

        cloud.clear_calls();
        attack.stop(&mut state).await.unwrap();
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn prepare_requires_machine_coordinates() {
        let cloud = cloud();
        let attack = VmStateAttack::new(cloud.clone(), cloud.clone());
        let request = PrepareRequest::new(Target::default().with_attribute(VM_NAME_ATTRIBUTE, "vm1"))
            .with_param("action", "restart");
        let err = attack.prepare(&request).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "target is missing 'azure-vm.subscription.id' attribute"
        );
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_operation_names_the_machine() {
        let cloud = cloud();
        cloud.set_failures(FailurePlan {
            vm_operation: true,
            ..Default::default()
        });
        let attack = VmStateAttack::new(cloud.clone(), cloud.clone());
        let mut state = attack.prepare(&request("power-off")).await.unwrap();
        let err = attack.start(&mut state).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed to power-off virtual machine vm1"));
    }
}
