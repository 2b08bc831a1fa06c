//! Scale set instance state change.
//!
//! Like the virtual machine variant this is instantaneous, but instances are
//! addressed by scale set name and instance id and cannot be started.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use faultline_core::attack::action_id;
use faultline_core::params::{self, StateChangeParams, VmAction};
use faultline_core::{Attack, AttackError, ComputeConnector, CredentialProvider, PrepareRequest};

pub const SCALE_SET_NAME_ATTRIBUTE: &str = "azure-scale-set.name";
pub const INSTANCE_ID_ATTRIBUTE: &str = "azure-scale-set-instance.id";
pub const SUBSCRIPTION_ATTRIBUTE: &str = "azure.subscription.id";
pub const RESOURCE_GROUP_ATTRIBUTE: &str = "azure.resource-group.name";

const INSTANCE_ACTIONS: [VmAction; 4] = [
    VmAction::Restart,
    VmAction::PowerOff,
    VmAction::Delete,
    VmAction::Deallocate,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSetInstanceState {
    pub subscription_id: String,
    pub resource_group: String,
    pub scale_set: String,
    pub instance_id: String,
    pub action: VmAction,
}

pub struct ScaleSetInstanceStateAttack {
    action_id: String,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn ComputeConnector>,
}

impl ScaleSetInstanceStateAttack {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn ComputeConnector>,
    ) -> Self {
        Self {
            action_id: action_id("scale_set_instance", "state"),
            credentials,
            connector,
        }
    }
}

#[async_trait]
impl Attack for ScaleSetInstanceStateAttack {
    type State = ScaleSetInstanceState;

    fn action_id(&self) -> &str {
        &self.action_id
    }

    #[instrument(skip_all, fields(action = %self.action_id))]
    async fn prepare(&self, request: &PrepareRequest) -> Result<ScaleSetInstanceState, AttackError> {
        let target = &request.target;
        let scale_set = target.require_attribute(SCALE_SET_NAME_ATTRIBUTE)?;
        let instance_id = target.require_attribute(INSTANCE_ID_ATTRIBUTE)?;
        let subscription_id = target.require_attribute(SUBSCRIPTION_ATTRIBUTE)?;
        let resource_group = target.require_attribute(RESOURCE_GROUP_ATTRIBUTE)?;
        let change: StateChangeParams = params::parse(&request.config)?;
        if !INSTANCE_ACTIONS.contains(&change.action) {
            return Err(AttackError::validation(format!(
                "action {} is not available for scale set instances, expected one of: {}",
                change.action.as_str(),
                INSTANCE_ACTIONS
                    .iter()
                    .map(VmAction::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(ScaleSetInstanceState {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            scale_set: scale_set.to_string(),
            instance_id: instance_id.to_string(),
            action: change.action,
        })
    }

    #[instrument(
        skip_all,
        fields(action = %self.action_id, scale_set = %state.scale_set, instance = %state.instance_id)
    )]
    async fn start(&self, state: &mut ScaleSetInstanceState) -> Result<(), AttackError> {
        let credential = self.credentials.credential()?;
        let scale_sets = self
            .connector
            .scale_sets(&state.subscription_id, &credential)
            .map_err(|source| AttackError::ClientConstruction {
                client: "scale set instances",
                source,
            })?;

        scale_sets
            .begin_instance_operation(
                &state.resource_group,
                &state.scale_set,
                &state.instance_id,
                state.action,
            )
            .await
            .map_err(|e| {
                AttackError::remote(
                    format!(
                        "failed to {} instance {} of scale set {}",
                        state.action.as_str(),
                        state.instance_id,
                        state.scale_set
                    ),
                    e,
                )
            })?;
        info!(
            "Requested {} of instance {} in {}",
            state.action.as_str(),
            state.instance_id,
            state.scale_set
        );
        Ok(())
    }

    async fn stop(&self, _state: &mut ScaleSetInstanceState) -> Result<(), AttackError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::{ErrorKind, Target};
    use faultline_simulator::{CloudCall, CloudState, FailurePlan, SimulatedCloud};

    fn cloud() -> Arc<SimulatedCloud> {
        let mut state = CloudState::default();
        state
            .scale_sets
            .entry("rg".into())
            .or_default()
            .entry("aks-pool".into())
            .or_default()
            .insert("0".into(), "running".into());
        Arc::new(SimulatedCloud::new(state))
    }

    fn request(action: &str) -> PrepareRequest {
        PrepareRequest::new(
            Target::default()
                .with_attribute(SCALE_SET_NAME_ATTRIBUTE, "aks-pool")
                .with_attribute(INSTANCE_ID_ATTRIBUTE, "0")
                .with_attribute(SUBSCRIPTION_ATTRIBUTE, "sub")
                .with_attribute(RESOURCE_GROUP_ATTRIBUTE, "rg"),
        )
        .with_param("action", action)
    }

    #[tokio::test]
    async fn powers_off_the_addressed_instance() {
        let cloud = cloud();
        let attack = ScaleSetInstanceStateAttack::new(cloud.clone(), cloud.clone());
        assert_eq!(
            attack.action_id(),
            "com.steadybit.extension_azure.scale_set_instance.state"
        );

        let mut state = attack.prepare(&request("power-off")).await.unwrap();
        assert_eq!(state.instance_id, "0");
        attack.start(&mut state).await.unwrap();
        assert_eq!(
            cloud.instance_state("rg", "aks-pool", "0").as_deref(),
            Some("stopped")
        );

        cloud.clear_calls();
        attack.stop(&mut state).await.unwrap();
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn start_is_not_offered() {
        let cloud = cloud();
        let attack = ScaleSetInstanceStateAttack::new(cloud.clone(), cloud.clone());
        let err = attack.prepare(&request("start")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "action start is not available for scale set instances, expected one of: restart, power-off, delete, deallocate"
        );
    }

    #[tokio::test]
    async fn prepare_requires_the_instance_id() {
        let cloud = cloud();
        let attack = ScaleSetInstanceStateAttack::new(cloud.clone(), cloud.clone());
        let request = PrepareRequest::new(
            Target::default().with_attribute(SCALE_SET_NAME_ATTRIBUTE, "aks-pool"),
        )
        .with_param("action", "restart");
        let err = attack.prepare(&request).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "target is missing 'azure-scale-set-instance.id' attribute"
        );
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_operation_names_the_instance() {
        let cloud = cloud();
        cloud.set_failures(FailurePlan {
            instance_operation: true,
            ..Default::default()
        });
        let attack = ScaleSetInstanceStateAttack::new(cloud.clone(), cloud.clone());
        let mut state = attack.prepare(&request("deallocate")).await.unwrap();
        let err = attack.start(&mut state).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed to deallocate instance 0 of scale set aks-pool"));
        assert!(cloud
            .calls()
            .iter()
            .any(|call| matches!(call, CloudCall::InstanceOperation { .. })));
    }
}
