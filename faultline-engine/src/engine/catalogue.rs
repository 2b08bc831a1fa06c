//! ## faultline-engine::catalogue
//! **The closed set of attacks the agent offers**
//!
//! Every action id maps to exactly one [`AttackVariant`]. Variants share the
//! [`Attack`] contract; [`ExecutionState`] is the matching tagged union of
//! their per-execution states, so the registry can hold any of them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use faultline_config::{AgentConfig, FamiliesConfig};
use faultline_core::{
    Attack, AttackError, ComputeConnector, CredentialProvider, PrepareRequest,
};
use faultline_injection::{FaultInjectionAttack, FaultInjectionState, FaultKind, StoreConnector, TargetFamily};
use faultline_prevention::{BlockAttack, BlockState, BlockTarget, HostResolver, NetworkConnector};
use faultline_telemetry::MetricsRecorder;

use crate::engine::scale_set::{ScaleSetInstanceState, ScaleSetInstanceStateAttack};
use crate::engine::vm::{VmState, VmStateAttack};

/// Cloud boundaries every attack is built from.
#[derive(Clone)]
pub struct CloudConnectors {
    pub credentials: Arc<dyn CredentialProvider>,
    pub store: Arc<dyn StoreConnector>,
    pub network: Arc<dyn NetworkConnector>,
    pub compute: Arc<dyn ComputeConnector>,
    pub resolver: Arc<dyn HostResolver>,
}

impl CloudConnectors {
    /// All boundaries served by one backend, e.g. the simulated cloud.
    pub fn uniform<C>(cloud: Arc<C>) -> Self
    where
        C: CredentialProvider
            + StoreConnector
            + NetworkConnector
            + ComputeConnector
            + HostResolver
            + 'static,
    {
        Self {
            credentials: cloud.clone(),
            store: cloud.clone(),
            network: cloud.clone(),
            compute: cloud.clone(),
            resolver: cloud,
        }
    }
}

/// Per-execution state of any attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Injection(FaultInjectionState),
    Block(BlockState),
    VmState(VmState),
    ScaleSetInstance(ScaleSetInstanceState),
}

impl ExecutionState {
    /// Security rules still to be removed; empty for every other attack.
    pub fn remaining_rules(&self) -> Vec<String> {
        match self {
            ExecutionState::Block(state) => state.rule_names.clone(),
            _ => Vec::new(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ExecutionState::Injection(_) => "injection",
            ExecutionState::Block(_) => "block",
            ExecutionState::VmState(_) => "vm_state",
            ExecutionState::ScaleSetInstance(_) => "scale_set_instance",
        }
    }
}

pub enum AttackVariant {
    Injection(FaultInjectionAttack),
    Block(BlockAttack),
    VmState(VmStateAttack),
    ScaleSetInstance(ScaleSetInstanceStateAttack),
}

/// Runs `$body` with the variant's attack and its own state type, or fails
/// when the state belongs to another kind of attack.
macro_rules! dispatch {
    ($variant:expr, $state:expr, $execution:expr, |$attack:ident, $inner:ident| $body:expr) => {
        match ($variant, $state) {
            (AttackVariant::Injection($attack), ExecutionState::Injection($inner)) => $body,
            (AttackVariant::Block($attack), ExecutionState::Block($inner)) => $body,
            (AttackVariant::VmState($attack), ExecutionState::VmState($inner)) => $body,
            (
                AttackVariant::ScaleSetInstance($attack),
                ExecutionState::ScaleSetInstance($inner),
            ) => $body,
            (variant, state) => Err(AttackError::StateMismatch(
                format!("{} ({})", $execution, state.kind()),
                variant.action_id().to_string(),
            )),
        }
    };
}

impl AttackVariant {
    pub fn action_id(&self) -> &str {
        match self {
            AttackVariant::Injection(attack) => attack.action_id(),
            AttackVariant::Block(attack) => attack.action_id(),
            AttackVariant::VmState(attack) => attack.action_id(),
            AttackVariant::ScaleSetInstance(attack) => attack.action_id(),
        }
    }

    pub fn describe(&self) -> ActionDescription {
        let (label, category, time_control) = match self {
            AttackVariant::Injection(attack) => (
                format!(
                    "Inject {} into {}",
                    attack.kind().as_str().replace('_', " "),
                    attack.family().as_str().replace('_', " ")
                ),
                "fault injection",
                TimeControl::External,
            ),
            AttackVariant::Block(_) => (
                "Block traffic".to_string(),
                "network",
                TimeControl::External,
            ),
            AttackVariant::VmState(_) => (
                "Change virtual machine state".to_string(),
                "state",
                TimeControl::Instantaneous,
            ),
            AttackVariant::ScaleSetInstance(_) => (
                "Change scale set instance state".to_string(),
                "state",
                TimeControl::Instantaneous,
            ),
        };
        ActionDescription {
            id: self.action_id().to_string(),
            label,
            category: category.to_string(),
            time_control,
        }
    }

    pub async fn prepare(&self, request: &PrepareRequest) -> Result<ExecutionState, AttackError> {
        Ok(match self {
            AttackVariant::Injection(attack) => {
                ExecutionState::Injection(attack.prepare(request).await?)
            }
            AttackVariant::Block(attack) => ExecutionState::Block(attack.prepare(request).await?),
            AttackVariant::VmState(attack) => {
                ExecutionState::VmState(attack.prepare(request).await?)
            }
            AttackVariant::ScaleSetInstance(attack) => {
                ExecutionState::ScaleSetInstance(attack.prepare(request).await?)
            }
        })
    }

    pub async fn start(
        &self,
        execution: &str,
        state: &mut ExecutionState,
    ) -> Result<(), AttackError> {
        dispatch!(self, state, execution, |attack, inner| attack.start(inner).await)
    }

    pub async fn stop(
        &self,
        execution: &str,
        state: &mut ExecutionState,
    ) -> Result<(), AttackError> {
        dispatch!(self, state, execution, |attack, inner| attack.stop(inner).await)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeControl {
    /// Completes during start; stop has nothing to revert.
    Instantaneous,
    /// Stays active until the controller calls stop.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescription {
    pub id: String,
    pub label: String,
    pub category: String,
    pub time_control: TimeControl,
}

fn injection_enabled(families: &FamiliesConfig, family: TargetFamily) -> bool {
    match family {
        TargetFamily::FunctionApp => families.function_apps,
        TargetFamily::ContainerApp => families.container_apps,
        TargetFamily::AppConfiguration => families.app_configurations,
    }
}

fn block_enabled(families: &FamiliesConfig, target: BlockTarget) -> bool {
    match target {
        BlockTarget::FunctionApp => families.function_apps,
        BlockTarget::SecurityGroup => families.network_security_groups,
    }
}

/// Every attack the agent offers, keyed by action id.
pub struct Catalogue {
    attacks: BTreeMap<String, AttackVariant>,
}

const INJECTION_ACTIONS: [(TargetFamily, &[FaultKind]); 3] = [
    (
        TargetFamily::FunctionApp,
        &[
            FaultKind::Latency,
            FaultKind::Exception,
            FaultKind::StatusCode,
            FaultKind::FillDisk,
        ],
    ),
    (
        TargetFamily::ContainerApp,
        &[FaultKind::Latency, FaultKind::StatusCode],
    ),
    (
        TargetFamily::AppConfiguration,
        &[
            FaultKind::Latency,
            FaultKind::Exception,
            FaultKind::StatusCode,
            FaultKind::FillDisk,
        ],
    ),
];

impl Catalogue {
    pub fn new(
        config: &AgentConfig,
        connectors: &CloudConnectors,
        metrics: Option<&MetricsRecorder>,
    ) -> Self {
        let families = &config.families;
        let mut variants = Vec::new();

        for (family, kinds) in INJECTION_ACTIONS {
            if !injection_enabled(families, family) {
                continue;
            }
            for kind in kinds {
                let attack = FaultInjectionAttack::new(
                    family,
                    *kind,
                    config.injection.clone(),
                    connectors.credentials.clone(),
                    connectors.store.clone(),
                );
                variants.push(AttackVariant::Injection(match metrics {
                    Some(metrics) => attack.with_metrics(metrics.clone()),
                    None => attack,
                }));
            }
        }

        for target in [BlockTarget::FunctionApp, BlockTarget::SecurityGroup] {
            if !block_enabled(families, target) {
                continue;
            }
            let attack = BlockAttack::new(
                target,
                config.azure.clone(),
                config.network.clone(),
                connectors.credentials.clone(),
                connectors.network.clone(),
                connectors.resolver.clone(),
            );
            variants.push(AttackVariant::Block(match metrics {
                Some(metrics) => attack.with_metrics(metrics.clone()),
                None => attack,
            }));
        }

        if families.virtual_machines {
            variants.push(AttackVariant::VmState(VmStateAttack::new(
                connectors.credentials.clone(),
                connectors.compute.clone(),
            )));
        }
        if families.scale_set_instances {
            variants.push(AttackVariant::ScaleSetInstance(
                ScaleSetInstanceStateAttack::new(
                    connectors.credentials.clone(),
                    connectors.compute.clone(),
                ),
            ));
        }

        Self {
            attacks: variants
                .into_iter()
                .map(|variant| (variant.action_id().to_string(), variant))
                .collect(),
        }
    }

    pub fn get(&self, action_id: &str) -> Option<&AttackVariant> {
        self.attacks.get(action_id)
    }

    pub fn describe(&self) -> Vec<ActionDescription> {
        self.attacks.values().map(AttackVariant::describe).collect()
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }
}
