//! ## faultline-prevention::block
//! **Network block through security group deny rules**
//!
//! ### Flow:
//! 1. Prepare: parse the target id, resolve every host entry, and for
//!    function apps look up the integrated subnet. Nothing is mutated.
//! 2. Start: find the security group, allocate one priority per address and
//!    create one deny rule per address, strictly in input order. Each rule
//!    name is appended to the state as soon as its create completes.
//! 3. Any create failure rolls back every rule recorded so far.
//! 4. Stop deletes the recorded rules and prunes each one from the state as
//!    it goes, so a retried stop only targets what is left.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use faultline_config::{AzureConfig, NetworkConfig};
use faultline_core::attack::action_id;
use faultline_core::params::{self, BlockParams, Direction};
use faultline_core::{
    poll_until_done, Attack, AttackError, CredentialProvider, PollOptions, PrepareRequest,
    ResourceId, Target,
};
use faultline_telemetry::MetricsRecorder;

use crate::allocator::PriorityAllocator;
use crate::api::{list_all_security_groups, NetworkApi, NetworkConnector, SecurityGroup, SecurityRule};
use crate::resolver::{resolve_hosts, HostResolver};

pub const FUNCTION_ID_ATTRIBUTE: &str = "azure-function.resource.id";
pub const SECURITY_GROUP_ID_ATTRIBUTE: &str = "network-security-group.id";
pub const SUBSCRIPTION_ATTRIBUTE: &str = "azure.subscription.id";
pub const RULE_NAME_PREFIX: &str = "SteadybitBlockRule";

/// What the block attack is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTarget {
    /// Function app integrated into a virtual network subnet.
    FunctionApp,
    /// Security group addressed directly by id.
    SecurityGroup,
}

impl BlockTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockTarget::FunctionApp => "azure_function",
            BlockTarget::SecurityGroup => "nsg",
        }
    }

    fn id_attribute(&self) -> &'static str {
        match self {
            BlockTarget::FunctionApp => FUNCTION_ID_ATTRIBUTE,
            BlockTarget::SecurityGroup => SECURITY_GROUP_ID_ATTRIBUTE,
        }
    }
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn rule_name(index: usize) -> String {
    format!("{}-{}", RULE_NAME_PREFIX, index)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHostsConfig {
    /// Informational only; deny rules are all-or-nothing.
    pub rate: u8,
    pub blocked_addresses: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    pub resource_id: String,
    pub subscription_id: String,
    pub resource_group: String,
    /// Subnet of a function app target; `None` for security group targets.
    pub subnet_id: Option<String>,
    /// Known from prepare for security group targets, from start otherwise.
    pub security_group_name: Option<String>,
    pub config: BlockHostsConfig,
    /// Rules created by start that still exist, in creation order.
    pub rule_names: Vec<String>,
}

pub struct BlockAttack {
    target: BlockTarget,
    action_id: String,
    azure: AzureConfig,
    network: NetworkConfig,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn NetworkConnector>,
    resolver: Arc<dyn HostResolver>,
    metrics: Option<MetricsRecorder>,
}

impl BlockAttack {
    pub fn new(
        target: BlockTarget,
        azure: AzureConfig,
        network: NetworkConfig,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn NetworkConnector>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self {
            target,
            action_id: action_id(target.as_str(), "block"),
            azure,
            network,
            credentials,
            connector,
            resolver,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn subscription(&self, target: &Target) -> Result<String, AttackError> {
        target
            .attribute(SUBSCRIPTION_ATTRIBUTE)
            .or(self.azure.subscription_id.as_deref().filter(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| AttackError::validation("'AZURE_SUBSCRIPTION_ID' is not configured"))
    }

    fn network_api(&self, subscription_id: &str) -> Result<Arc<dyn NetworkApi>, AttackError> {
        let credential = self.credentials.credential()?;
        self.connector
            .network(subscription_id, &credential)
            .map_err(|source| AttackError::ClientConstruction {
                client: "security rules",
                source,
            })
    }

    fn poll_options(&self) -> PollOptions {
        PollOptions::from(&self.network)
    }

    async fn subnet_of_function(
        &self,
        subscription_id: &str,
        id: &ResourceId,
    ) -> Result<String, AttackError> {
        let credential = self.credentials.credential()?;
        let web_apps = self
            .connector
            .web_apps(subscription_id, &credential)
            .map_err(|source| AttackError::ClientConstruction {
                client: "app service",
                source,
            })?;
        let site = web_apps
            .get_site(id.resource_group(), id.name())
            .await
            .map_err(|e| AttackError::remote("failed to get function app", e))?;
        site.virtual_network_subnet_id
            .filter(|subnet| !subnet.is_empty())
            .ok_or_else(|| {
                AttackError::resolution(format!(
                    "function app {} is not integrated into a virtual network",
                    id.name()
                ))
            })
    }

    async fn security_group(
        &self,
        api: &dyn NetworkApi,
        state: &BlockState,
    ) -> Result<SecurityGroup, AttackError> {
        if let Some(name) = &state.security_group_name {
            return api
                .get_security_group(&state.resource_group, name)
                .await
                .map_err(|e| {
                    AttackError::remote(format!("unable to retrieve network security group {}", name), e)
                });
        }

        let subnet_id = state.subnet_id.as_deref().unwrap_or_default();
        let groups = list_all_security_groups(api, &state.resource_group)
            .await
            .map_err(|e| AttackError::remote("unable to retrieve network security groups", e))?;
        if groups.is_empty() {
            return Err(AttackError::resolution(format!(
                "resource group {} does not have any network security groups",
                state.resource_group
            )));
        }
        groups
            .into_iter()
            .find(|group| group.is_attached_to(subnet_id))
            .ok_or_else(|| {
                AttackError::resolution(format!(
                    "no security group is attached to the subnet {}",
                    subnet_id
                ))
            })
    }

    /// Creates one rule and records it in the state once it exists.
    async fn create_rule(
        &self,
        api: &dyn NetworkApi,
        state: &mut BlockState,
        group: &str,
        allocator: &mut PriorityAllocator,
        index: usize,
    ) -> Result<(), AttackError> {
        let name = rule_name(index);
        let priority = allocator.allocate()?;
        let rule = SecurityRule::deny(
            name.clone(),
            priority,
            state.config.direction,
            &state.config.blocked_addresses[index],
            &self.network.rule_description,
        );

        let mut operation = api
            .begin_create_rule(&state.resource_group, group, rule)
            .await
            .map_err(|e| AttackError::remote(format!("failed to create security rule {}", name), e))?;
        poll_until_done(
            operation.as_mut(),
            self.poll_options(),
            &format!("creating security rule {}", name),
        )
        .await?;

        debug!(priority, "Created security rule {}", name);
        state.rule_names.push(name);
        if let Some(metrics) = &self.metrics {
            metrics.rules_created.inc();
        }
        Ok(())
    }

    /// Deletes recorded rules front to back, pruning each one once it is gone.
    /// Stops at the first failure; the state then lists what is left.
    async fn delete_rules(
        &self,
        api: &dyn NetworkApi,
        state: &mut BlockState,
    ) -> Result<(), AttackError> {
        let group = state.security_group_name.clone().ok_or_else(|| {
            AttackError::validation("execution state does not name a security group")
        })?;

        while let Some(name) = state.rule_names.first().cloned() {
            let mut operation = api
                .begin_delete_rule(&state.resource_group, &group, &name)
                .await
                .map_err(|e| {
                    AttackError::remote(format!("failed to delete security rule {}", name), e)
                })?;
            poll_until_done(
                operation.as_mut(),
                self.poll_options(),
                &format!("deleting security rule {}", name),
            )
            .await?;

            debug!("Deleted security rule {}", name);
            state.rule_names.remove(0);
            if let Some(metrics) = &self.metrics {
                metrics.rules_deleted.inc();
            }
        }
        Ok(())
    }

    /// Removes everything created so far and folds the outcome into one error.
    async fn roll_back(
        &self,
        api: &dyn NetworkApi,
        state: &mut BlockState,
        cause: AttackError,
    ) -> AttackError {
        if state.rule_names.is_empty() {
            return cause;
        }

        let created = state.rule_names.len();
        warn!(created, "Rolling back security rules after: {}", cause);
        match self.delete_rules(api, state).await {
            Ok(()) => AttackError::RolledBack {
                cause: Box::new(cause),
                rolled_back: created,
            },
            Err(cleanup) => {
                if let Some(metrics) = &self.metrics {
                    metrics.rollback_failures.inc();
                }
                AttackError::CleanupFailed {
                    cause: Box::new(cause),
                    cleanup: Box::new(cleanup),
                    remaining: state.rule_names.clone(),
                }
            }
        }
    }
}

#[async_trait]
impl Attack for BlockAttack {
    type State = BlockState;

    fn action_id(&self) -> &str {
        &self.action_id
    }

    #[instrument(skip_all, fields(action = %self.action_id))]
    async fn prepare(&self, request: &PrepareRequest) -> Result<BlockState, AttackError> {
        let raw_id = request.target.require_attribute(self.target.id_attribute())?;
        let id = ResourceId::parse(raw_id)?;
        let block: BlockParams = params::parse(&request.config)?;
        let blocked_addresses = resolve_hosts(self.resolver.as_ref(), &block.hosts).await?;
        let subscription_id = self.subscription(&request.target)?;

        let (subnet_id, security_group_name) = match self.target {
            BlockTarget::FunctionApp => (
                Some(self.subnet_of_function(&subscription_id, &id).await?),
                None,
            ),
            BlockTarget::SecurityGroup => (None, Some(id.name().to_string())),
        };

        Ok(BlockState {
            resource_id: id.as_str().to_string(),
            subscription_id,
            resource_group: id.resource_group().to_string(),
            subnet_id,
            security_group_name,
            config: BlockHostsConfig {
                rate: block.rate,
                blocked_addresses,
                direction: block.direction,
            },
            rule_names: Vec::new(),
        })
    }

    #[instrument(skip_all, fields(action = %self.action_id, resource = %state.resource_id))]
    async fn start(&self, state: &mut BlockState) -> Result<(), AttackError> {
        let api = self.network_api(&state.subscription_id)?;
        let group = self.security_group(api.as_ref(), state).await?;
        state.security_group_name = Some(group.name.clone());

        let mut allocator = PriorityAllocator::new(
            self.network.base_priority,
            self.network.max_priority,
            group.rules.iter().map(|rule| rule.priority),
        );

        for index in 0..state.config.blocked_addresses.len() {
            if let Err(cause) = self
                .create_rule(api.as_ref(), state, &group.name, &mut allocator, index)
                .await
            {
                return Err(self.roll_back(api.as_ref(), state, cause).await);
            }
        }

        info!(
            rules = state.rule_names.len(),
            direction = %state.config.direction,
            "Blocked traffic in security group {}",
            group.name
        );
        Ok(())
    }

    #[instrument(skip_all, fields(action = %self.action_id, resource = %state.resource_id))]
    async fn stop(&self, state: &mut BlockState) -> Result<(), AttackError> {
        if state.rule_names.is_empty() {
            debug!("No security rules to remove");
            return Ok(());
        }
        let api = self.network_api(&state.subscription_id)?;
        self.delete_rules(api.as_ref(), state).await?;
        info!("Removed all security rules of {}", state.resource_id);
        Ok(())
    }
}
