//! Network and web app API boundary.
//!
//! Only the calls the block attack needs. Rule creation and deletion are
//! long-running: the `begin_*` calls return an operation that is polled to
//! completion with [`faultline_core::poll_until_done`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use faultline_core::params::Direction;
use faultline_core::{Credential, LongRunningOperation, RemoteError};

/// Matches any address, port or protocol.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRule {
    pub name: String,
    pub priority: u16,
    pub direction: Direction,
    pub access: Access,
    pub protocol: String,
    pub source_address_prefix: String,
    pub source_port_range: String,
    pub destination_address_prefix: String,
    pub destination_port_range: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SecurityRule {
    /// Deny rule for all traffic between `address` and anything, in `direction`.
    ///
    /// Inbound rules restrict the source, outbound rules the destination.
    pub fn deny(
        name: impl Into<String>,
        priority: u16,
        direction: Direction,
        address: &str,
        description: &str,
    ) -> Self {
        let (source, destination) = match direction {
            Direction::Inbound => (address, WILDCARD),
            Direction::Outbound => (WILDCARD, address),
        };
        Self {
            name: name.into(),
            priority,
            direction,
            access: Access::Deny,
            protocol: WILDCARD.to_string(),
            source_address_prefix: source.to_string(),
            source_port_range: WILDCARD.to_string(),
            destination_address_prefix: destination.to_string(),
            destination_port_range: WILDCARD.to_string(),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub rules: Vec<SecurityRule>,
}

impl SecurityGroup {
    pub fn is_attached_to(&self, subnet_id: &str) -> bool {
        self.subnet_ids
            .iter()
            .any(|id| id.eq_ignore_ascii_case(subnet_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroupPage {
    pub groups: Vec<SecurityGroup>,
    pub next: Option<String>,
}

/// The part of a web app description the block attack reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub virtual_network_subnet_id: Option<String>,
}

#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn list_security_groups(
        &self,
        resource_group: &str,
        continuation: Option<String>,
    ) -> Result<SecurityGroupPage, RemoteError>;

    async fn get_security_group(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<SecurityGroup, RemoteError>;

    async fn begin_create_rule(
        &self,
        resource_group: &str,
        security_group: &str,
        rule: SecurityRule,
    ) -> Result<Box<dyn LongRunningOperation<SecurityRule>>, RemoteError>;

    async fn begin_delete_rule(
        &self,
        resource_group: &str,
        security_group: &str,
        rule_name: &str,
    ) -> Result<Box<dyn LongRunningOperation<()>>, RemoteError>;
}

#[async_trait]
pub trait WebAppsApi: Send + Sync {
    async fn get_site(&self, resource_group: &str, name: &str) -> Result<Site, RemoteError>;
}

/// Builds per-subscription API clients.
pub trait NetworkConnector: Send + Sync {
    fn network(
        &self,
        subscription_id: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn NetworkApi>, RemoteError>;

    fn web_apps(
        &self,
        subscription_id: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn WebAppsApi>, RemoteError>;
}

/// Drains every page of the group listing of a resource group.
pub async fn list_all_security_groups(
    api: &dyn NetworkApi,
    resource_group: &str,
) -> Result<Vec<SecurityGroup>, RemoteError> {
    let mut groups = Vec::new();
    let mut continuation = None;
    loop {
        let page = api.list_security_groups(resource_group, continuation).await?;
        groups.extend(page.groups);
        match page.next {
            Some(token) => continuation = Some(token),
            None => return Ok(groups),
        }
    }
}
