//! Simulated security groups, web apps and DNS.
//!
//! Rule creation and deletion behave like the real API: the request is
//! accepted, the change lands when the operation completes, and a priority
//! already taken by another rule in the group is rejected with a conflict.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use faultline_core::{Credential, LongRunningOperation, PollStatus, RemoteError};
use faultline_prevention::{
    HostResolver, NetworkApi, NetworkConnector, SecurityGroup, SecurityGroupPage, SecurityRule,
    Site, WebAppsApi,
};

use crate::cloud::{CloudCall, SimulatedCloud};

enum Change {
    Create(SecurityRule),
    Delete(String),
}

/// A rule change that lands after a number of pending polls.
struct RuleOperation {
    cloud: SimulatedCloud,
    resource_group: String,
    security_group: String,
    change: Change,
    pending: u32,
    stalled: bool,
    failure: Option<RemoteError>,
}

impl RuleOperation {
    fn apply(&mut self) -> Result<(), RemoteError> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        let resource_group = self.resource_group.clone();
        let security_group = self.security_group.clone();
        self.cloud.with_state(|state| {
            let group = state
                .security_groups
                .get_mut(&resource_group)
                .and_then(|groups| groups.iter_mut().find(|g| g.name == security_group))
                .ok_or_else(|| RemoteError::NotFound(security_group.clone()))?;
            match &self.change {
                Change::Create(rule) => {
                    if group
                        .rules
                        .iter()
                        .any(|r| r.priority == rule.priority && r.name != rule.name)
                    {
                        return Err(RemoteError::Conflict(format!(
                            "priority {} is already used in {}",
                            rule.priority, security_group
                        )));
                    }
                    group.rules.retain(|r| r.name != rule.name);
                    group.rules.push(rule.clone());
                }
                Change::Delete(name) => group.rules.retain(|r| &r.name != name),
            }
            Ok(())
        })
    }

    /// Advances one poll; `true` once the change has landed.
    fn step(&mut self) -> Result<bool, RemoteError> {
        if self.stalled {
            return Ok(false);
        }
        if self.pending > 0 {
            self.pending -= 1;
            return Ok(false);
        }
        self.apply()?;
        Ok(true)
    }
}

struct CreateOperation(RuleOperation);

#[async_trait]
impl LongRunningOperation<SecurityRule> for CreateOperation {
    async fn poll(&mut self) -> Result<PollStatus<SecurityRule>, RemoteError> {
        if !self.0.step()? {
            return Ok(PollStatus::Pending);
        }
        match &self.0.change {
            Change::Create(rule) => Ok(PollStatus::Done(rule.clone())),
            Change::Delete(name) => Err(RemoteError::OperationFailed(format!(
                "{} is not a creation",
                name
            ))),
        }
    }
}

struct DeleteOperation(RuleOperation);

#[async_trait]
impl LongRunningOperation<()> for DeleteOperation {
    async fn poll(&mut self) -> Result<PollStatus<()>, RemoteError> {
        Ok(if self.0.step()? {
            PollStatus::Done(())
        } else {
            PollStatus::Pending
        })
    }
}

impl NetworkConnector for SimulatedCloud {
    fn network(
        &self,
        subscription_id: &str,
        _credential: &Credential,
    ) -> Result<Arc<dyn NetworkApi>, RemoteError> {
        self.record(CloudCall::Connect {
            service: "network".into(),
            target: subscription_id.into(),
        });
        if self.with_failures_ref(|plan| plan.connect) {
            return Err(RemoteError::Transport("network endpoint unreachable".into()));
        }
        Ok(Arc::new(self.clone()))
    }

    fn web_apps(
        &self,
        subscription_id: &str,
        _credential: &Credential,
    ) -> Result<Arc<dyn WebAppsApi>, RemoteError> {
        self.record(CloudCall::Connect {
            service: "web apps".into(),
            target: subscription_id.into(),
        });
        if self.with_failures_ref(|plan| plan.connect) {
            return Err(RemoteError::Transport("web apps endpoint unreachable".into()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl NetworkApi for SimulatedCloud {
    async fn list_security_groups(
        &self,
        resource_group: &str,
        continuation: Option<String>,
    ) -> Result<SecurityGroupPage, RemoteError> {
        self.record(CloudCall::ListSecurityGroups {
            resource_group: resource_group.into(),
        });
        let start = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| RemoteError::Service {
                status: 400,
                message: format!("invalid continuation token {}", token),
            })?,
            None => 0,
        };
        let groups: Vec<SecurityGroup> = self.with_state(|state| {
            state
                .security_groups
                .get(resource_group)
                .cloned()
                .unwrap_or_default()
        });
        let end = (start + self.tuning().page_size).min(groups.len());
        Ok(SecurityGroupPage {
            groups: groups.get(start..end).map(<[SecurityGroup]>::to_vec).unwrap_or_default(),
            next: (end < groups.len()).then(|| end.to_string()),
        })
    }

    async fn get_security_group(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<SecurityGroup, RemoteError> {
        self.record(CloudCall::GetSecurityGroup {
            resource_group: resource_group.into(),
            name: name.into(),
        });
        self.with_state(|state| {
            state
                .security_groups
                .get(resource_group)
                .and_then(|groups| groups.iter().find(|g| g.name == name))
                .cloned()
        })
        .ok_or_else(|| RemoteError::NotFound(format!("network security group {}", name)))
    }

    async fn begin_create_rule(
        &self,
        resource_group: &str,
        security_group: &str,
        rule: SecurityRule,
    ) -> Result<Box<dyn LongRunningOperation<SecurityRule>>, RemoteError> {
        self.record(CloudCall::CreateRule {
            security_group: security_group.into(),
            name: rule.name.clone(),
            priority: rule.priority,
        });
        if self.with_failures_ref(|plan| plan.reject_rule.contains(&rule.name)) {
            return Err(RemoteError::Service {
                status: 429,
                message: format!("creation of {} was throttled", rule.name),
            });
        }
        let (failure, stalled) = self.with_failures_ref(|plan| {
            (
                plan.create_rule.contains(&rule.name).then(|| {
                    RemoteError::OperationFailed(format!("simulated failure for {}", rule.name))
                }),
                plan.stall_rule.contains(&rule.name),
            )
        });
        debug!(priority = rule.priority, "Accepted creation of {}", rule.name);
        Ok(Box::new(CreateOperation(RuleOperation {
            cloud: self.clone(),
            resource_group: resource_group.into(),
            security_group: security_group.into(),
            change: Change::Create(rule),
            pending: self.tuning().pending_polls,
            stalled,
            failure,
        })))
    }

    async fn begin_delete_rule(
        &self,
        resource_group: &str,
        security_group: &str,
        rule_name: &str,
    ) -> Result<Box<dyn LongRunningOperation<()>>, RemoteError> {
        self.record(CloudCall::DeleteRule {
            security_group: security_group.into(),
            name: rule_name.into(),
        });
        if self.with_failures_ref(|plan| plan.delete_rule.contains(rule_name)) {
            return Err(RemoteError::Service {
                status: 500,
                message: format!("simulated failure for {}", rule_name),
            });
        }
        Ok(Box::new(DeleteOperation(RuleOperation {
            cloud: self.clone(),
            resource_group: resource_group.into(),
            security_group: security_group.into(),
            change: Change::Delete(rule_name.into()),
            pending: self.tuning().pending_polls,
            stalled: false,
            failure: None,
        })))
    }
}

#[async_trait]
impl WebAppsApi for SimulatedCloud {
    async fn get_site(&self, resource_group: &str, name: &str) -> Result<Site, RemoteError> {
        self.record(CloudCall::GetSite {
            resource_group: resource_group.into(),
            name: name.into(),
        });
        self.with_state(|state| {
            state
                .sites
                .get(resource_group)
                .and_then(|sites| sites.iter().find(|s| s.name == name))
                .cloned()
        })
        .ok_or_else(|| RemoteError::NotFound(format!("site {}", name)))
    }
}

#[async_trait]
impl HostResolver for SimulatedCloud {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.record(CloudCall::Lookup { host: host.into() });
        self.with_state(|state| state.dns.get(host).cloned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} has no records", host)))
    }
}
