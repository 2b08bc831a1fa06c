//! Chaos module.
//!
//! Tells the simulated cloud which operations to fail. Settings operations
//! are matched by key, rule operations by rule name.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePlan {
    /// Credential resolution fails.
    pub credentials: bool,
    /// Client construction fails for every service.
    pub connect: bool,
    pub set_setting: BTreeSet<String>,
    pub delete_setting: BTreeSet<String>,
    /// Listing settings fails.
    pub list_settings: bool,
    /// Rule creation is refused when requested.
    pub reject_rule: BTreeSet<String>,
    /// Rule creation is accepted but completes with an error.
    pub create_rule: BTreeSet<String>,
    /// Rule creation is accepted and never completes.
    pub stall_rule: BTreeSet<String>,
    /// Rule deletion is rejected.
    pub delete_rule: BTreeSet<String>,
    /// Power operations are rejected.
    pub vm_operation: bool,
    /// Scale set instance operations are rejected.
    pub instance_operation: bool,
}

impl FailurePlan {
    pub fn fail_set(mut self, key: impl Into<String>) -> Self {
        self.set_setting.insert(key.into());
        self
    }

    pub fn fail_delete(mut self, key: impl Into<String>) -> Self {
        self.delete_setting.insert(key.into());
        self
    }

    pub fn fail_create_rule(mut self, name: impl Into<String>) -> Self {
        self.create_rule.insert(name.into());
        self
    }

    pub fn reject_rule(mut self, name: impl Into<String>) -> Self {
        self.reject_rule.insert(name.into());
        self
    }

    pub fn stall_rule(mut self, name: impl Into<String>) -> Self {
        self.stall_rule.insert(name.into());
        self
    }

    pub fn fail_delete_rule(mut self, name: impl Into<String>) -> Self {
        self.delete_rule.insert(name.into());
        self
    }
}
