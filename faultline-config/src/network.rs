//! Network block configuration.
//!
//! Parameters for security-rule allocation and long-running operation polling.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Security-rule allocation and polling parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[validate(schema(function = validation::validate_priority_window))]
pub struct NetworkConfig {
    /// Lowest priority handed out to block rules.
    #[validate(range(min = 100, max = 4096))]
    #[serde(default = "default_base_priority")]
    pub base_priority: u16,

    /// Highest priority handed out to block rules.
    #[validate(range(min = 100, max = 4096))]
    #[serde(default = "default_max_priority")]
    pub max_priority: u16,

    /// Interval between polls of a long-running operation.
    #[validate(range(min = 1, max = 60))]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound for a single long-running operation.
    #[validate(range(min = 1))]
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Description attached to every rule created by a block attack.
    #[validate(length(min = 1, max = 140))]
    #[serde(default = "default_rule_description")]
    pub rule_description: String,
}

fn default_base_priority() -> u16 {
    100
}
fn default_max_priority() -> u16 {
    4096
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_operation_timeout_secs() -> u64 {
    600
}
fn default_rule_description() -> String {
    "Blocked by steadybit".into()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_priority: default_base_priority(),
            max_priority: default_max_priority(),
            poll_interval_secs: default_poll_interval_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            rule_description: default_rule_description(),
        }
    }
}
