//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration modules.

use regex::Regex;
use validator::ValidationError;

use crate::network::NetworkConfig;

/// Validate that a settings store endpoint has the `https://<name>.<domain>.<tld>` shape.
pub fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    let re = Regex::new(r"^https://[a-zA-Z0-9-]+\.[a-zA-Z0-9-]+\.[a-zA-Z]+/?$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(endpoint) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_endpoint"))
    }
}

/// Validate that a subscription identifier is a GUID.
pub fn validate_subscription(id: &str) -> Result<(), ValidationError> {
    let re = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_subscription_id"))
    }
}

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"].contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// The rule priority window must leave room for at least one rule.
pub fn validate_priority_window(network: &NetworkConfig) -> Result<(), ValidationError> {
    if network.base_priority <= network.max_priority {
        Ok(())
    } else {
        Err(ValidationError::new("base_priority_above_max_priority"))
    }
}
