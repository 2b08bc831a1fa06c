//! Controller request model.
//!
//! The controller sends an opaque target attribute map and a parameter map
//! keyed by declared parameter names. Attacks read attributes through
//! [`Target`] and turn the parameter map into a typed struct with
//! [`crate::params::parse`] exactly once, during prepare.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AttackError;

/// Label attribute shared by every discovered target.
pub const LABEL_ATTRIBUTE: &str = "steadybit.label";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
}

impl Target {
    /// First value of an attribute, if any.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn require_attribute(&self, key: &str) -> Result<&str, AttackError> {
        self.attribute(key).ok_or_else(|| {
            AttackError::validation(format!("target is missing '{}' attribute", key))
        })
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    #[serde(default)]
    pub experiment_key: Option<String>,
    #[serde(default)]
    pub execution_id: Option<i64>,
}

/// Body of a prepare call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub execution_context: ExecutionContext,
}

impl PrepareRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.config.insert(name.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_controller_body() {
        let body = json!({
            "target": {
                "name": "func1",
                "attributes": { "azure-function.resource.id": ["/subscriptions/s/resourceGroups/rg"] }
            },
            "config": { "rate": 50.0, "hosts": ["10.0.0.5"] },
            "executionContext": { "experimentKey": "EXP-1", "executionId": 7 }
        });

        let request: PrepareRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.target.name.as_deref(), Some("func1"));
        assert_eq!(
            request.target.attribute("azure-function.resource.id"),
            Some("/subscriptions/s/resourceGroups/rg")
        );
        assert_eq!(request.execution_context.execution_id, Some(7));
        assert_eq!(request.config["rate"], json!(50.0));
    }

    #[test]
    fn missing_and_empty_attributes_are_reported() {
        let target = Target::default().with_attribute("steadybit.label", "");
        let err = target.require_attribute("steadybit.label").unwrap_err();
        assert_eq!(err.to_string(), "target is missing 'steadybit.label' attribute");
        assert!(target.require_attribute("other").is_err());
    }
}
