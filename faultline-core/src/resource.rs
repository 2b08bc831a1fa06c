//! Cloud resource id parsing.
//!
//! Resource ids look like
//! `/subscriptions/<sub>/resourceGroups/<group>/providers/<namespace>/<type>/<name>`.
//! Only positional access is needed: subscription at segment 1, resource group
//! at segment 3 and the resource name at segment 7.

use std::fmt;

use crate::error::AttackError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    raw: String,
    segments: Vec<String>,
}

impl ResourceId {
    /// Parses any id with at least eight segments after the leading slash.
    pub fn parse(raw: &str) -> Result<Self, AttackError> {
        let segments: Vec<String> = raw
            .trim_start_matches('/')
            .split('/')
            .map(str::to_string)
            .collect();

        if segments.len() < 8 || segments.iter().take(8).any(String::is_empty) {
            return Err(AttackError::validation(format!(
                "invalid resource id format: {}",
                raw
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Parses a configuration store id, which must have exactly eight segments
    /// (nine `/`-separated parts including the leading empty one).
    pub fn parse_app_configuration(raw: &str) -> Result<Self, AttackError> {
        if raw.split('/').count() != 9 {
            return Err(AttackError::validation(format!(
                "invalid app configuration id format: {}",
                raw
            )));
        }
        Self::parse(raw)
    }

    pub fn subscription_id(&self) -> &str {
        &self.segments[1]
    }

    pub fn resource_group(&self) -> &str {
        &self.segments[3]
    }

    pub fn provider(&self) -> &str {
        &self.segments[5]
    }

    pub fn resource_type(&self) -> &str {
        &self.segments[6]
    }

    pub fn name(&self) -> &str {
        &self.segments[7]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION_ID: &str =
        "/subscriptions/12345678-1234-1234-1234-123456789012/resourceGroups/test-rg/providers/Microsoft.Web/sites/func1";

    #[test]
    fn splits_function_app_id() {
        let id = ResourceId::parse(FUNCTION_ID).unwrap();
        assert_eq!(id.subscription_id(), "12345678-1234-1234-1234-123456789012");
        assert_eq!(id.resource_group(), "test-rg");
        assert_eq!(id.provider(), "Microsoft.Web");
        assert_eq!(id.resource_type(), "sites");
        assert_eq!(id.name(), "func1");
    }

    #[test]
    fn short_ids_fail_validation() {
        let err = ResourceId::parse("invalid-resource-id").unwrap_err();
        assert!(err.to_string().contains("invalid resource id format"));
        assert!(ResourceId::parse("/subscriptions/s/resourceGroups/rg").is_err());
    }

    #[test]
    fn app_configuration_ids_need_exactly_nine_parts() {
        let id = ResourceId::parse_app_configuration(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.AppConfiguration/configurationStores/store1",
        )
        .unwrap();
        assert_eq!(id.name(), "store1");

        assert!(ResourceId::parse_app_configuration(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.AppConfiguration/configurationStores/store1/extra",
        )
        .is_err());
    }
}
