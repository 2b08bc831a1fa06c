//! Where a target's fault settings live.
//!
//! Every target family points at one settings store endpoint and optionally
//! a namespace inside it. Targets that advertise their own store share it
//! with other workloads and get a namespace (their label). Targets without
//! one fall back to the configured global store and the global namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use faultline_config::InjectionConfig;
use faultline_core::request::LABEL_ATTRIBUTE;
use faultline_core::{AttackError, ResourceId, Target};

use crate::encoder::{namespace_prefix, setting_key};

pub const FUNCTION_ENDPOINT_ATTRIBUTE: &str = "azure-function.app-configuration.endpoint";
pub const CONTAINER_ENDPOINT_ATTRIBUTE: &str = "container-app.app-configuration.endpoint";
pub const STORE_ID_ATTRIBUTE: &str = "app-configuration.resource.id";
pub const STORE_ENDPOINT_ATTRIBUTE: &str = "app-configuration.endpoint";

const MIDDLEWARE_HINT: &str = "check if 'STEADYBIT_FAULT_INJECTION_ENDPOINT' environment variable is pointing to the correct app configuration and you are using the Steadybit .NET middleware";

/// Resource family a fault injection attack is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFamily {
    FunctionApp,
    ContainerApp,
    AppConfiguration,
}

impl TargetFamily {
    /// Segment used in action ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFamily::FunctionApp => "azure_function",
            TargetFamily::ContainerApp => "container_app",
            TargetFamily::AppConfiguration => "app_configuration",
        }
    }
}

impl fmt::Display for TargetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub endpoint: String,
    pub namespace: Option<String>,
}

impl StoreLocation {
    pub fn global(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: None,
        }
    }

    pub fn namespaced(endpoint: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: Some(namespace.into()).filter(|ns: &String| !ns.is_empty()),
        }
    }

    /// Reads the location from target attributes. Touches nothing remote.
    pub fn resolve(
        family: TargetFamily,
        target: &Target,
        config: &InjectionConfig,
    ) -> Result<Self, AttackError> {
        match family {
            TargetFamily::FunctionApp => match target.attribute(FUNCTION_ENDPOINT_ATTRIBUTE) {
                Some(endpoint) => Ok(Self::namespaced(
                    endpoint,
                    target.require_attribute(LABEL_ATTRIBUTE)?,
                )),
                None => config
                    .app_config_endpoint
                    .as_deref()
                    .filter(|e| !e.is_empty())
                    .map(Self::global)
                    .ok_or_else(|| {
                        AttackError::validation(
                            "no app configuration endpoint configured, set AZURE_APP_CONFIG_ENDPOINT or let the function app advertise one",
                        )
                    }),
            },
            TargetFamily::ContainerApp => {
                let endpoint = target.attribute(CONTAINER_ENDPOINT_ATTRIBUTE).ok_or_else(|| {
                    AttackError::validation(format!(
                        "no app configuration endpoint found, {}",
                        MIDDLEWARE_HINT
                    ))
                })?;
                Ok(Self::namespaced(
                    endpoint,
                    target.require_attribute(LABEL_ATTRIBUTE)?,
                ))
            }
            TargetFamily::AppConfiguration => {
                let endpoint = match target
                    .attribute(STORE_ID_ATTRIBUTE)
                    .or(target.name.as_deref().filter(|n| n.starts_with('/')))
                {
                    Some(id) => endpoint_for_store(&ResourceId::parse_app_configuration(id)?),
                    None => target
                        .attribute(STORE_ENDPOINT_ATTRIBUTE)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            AttackError::validation("missing app configuration endpoint")
                        })?,
                };
                Ok(match target.attribute(LABEL_ATTRIBUTE) {
                    Some(label) => Self::namespaced(endpoint, label),
                    None => Self::global(endpoint),
                })
            }
        }
    }

    /// Prefix of every key written for this location.
    pub fn prefix(&self) -> String {
        namespace_prefix(self.namespace.as_deref().unwrap_or_default())
    }

    pub fn key(&self, field: &str) -> String {
        setting_key(self.namespace.as_deref().unwrap_or_default(), field)
    }

    /// Listing filter that matches every key of the namespace.
    pub fn key_filter(&self) -> String {
        format!("{}:*", self.prefix())
    }

    /// Store name, the first label of the endpoint host.
    pub fn store_name(&self) -> Result<&str, AttackError> {
        let host = self
            .endpoint
            .strip_prefix("https://")
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|host| host.split('.').count() == 3)
            .ok_or_else(|| {
                AttackError::validation(format!(
                    "invalid app configuration endpoint: {}",
                    self.endpoint
                ))
            })?;
        Ok(host.split('.').next().unwrap_or(host))
    }
}

/// `https://<name>.azconfig.io` for a configuration store id.
pub fn endpoint_for_store(id: &ResourceId) -> String {
    format!("https://{}.azconfig.io", id.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_ID: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.AppConfiguration/configurationStores/store1";

    fn configured() -> InjectionConfig {
        InjectionConfig {
            app_config_endpoint: Some("https://global.azconfig.io".into()),
        }
    }

    #[test]
    fn function_app_with_own_store_is_namespaced() {
        let target = Target::default()
            .with_attribute(FUNCTION_ENDPOINT_ATTRIBUTE, "https://shared.azconfig.io")
            .with_attribute(LABEL_ATTRIBUTE, "func1");
        let location =
            StoreLocation::resolve(TargetFamily::FunctionApp, &target, &configured()).unwrap();
        assert_eq!(
            location,
            StoreLocation::namespaced("https://shared.azconfig.io", "func1")
        );
        assert_eq!(location.key_filter(), "Steadybit:FaultInjection:func1:*");
    }

    #[test]
    fn function_app_without_store_uses_global_namespace() {
        let location =
            StoreLocation::resolve(TargetFamily::FunctionApp, &Target::default(), &configured())
                .unwrap();
        assert_eq!(location, StoreLocation::global("https://global.azconfig.io"));
        assert_eq!(location.key("Enabled"), "Steadybit:FaultInjection:Enabled");
    }

    #[test]
    fn function_app_without_any_store_fails() {
        let err = StoreLocation::resolve(
            TargetFamily::FunctionApp,
            &Target::default(),
            &InjectionConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("AZURE_APP_CONFIG_ENDPOINT"));
    }

    #[test]
    fn container_app_requires_endpoint_attribute() {
        let target = Target::default().with_attribute(LABEL_ATTRIBUTE, "orders");
        let err = StoreLocation::resolve(TargetFamily::ContainerApp, &target, &configured())
            .unwrap_err();
        assert!(err.to_string().contains("STEADYBIT_FAULT_INJECTION_ENDPOINT"));
    }

    #[test]
    fn container_app_requires_label() {
        let target = Target::default()
            .with_attribute(CONTAINER_ENDPOINT_ATTRIBUTE, "https://shared.azconfig.io");
        let err = StoreLocation::resolve(TargetFamily::ContainerApp, &target, &configured())
            .unwrap_err();
        assert!(err.to_string().contains(LABEL_ATTRIBUTE));
    }

    #[test]
    fn app_configuration_by_resource_id() {
        let target = Target::default().with_attribute(STORE_ID_ATTRIBUTE, STORE_ID);
        let location =
            StoreLocation::resolve(TargetFamily::AppConfiguration, &target, &configured())
                .unwrap();
        assert_eq!(location, StoreLocation::global("https://store1.azconfig.io"));
        assert_eq!(location.store_name().unwrap(), "store1");
    }

    #[test]
    fn app_configuration_id_from_target_name() {
        let target = Target {
            name: Some(STORE_ID.to_string()),
            ..Default::default()
        }
        .with_attribute(LABEL_ATTRIBUTE, "checkout");
        let location =
            StoreLocation::resolve(TargetFamily::AppConfiguration, &target, &configured())
                .unwrap();
        assert_eq!(location.endpoint, "https://store1.azconfig.io");
        assert_eq!(location.namespace.as_deref(), Some("checkout"));
    }

    #[test]
    fn malformed_store_id_is_rejected() {
        let target = Target::default()
            .with_attribute(STORE_ID_ATTRIBUTE, format!("{}/extra", STORE_ID));
        assert!(
            StoreLocation::resolve(TargetFamily::AppConfiguration, &target, &configured())
                .is_err()
        );
    }

    #[test]
    fn store_name_needs_three_host_labels() {
        assert!(StoreLocation::global("https://a.b.c.d").store_name().is_err());
        assert!(StoreLocation::global("a.azconfig.io").store_name().is_err());
        assert_eq!(
            StoreLocation::global("https://a.azconfig.io/").store_name().unwrap(),
            "a"
        );
    }

    #[test]
    fn empty_label_is_global() {
        assert_eq!(StoreLocation::namespaced("https://a.b.c", "").namespace, None);
    }
}
