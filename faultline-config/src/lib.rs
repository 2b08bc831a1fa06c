//! # Faultline Configuration System
//!
//! Layered configuration for the fault injection agent.
//!
//! ## Features
//! - **Unified Configuration**: one validated structure shared by every attack
//! - **Environment Awareness**: `FAULTLINE_*` overrides plus the well-known
//!   cloud variables (`AZURE_SUBSCRIPTION_ID`, `AZURE_CLIENT_ID`, ...)
//! - **Validation**: ranges, endpoint shapes and priority windows checked at load

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod azure;
mod error;
mod families;
mod injection;
mod network;
mod telemetry;
mod validation;

pub use azure::AzureConfig;
pub use error::ConfigError;
pub use families::FamiliesConfig;
pub use injection::InjectionConfig;
pub use network::NetworkConfig;
pub use telemetry::TelemetryConfig;

/// Cloud variables honoured in addition to the `FAULTLINE_` prefixed ones.
const AZURE_VARIABLES: [&str; 9] = [
    "AZURE_SUBSCRIPTION_ID",
    "AZURE_TENANT_ID",
    "AZURE_CLIENT_ID",
    "AZURE_CLIENT_SECRET",
    "AZURE_CERTIFICATE_PATH",
    "AZURE_CERTIFICATE_PASSWORD",
    "AZURE_USER_ASSERTION",
    "AZURE_APP_CONFIG_ENDPOINT",
    "AZURE_APP_CONFIGURATION_ENDPOINT",
];

/// Top‑level configuration container for the agent.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct AgentConfig {
    /// Account coordinates and credentials.
    #[validate(nested)]
    #[serde(default)]
    pub azure: AzureConfig,

    /// Settings store parameters for fault injection.
    #[validate(nested)]
    #[serde(default)]
    pub injection: InjectionConfig,

    /// Security rule allocation and polling.
    #[validate(nested)]
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging defaults.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Which attack families are offered.
    #[serde(default)]
    pub families: FamiliesConfig,
}

impl AgentConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/faultline.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<FAULTLINE_ENV>.yaml` - Environment‑specific overrides.
    /// 4. `FAULTLINE_*` environment variables (`__` separates sections).
    /// 5. `AZURE_*` cloud variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AgentConfig::default()));

        if Path::new("config/faultline.yaml").exists() {
            figment = figment.merge(Yaml::file("config/faultline.yaml"));
        }

        let env = std::env::var("FAULTLINE_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract_validated(
            figment
                .merge(Env::prefixed("FAULTLINE_").split("__"))
                .merge(azure_environment()),
        )
    }

    /// Load configuration from a specific path, still honouring the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract_validated(
            Figment::from(Serialized::defaults(AgentConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("FAULTLINE_").split("__"))
                .merge(azure_environment()),
        )
    }

    fn extract_validated(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

/// Maps `AZURE_FOO` onto `azure.foo`; the store endpoint lands in the injection section.
fn azure_environment() -> Env {
    Env::raw().only(&AZURE_VARIABLES).map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        match key.as_str() {
            "azure_app_config_endpoint" | "azure_app_configuration_endpoint" => {
                "injection.app_config_endpoint".into()
            }
            _ => key.replacen("azure_", "azure.", 1).into(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn default_config_validates() {
        let config = AgentConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.network.base_priority, 100);
        assert_eq!(config.network.poll_interval_secs, 5);
        assert_eq!(config.network.rule_description, "Blocked by steadybit");
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("FAULTLINE_NETWORK__BASE_PRIORITY", "200");
            jail.set_env("FAULTLINE_TELEMETRY__LOG_LEVEL", "debug");
            let config = AgentConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.network.base_priority, 200);
            assert_eq!(config.telemetry.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn families_can_be_switched_off() {
        Jail::expect_with(|jail| {
            jail.set_env("FAULTLINE_FAMILIES__SCALE_SET_INSTANCES", "false");
            let config = AgentConfig::load().map_err(|e| e.to_string())?;
            assert!(!config.families.scale_set_instances);
            assert!(config.families.virtual_machines);
            Ok(())
        });
    }

    #[test]
    fn azure_variables_are_mapped() {
        Jail::expect_with(|jail| {
            jail.set_env("AZURE_SUBSCRIPTION_ID", "12345678-1234-1234-1234-123456789012");
            jail.set_env("AZURE_CLIENT_ID", "client");
            jail.set_env("AZURE_APP_CONFIG_ENDPOINT", "https://store1.azconfig.io");
            let config = AgentConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(
                config.azure.subscription_id.as_deref(),
                Some("12345678-1234-1234-1234-123456789012")
            );
            assert_eq!(config.azure.client_id.as_deref(), Some("client"));
            assert_eq!(
                config.injection.app_config_endpoint.as_deref(),
                Some("https://store1.azconfig.io")
            );
            Ok(())
        });
    }

    #[test]
    fn yaml_file_is_merged_and_validated() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/faultline.yaml",
                "network:\n  base_priority: 300\n  max_priority: 200\n",
            )?;
            let err = AgentConfig::load().expect_err("inverted window must be rejected");
            assert_eq!(err.invalid_keys(), vec!["network"]);
            Ok(())
        });
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("AZURE_APP_CONFIG_ENDPOINT", "store1.azconfig.io");
            assert!(AgentConfig::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = AgentConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
