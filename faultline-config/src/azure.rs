//! Cloud account and credential configuration.
//!
//! Values are usually supplied through the well-known `AZURE_*` environment
//! variables; see [`crate::AgentConfig::load`].

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Account coordinates and credential material.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct AzureConfig {
    /// Subscription used when a target does not carry its own.
    #[validate(custom(function = validation::validate_subscription))]
    #[serde(default)]
    pub subscription_id: Option<String>,

    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    /// PEM/PKCS#12 certificate used for certificate authentication.
    #[serde(default)]
    pub certificate_path: Option<String>,

    #[serde(default)]
    pub certificate_password: Option<String>,

    /// Assertion for on-behalf-of authentication.
    #[serde(default)]
    pub user_assertion: Option<String>,
}
