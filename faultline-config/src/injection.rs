//! Fault injection settings store configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Settings store parameters for fault injection attacks.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct InjectionConfig {
    /// Store used by targets that do not advertise their own endpoint. Such
    /// targets share one global namespace.
    #[validate(custom(function = validation::validate_endpoint))]
    #[serde(default)]
    pub app_config_endpoint: Option<String>,
}
