//! Attack family switches.
//!
//! Each switch decides whether the actions of one target family are offered.
//! Everything is enabled unless turned off, e.g.
//! `FAULTLINE_FAMILIES__SCALE_SET_INSTANCES=false`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FamiliesConfig {
    /// Fault injection and network block on function apps.
    pub function_apps: bool,
    pub container_apps: bool,
    /// Fault injection on configuration stores addressed directly.
    pub app_configurations: bool,
    pub network_security_groups: bool,
    pub virtual_machines: bool,
    pub scale_set_instances: bool,
}

impl FamiliesConfig {
    pub fn all_disabled() -> Self {
        Self {
            function_apps: false,
            container_apps: false,
            app_configurations: false,
            network_security_groups: false,
            virtual_machines: false,
            scale_set_instances: false,
        }
    }
}

impl Default for FamiliesConfig {
    fn default() -> Self {
        Self {
            function_apps: true,
            container_apps: true,
            app_configurations: true,
            network_security_groups: true,
            virtual_machines: true,
            scale_set_instances: true,
        }
    }
}
