//! ## faultline-injection::encoder
//! **Fault config → settings store keys**
//!
//! Keys follow `Steadybit:FaultInjection[:<namespace>]:<Field>`. The namespace
//! segment is left out entirely for global (single-tenant) stores.
//!
//! `Injection`, `Rate` and `Enabled` are always written. Every optional field
//! adds exactly one key when present. Cross-field consistency is not checked:
//! the workload middleware decides which keys matter for its mode.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const KEY_ROOT: &str = "Steadybit:FaultInjection";

/// Boolean spelling of fault fields (`Enabled` inside the encoded settings).
pub const FIELD_TRUE: &str = "true";
pub const FIELD_FALSE: &str = "false";

/// Boolean spelling of the enable marker written by start and global stop.
/// Deployed middleware reads both spellings, see DESIGN.md.
pub const MARKER_ENABLED: &str = "Yes";
pub const MARKER_DISABLED: &str = "No";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InjectionMode {
    Exception,
    StatusCode,
    Delay,
    FillDisk,
    None,
}

impl InjectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionMode::Exception => "Exception",
            InjectionMode::StatusCode => "StatusCode",
            InjectionMode::Delay => "Delay",
            InjectionMode::FillDisk => "FillDisk",
            InjectionMode::None => "none",
        }
    }
}

impl fmt::Display for InjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declarative fault for every workload instance sharing one namespace.
///
/// Built fresh during prepare and never merged with an earlier config: every
/// start rewrites the namespace from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultInjectionConfig {
    pub injection_mode: InjectionMode,
    pub rate: u8,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_latency: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_fill_megabytes: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_suffix: Option<String>,
}

impl FaultInjectionConfig {
    /// An enabled fault of the given mode with no mode parameters yet.
    pub fn new(injection_mode: InjectionMode, rate: u8) -> Self {
        Self {
            injection_mode,
            rate,
            enabled: true,
            status_code: None,
            min_latency: None,
            max_latency: None,
            exception_message: None,
            disk_fill_megabytes: None,
            blocked_hosts: Vec::new(),
            namespace_suffix: None,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace_suffix.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Encodes into the config's own namespace.
    pub fn to_settings(&self) -> BTreeMap<String, String> {
        encode(self, self.namespace().unwrap_or_default())
    }
}

/// Key prefix of a namespace, without trailing separator.
pub fn namespace_prefix(namespace: &str) -> String {
    if namespace.is_empty() {
        KEY_ROOT.to_string()
    } else {
        format!("{}:{}", KEY_ROOT, namespace)
    }
}

pub fn setting_key(namespace: &str, field: &str) -> String {
    format!("{}:{}", namespace_prefix(namespace), field)
}

/// Encodes `config` into fully qualified keys under `namespace` (may be empty).
pub fn encode(config: &FaultInjectionConfig, namespace: &str) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    let mut put = |field: &str, value: String| {
        settings.insert(setting_key(namespace, field), value);
    };

    put("Injection", config.injection_mode.as_str().to_string());
    put("Rate", config.rate.to_string());
    put(
        "Enabled",
        if config.enabled { FIELD_TRUE } else { FIELD_FALSE }.to_string(),
    );

    if let Some(status_code) = config.status_code {
        put("StatusCode", status_code.to_string());
    }

    if let Some(min_latency) = config.min_latency {
        debug!("Setting minimum latency to {} ms", min_latency.as_millis());
        put("Delay:MinimumLatency", min_latency.as_millis().to_string());
    }

    if let Some(max_latency) = config.max_latency {
        debug!("Setting maximum latency to {} ms", max_latency.as_millis());
        put("Delay:MaximumLatency", max_latency.as_millis().to_string());
    }

    if let Some(message) = &config.exception_message {
        put("Exception:Message", message.clone());
    }

    if let Some(megabytes) = config.disk_fill_megabytes {
        put("FillDisk:Megabytes", megabytes.to_string());
    }

    if !config.blocked_hosts.is_empty() {
        put("Block:Hosts", config.blocked_hosts.join(","));
    }

    settings
}
