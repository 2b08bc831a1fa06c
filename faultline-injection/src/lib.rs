//! # Faultline Fault Injection
//!
//! Fault injection through a shared key/value settings store. Instrumented
//! workloads watch keys under `Steadybit:FaultInjection[:<namespace>]` and
//! apply whatever fault the keys describe.
//!
//! ### Modules:
//! - `encoder`: declarative fault config → ordered settings
//! - `store`: settings store boundary and paged listing
//! - `location`: where a target's settings live (endpoint and namespace)
//! - `attack`: prepare/start/stop for the fault injection family

pub mod attack;
pub mod encoder;
pub mod location;
pub mod store;

pub use attack::{FaultInjectionAttack, FaultInjectionState, FaultKind};
pub use encoder::{encode, FaultInjectionConfig, InjectionMode};
pub use location::{StoreLocation, TargetFamily};
pub use store::{SettingsPage, SettingsStore, StoreConnector};
