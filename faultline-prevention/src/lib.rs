//! # Faultline Prevention
//!
//! Blocks traffic to or from a cloud resource with deny rules in the network
//! security group guarding it, and removes exactly those rules again.
//!
//! ### Modules:
//! - `resolver`: host entries → literal addresses or prefixes
//! - `allocator`: collision free rule priorities
//! - `api`: security group and web app API boundary
//! - `block`: prepare/start/stop with rollback of partially created rules

pub mod allocator;
pub mod api;
pub mod block;
pub mod resolver;

pub use allocator::PriorityAllocator;
pub use api::{
    Access, NetworkApi, NetworkConnector, SecurityGroup, SecurityGroupPage, SecurityRule, Site,
    WebAppsApi,
};
pub use block::{BlockAttack, BlockHostsConfig, BlockState, BlockTarget};
pub use resolver::{resolve_hosts, HostResolver, SystemResolver};
