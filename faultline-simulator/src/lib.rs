//! # Faultline Simulator
//!
//! An in-memory cloud for running attacks end to end without touching a real
//! subscription. It implements every boundary the attacks talk to and keeps
//! a log of calls so tests can assert on ordering.
//!
//! ## Key Components:
//! - **Cloud:** settings stores, security groups, web apps, machines, DNS
//! - **Chaos:** per-operation failure injection (by key or rule name)
//! - **Scenario:** YAML description of a seeded cloud plus lifecycle steps
//! - **State hash:** BLAKE3 over the cloud state for deterministic replay checks

pub mod chaos;
pub mod cloud;
pub mod compute;
pub mod network;
pub mod scenario;
pub mod store;

pub use chaos::FailurePlan;
pub use cloud::{CloudCall, CloudState, SimulatedCloud};
pub use scenario::{load_scenario, Expectation, Scenario, ScenarioError, Step};
