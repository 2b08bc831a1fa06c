//! # Faultline Engine
//!
//! Owns the catalogue of attacks, the per-execution registry and the
//! Prepare/Start/Stop dispatch. Frontends either drive the
//! [`AttackController`] directly or replay scenarios through [`run_scenario`].

pub mod engine;
pub mod runtime;

pub use engine::{
    ActionDescription, AttackController, CloudConnectors, ExecutionPhase, ExecutionRecord,
    ExecutionState,
};
pub use runtime::{run_scenario, run_scenario_on, save_report, RuntimeError, ScenarioReport, StepOutcome};
