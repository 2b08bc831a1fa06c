/*!
# Scenario Runtime

Replays a scenario against a freshly seeded simulated cloud through the same
[`AttackController`] the agent uses, and reports per step whether the outcome
matched the expectation plus the final state hash.
*/

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use faultline_config::AgentConfig;
use faultline_core::AttackError;
use faultline_simulator::{Expectation, Scenario, SimulatedCloud, Step};
use faultline_telemetry::MetricsRecorder;

use crate::engine::prelude::*;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Metrics setup failed: {0}")]
    Metrics(String),

    #[error("Execution '{0}' is prepared twice")]
    DuplicateExecution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: String,
    pub execution: Option<String>,
    pub succeeded: bool,
    pub error: Option<String>,
    /// Whether the outcome is what the scenario expected.
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepOutcome>,
    pub cloud_calls: usize,
    pub state_hash: String,
    /// `None` when the scenario does not pin a hash.
    pub hash_matches: Option<bool>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|step| step.matched) && self.hash_matches != Some(false)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|step| !step.matched)
    }
}

fn outcome(
    index: usize,
    step: &Step,
    execution: &str,
    result: Result<(), AttackError>,
    expect: Expectation,
    error_contains: Option<&str>,
) -> StepOutcome {
    let error = result.err().map(|e| e.to_string());
    let matched = match (&error, expect) {
        (None, Expectation::Success) => true,
        (Some(message), Expectation::Failure) => {
            error_contains.map_or(true, |needle| message.contains(needle))
        }
        _ => false,
    };
    StepOutcome {
        index,
        step: step.name().to_string(),
        execution: Some(execution.to_string()),
        succeeded: error.is_none(),
        error,
        matched,
    }
}

/// Runs every step of `scenario` in order against a simulated cloud.
#[instrument(skip_all, fields(scenario = %scenario.name))]
pub async fn run_scenario(
    scenario: &Scenario,
    config: &AgentConfig,
) -> Result<ScenarioReport, RuntimeError> {
    let cloud = Arc::new(scenario.build_cloud());
    run_scenario_on(scenario, config, cloud).await
}

/// Like [`run_scenario`] but against a caller-provided cloud, which can be
/// inspected afterwards.
pub async fn run_scenario_on(
    scenario: &Scenario,
    config: &AgentConfig,
    cloud: Arc<SimulatedCloud>,
) -> Result<ScenarioReport, RuntimeError> {
    let metrics = MetricsRecorder::new().map_err(|e| RuntimeError::Metrics(e.to_string()))?;
    let controller = AttackController::new(
        config,
        CloudConnectors::uniform(cloud.clone()),
        Some(metrics),
    );
    let mut executions: HashMap<String, Uuid> = HashMap::new();
    let mut steps = Vec::with_capacity(scenario.steps.len());

    info!("Running {} steps", scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = match step {
            Step::Failures(plan) => {
                debug!(?plan, "Replacing failure plan");
                cloud.set_failures(plan.clone());
                StepOutcome {
                    index,
                    step: step.name().to_string(),
                    execution: None,
                    succeeded: true,
                    error: None,
                    matched: true,
                }
            }
            Step::Prepare {
                execution,
                action,
                request,
                expect,
                error,
            } => {
                if executions.contains_key(execution) {
                    return Err(RuntimeError::DuplicateExecution(execution.clone()));
                }
                let result = controller.prepare(action, request).await.map(|id| {
                    executions.insert(execution.clone(), id);
                });
                outcome(index, step, execution, result, *expect, error.as_deref())
            }
            Step::Start {
                execution,
                expect,
                error,
            } => {
                let result = match executions.get(execution) {
                    Some(id) => controller.start(*id).await,
                    None => Err(AttackError::UnknownExecution(execution.clone())),
                };
                outcome(index, step, execution, result, *expect, error.as_deref())
            }
            Step::Stop {
                execution,
                expect,
                error,
            } => {
                let result = match executions.get(execution) {
                    Some(id) => controller.stop(*id).await.map(|remaining| {
                        debug!(?remaining, "Stopped {}", execution);
                    }),
                    None => Err(AttackError::UnknownExecution(execution.clone())),
                };
                outcome(index, step, execution, result, *expect, error.as_deref())
            }
        };

        if !outcome.matched {
            warn!(
                step = outcome.step,
                error = outcome.error.as_deref().unwrap_or("none"),
                "Step {} did not go as expected",
                index
            );
        }
        steps.push(outcome);
    }

    let state_hash = cloud.state_hash();
    let hash_matches = scenario
        .expected_hash
        .as_ref()
        .map(|expected| expected.eq_ignore_ascii_case(&state_hash));
    info!(%state_hash, "Scenario complete");

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        steps,
        cloud_calls: cloud.calls().len(),
        state_hash,
        hash_matches,
    })
}

/// Writes the report as YAML.
pub fn save_report<P: AsRef<Path>>(report: &ScenarioReport, path: P) -> Result<(), RuntimeError> {
    let yaml = serde_yaml::to_string(report)?;
    std::fs::write(path, yaml)?;
    Ok(())
}
