//! Scenario files.
//!
//! A scenario seeds the simulated cloud, optionally injects failures and
//! lists lifecycle steps to run against it. Executions are referred to by a
//! name local to the scenario.
//!
//! ```yaml
//! name: block a function app
//! cloud:
//!   dns:
//!     example.com: [10.0.0.5]
//! steps:
//!   - prepare:
//!       execution: block
//!       action: com.steadybit.extension_azure.azure_function.block
//!       request:
//!         target: { name: func1, attributes: { ... } }
//!         config: { hosts: [example.com] }
//!   - start: { execution: block }
//!   - stop: { execution: block }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use faultline_core::PrepareRequest;

use crate::chaos::FailurePlan;
use crate::cloud::{CloudState, SimulatedCloud};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    #[default]
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Prepare {
        execution: String,
        action: String,
        request: PrepareRequest,
        #[serde(default)]
        expect: Expectation,
        /// Substring the error message must contain when failure is expected.
        #[serde(default)]
        error: Option<String>,
    },
    Start {
        execution: String,
        #[serde(default)]
        expect: Expectation,
        #[serde(default)]
        error: Option<String>,
    },
    Stop {
        execution: String,
        #[serde(default)]
        expect: Expectation,
        #[serde(default)]
        error: Option<String>,
    },
    /// Replaces the failure plan for the remaining steps.
    Failures(FailurePlan),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Prepare { .. } => "prepare",
            Step::Start { .. } => "start",
            Step::Stop { .. } => "stop",
            Step::Failures(_) => "failures",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub cloud: CloudState,
    #[serde(default)]
    pub failures: FailurePlan,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub pending_polls: Option<u32>,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
    /// Expected state hash after the last step.
    #[serde(default)]
    pub expected_hash: Option<String>,
}

impl Scenario {
    /// A fresh simulated cloud seeded from this scenario.
    pub fn build_cloud(&self) -> SimulatedCloud {
        let mut cloud = SimulatedCloud::new(self.cloud.clone()).with_failures(self.failures.clone());
        if let Some(page_size) = self.page_size {
            cloud = cloud.with_page_size(page_size);
        }
        if let Some(pending_polls) = self.pending_polls {
            cloud = cloud.with_pending_polls(pending_polls);
        }
        cloud
    }
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Loads a scenario from a YAML file.
pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<Scenario, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}
