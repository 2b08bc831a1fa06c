//! ## faultline-engine::controller
//! **Prepare/Start/Stop dispatch for the controller protocol**
//!
//! ### Flow:
//! 1. `prepare` registers an execution, runs the attack's prepare and keeps
//!    the typed state. A failed prepare leaves nothing behind.
//! 2. `start` and `stop` check the state out of the registry, run the phase
//!    and store the state back whether the phase succeeded or not, so a
//!    partially completed start or stop is visible to the next call.
//! 3. A successful `stop` drops the execution; a failed one keeps it so the
//!    stop can be retried against the rules still in place.
//! 4. Every phase is timed, counted and reported as an attack event.
//!
//! Phase order is the controller's responsibility and is not re-checked.

use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use faultline_config::AgentConfig;
use faultline_core::{AttackError, ErrorKind, PrepareRequest};
use faultline_telemetry::{EventLogger, MetricsRecorder, Phase};

use crate::engine::catalogue::{ActionDescription, Catalogue, CloudConnectors};
use crate::engine::registry::{ExecutionPhase, ExecutionRecord, ExecutionRegistry};

pub struct AttackController {
    catalogue: Catalogue,
    registry: ExecutionRegistry,
    metrics: Option<MetricsRecorder>,
}

impl AttackController {
    pub fn new(
        config: &AgentConfig,
        connectors: CloudConnectors,
        metrics: Option<MetricsRecorder>,
    ) -> Self {
        Self {
            catalogue: Catalogue::new(config, &connectors, metrics.as_ref()),
            registry: ExecutionRegistry::new(),
            metrics,
        }
    }

    pub fn actions(&self) -> Vec<ActionDescription> {
        self.catalogue.describe()
    }

    pub fn execution(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.registry.get(id)
    }

    pub fn metrics(&self) -> Option<&MetricsRecorder> {
        self.metrics.as_ref()
    }

    #[instrument(skip(self, request))]
    pub async fn prepare(
        &self,
        action_id: &str,
        request: &PrepareRequest,
    ) -> Result<Uuid, AttackError> {
        let attack = self.catalogue.get(action_id).ok_or_else(|| {
            AttackError::validation(format!("unknown action {}", action_id))
        })?;

        let id = self.registry.create(action_id);
        let started = Instant::now();
        let result = attack.prepare(request).await;
        self.observe(Phase::Prepare, action_id, id, started, &result);

        match result {
            Ok(state) => {
                self.registry
                    .store(id, state, Some(ExecutionPhase::Prepared));
                Ok(id)
            }
            Err(e) => {
                self.registry.remove(id);
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&self, id: Uuid) -> Result<(), AttackError> {
        let (action_id, mut state) = self.registry.checkout(id)?;
        let attack = self
            .catalogue
            .get(&action_id)
            .ok_or_else(|| AttackError::UnknownExecution(id.to_string()))?;

        let started = Instant::now();
        let result = attack.start(&id.to_string(), &mut state).await;
        self.observe(Phase::Start, &action_id, id, started, &result);

        let phase = result.is_ok().then_some(ExecutionPhase::Started);
        self.registry.store(id, state, phase);
        result
    }

    /// Reverts an execution and returns the security rules that are still
    /// in place, which is empty unless the stop failed midway.
    #[instrument(skip(self))]
    pub async fn stop(&self, id: Uuid) -> Result<Vec<String>, AttackError> {
        let (action_id, mut state) = self.registry.checkout(id)?;
        let attack = self
            .catalogue
            .get(&action_id)
            .ok_or_else(|| AttackError::UnknownExecution(id.to_string()))?;

        let started = Instant::now();
        let result = attack.stop(&id.to_string(), &mut state).await;
        self.observe(Phase::Stop, &action_id, id, started, &result);

        let remaining = state.remaining_rules();
        if result.is_ok() {
            self.registry.remove(id);
        } else {
            self.registry.store(id, state, None);
        }
        if !remaining.is_empty() {
            warn!(?remaining, "Security rules left behind by {}", id);
        }
        result.map(|()| remaining)
    }

    fn observe<T>(
        &self,
        phase: Phase,
        action_id: &str,
        id: Uuid,
        started: Instant,
        result: &Result<T, AttackError>,
    ) {
        let seconds = started.elapsed().as_secs_f64();
        if let Some(metrics) = &self.metrics {
            metrics.record_phase(phase, action_id, seconds, result.is_ok());
        }

        let metadata = vec![
            KeyValue::new("execution_id", id.to_string()),
            KeyValue::new("action", action_id.to_string()),
        ];
        match result {
            Ok(_) => {
                info!(%phase, "Execution {} completed {}", id, phase);
                EventLogger::log_event(&format!("attack_{}", past_tense(phase)), metadata);
            }
            Err(e) if e.kind() == ErrorKind::Cleanup => {
                EventLogger::log_failure("rollback_failed", &e.to_string(), metadata);
            }
            Err(e) => {
                if matches!(e, AttackError::RolledBack { .. }) {
                    EventLogger::log_event("attack_rolled_back", metadata.clone());
                }
                EventLogger::log_failure(&format!("attack_{}", phase), &e.to_string(), metadata);
            }
        }
    }
}

fn past_tense(phase: Phase) -> &'static str {
    match phase {
        Phase::Prepare => "prepared",
        Phase::Start => "started",
        Phase::Stop => "stopped",
    }
}
