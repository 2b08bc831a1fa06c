//! Per-execution records keyed by execution id.
//!
//! The registry never holds its lock across a cloud call: a phase checks the
//! state out, runs, and stores it back, successful or not. A record lives
//! until its execution stopped successfully.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use faultline_core::AttackError;

use crate::engine::catalogue::ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Created,
    Prepared,
    Started,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub action_id: String,
    pub phase: ExecutionPhase,
    /// `None` until prepare succeeded.
    pub state: Option<ExecutionState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    records: Mutex<HashMap<Uuid, ExecutionRecord>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new execution in the `Created` phase.
    pub fn create(&self, action_id: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.records.lock().insert(
            id,
            ExecutionRecord {
                id,
                action_id: action_id.to_string(),
                phase: ExecutionPhase::Created,
                state: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.records.lock().get(&id).cloned()
    }

    /// Action id and prepared state of an execution.
    pub fn checkout(&self, id: Uuid) -> Result<(String, ExecutionState), AttackError> {
        let records = self.records.lock();
        let record = records
            .get(&id)
            .ok_or_else(|| AttackError::UnknownExecution(id.to_string()))?;
        let state = record.state.clone().ok_or_else(|| {
            AttackError::validation(format!("execution {} has not been prepared", id))
        })?;
        Ok((record.action_id.clone(), state))
    }

    /// Stores the state after a phase ran. `phase` is only applied when
    /// given, so failed phases keep the previous one.
    pub fn store(&self, id: Uuid, state: ExecutionState, phase: Option<ExecutionPhase>) {
        if let Some(record) = self.records.lock().get_mut(&id) {
            record.state = Some(state);
            if let Some(phase) = phase {
                record.phase = phase;
            }
            record.updated_at = Utc::now();
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.records.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
