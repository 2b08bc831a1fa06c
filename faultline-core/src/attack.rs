//! The attack lifecycle contract.
//!
//! The controller drives every attack through `prepare → start → stop`.
//! Prepare validates the request and builds the execution state without
//! touching cloud state. Start applies the fault, stop reverts it. The
//! controller enforces phase order; implementations do not re-check it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AttackError;
use crate::request::PrepareRequest;

/// Common prefix of every action id.
pub const ACTION_ID_PREFIX: &str = "com.steadybit.extension_azure";

/// `<prefix>.<target>.<fault>`
pub fn action_id(target: &str, fault: &str) -> String {
    format!("{}.{}.{}", ACTION_ID_PREFIX, target, fault)
}

#[async_trait]
pub trait Attack: Send + Sync {
    /// Per-execution state created by prepare and threaded through start/stop.
    type State: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Stable action id, e.g. `com.steadybit.extension_azure.nsg.block`.
    fn action_id(&self) -> &str;

    async fn prepare(&self, request: &PrepareRequest) -> Result<Self::State, AttackError>;

    async fn start(&self, state: &mut Self::State) -> Result<(), AttackError>;

    /// Reverts whatever start applied. Must be safe to call again after a
    /// partial failure: state is updated to reflect what is left to revert.
    async fn stop(&self, state: &mut Self::State) -> Result<(), AttackError>;
}
