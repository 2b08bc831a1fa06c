//! # faultline-core
//!
//! Foundation shared by every attack family.
//!
//! ### Key Submodules:
//! - `attack`: the Prepare/Start/Stop contract every attack implements
//! - `request`: controller request model and target attribute access
//! - `params`: typed, validated attack parameters
//! - `resource`: cloud resource id parsing
//! - `credential`: credential resolution from configuration
//! - `compute`: power operations boundary for machines and scale set instances
//! - `operation`: polling of long-running cloud operations

pub mod attack;
pub mod compute;
pub mod credential;
pub mod error;
pub mod operation;
pub mod params;
pub mod request;
pub mod resource;

pub mod prelude {
    pub use crate::attack::*;
    pub use crate::error::*;
    pub use crate::request::*;
}

pub use attack::Attack;
pub use compute::{ComputeApi, ComputeConnector, ScaleSetApi};
pub use credential::{Credential, CredentialError, CredentialProvider, EnvironmentCredentialProvider};
pub use error::{AttackError, ErrorKind, RemoteError};
pub use operation::{poll_until_done, LongRunningOperation, PollOptions, PollStatus};
pub use request::{ExecutionContext, PrepareRequest, Target};
pub use resource::ResourceId;
