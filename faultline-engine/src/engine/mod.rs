mod catalogue;
mod controller;
mod registry;
pub mod scale_set;
pub mod vm;

pub use self::{
    catalogue::{
        ActionDescription, AttackVariant, Catalogue, CloudConnectors, ExecutionState, TimeControl,
    },
    controller::AttackController,
    registry::{ExecutionPhase, ExecutionRecord, ExecutionRegistry},
    scale_set::{ScaleSetInstanceState, ScaleSetInstanceStateAttack},
    vm::{VmState, VmStateAttack},
};

pub mod prelude {
    pub use super::{
        ActionDescription, AttackController, CloudConnectors, ExecutionPhase, ExecutionRecord,
        ExecutionState,
    };
}
