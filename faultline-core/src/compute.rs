//! Power operations boundary for virtual machines and scale set instances.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::RemoteError;
use crate::params::VmAction;

#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Begins `action` on a machine. Returns once the cloud accepted it.
    async fn begin_operation(
        &self,
        resource_group: &str,
        vm_name: &str,
        action: VmAction,
    ) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait ScaleSetApi: Send + Sync {
    /// Begins `action` on one instance of a scale set. Returns once the
    /// cloud accepted it.
    async fn begin_instance_operation(
        &self,
        resource_group: &str,
        scale_set: &str,
        instance_id: &str,
        action: VmAction,
    ) -> Result<(), RemoteError>;
}

pub trait ComputeConnector: Send + Sync {
    fn compute(
        &self,
        subscription_id: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn ComputeApi>, RemoteError>;

    fn scale_sets(
        &self,
        subscription_id: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn ScaleSetApi>, RemoteError>;
}
