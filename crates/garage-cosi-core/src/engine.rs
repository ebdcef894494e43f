use crate::access::{AccessLifecycle, GrantAccessRequest, GrantAccessResponse};
use crate::bucket::{BucketLifecycle, CreateBucketResponse};
use crate::config::DriverConfig;
use crate::credentials::ConnectionInfo;
use crate::ProvisionError;
use garage_cosi_admin::{AdminApi, CallContext, HttpAdminClient};
use std::sync::Arc;

/// Immutable dependencies shared by every lifecycle call.
pub struct EngineContext {
    pub admin: Arc<dyn AdminApi>,
    pub connection: ConnectionInfo,
}

impl EngineContext {
    pub fn new(admin: Arc<dyn AdminApi>, connection: ConnectionInfo) -> Self {
        Self { admin, connection }
    }

    /// Build the context for a validated configuration, talking HTTP to Garage.
    pub fn from_config(config: &DriverConfig) -> Self {
        let admin = HttpAdminClient::new(config.admin_config());
        Self::new(Arc::new(admin), config.connection())
    }
}

/// Entry point for the RPC layer: the four bucket lifecycle operations.
///
/// Holds no mutable state. Calls may run concurrently; each one performs at
/// most two sequential control-plane round trips and never retries.
pub struct ProvisioningEngine {
    buckets: BucketLifecycle,
    access: AccessLifecycle,
}

impl ProvisioningEngine {
    pub fn new(context: EngineContext) -> Self {
        let context = Arc::new(context);
        Self {
            buckets: BucketLifecycle::new(Arc::clone(&context)),
            access: AccessLifecycle::new(context),
        }
    }

    pub fn create_bucket(
        &self,
        call: &CallContext,
        name: &str,
    ) -> Result<CreateBucketResponse, ProvisionError> {
        self.buckets.create(call, name)
    }

    pub fn delete_bucket(&self, call: &CallContext, bucket_id: &str) -> Result<(), ProvisionError> {
        self.buckets.delete(call, bucket_id)
    }

    pub fn grant_access(
        &self,
        call: &CallContext,
        req: &GrantAccessRequest,
    ) -> Result<GrantAccessResponse, ProvisionError> {
        self.access.grant(call, req)
    }

    pub fn revoke_access(
        &self,
        call: &CallContext,
        account_id: &str,
    ) -> Result<(), ProvisionError> {
        self.access.revoke(call, account_id)
    }
}
