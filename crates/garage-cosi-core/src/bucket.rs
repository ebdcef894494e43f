use crate::credentials::{protocol_descriptor, ProtocolDescriptor};
use crate::engine::EngineContext;
use crate::{call_failed, missing_field, unexpected_status, ProvisionError};
use garage_cosi_admin::{
    CallContext, CreateBucketRequest, STATUS_NOT_FOUND, STATUS_NO_CONTENT, STATUS_OK,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketResponse {
    pub bucket_id: String,
    pub bucket_info: ProtocolDescriptor,
}

/// Idempotent bucket creation and tolerant bucket deletion.
pub struct BucketLifecycle {
    context: Arc<EngineContext>,
}

impl BucketLifecycle {
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self { context }
    }

    /// Create a bucket with `name` as its global alias.
    ///
    /// If a bucket already carries the alias its id is returned and nothing
    /// is created. Only the name is compared: no other bucket parameters
    /// exist yet. The list-then-create sequence is not atomic, so
    /// concurrent calls for one name rely on the control plane refusing a
    /// duplicate alias.
    pub fn create(
        &self,
        call: &CallContext,
        name: &str,
    ) -> Result<CreateBucketResponse, ProvisionError> {
        info!("create bucket request: name={name}");
        let request_ctx = format!("name={name}");

        if let Some(bucket_id) = self.find_by_alias(call, name, &request_ctx)? {
            debug!("bucket '{name}' already exists as {bucket_id}");
            return Ok(self.response(bucket_id));
        }

        let req = CreateBucketRequest {
            global_alias: name.to_owned(),
        };
        let resp = self
            .context
            .admin
            .create_bucket(call, &req)
            .map_err(|e| call_failed("create bucket", &request_ctx, &e))?;
        if resp.status != STATUS_OK {
            return Err(unexpected_status(
                "create bucket",
                &request_ctx,
                &[STATUS_OK],
                resp.status,
            ));
        }
        let info = resp
            .body
            .ok_or_else(|| missing_field("create bucket", &request_ctx, "bucket id"))?;

        info!("created bucket '{name}' as {}", info.id);
        Ok(self.response(info.id))
    }

    /// Delete a bucket. A bucket that is already gone counts as deleted.
    pub fn delete(&self, call: &CallContext, bucket_id: &str) -> Result<(), ProvisionError> {
        info!("delete bucket request: bucket_id={bucket_id}");
        let request_ctx = format!("bucket_id={bucket_id}");

        let resp = self
            .context
            .admin
            .delete_bucket(call, bucket_id)
            .map_err(|e| call_failed("delete bucket", &request_ctx, &e))?;
        let allowed = [STATUS_NO_CONTENT, STATUS_NOT_FOUND];
        if !resp.status_in(&allowed) {
            return Err(unexpected_status(
                "delete bucket",
                &request_ctx,
                &allowed,
                resp.status,
            ));
        }
        if resp.status == STATUS_NOT_FOUND {
            debug!("bucket {bucket_id} not found, nothing to delete");
        }
        Ok(())
    }

    fn find_by_alias(
        &self,
        call: &CallContext,
        name: &str,
        request_ctx: &str,
    ) -> Result<Option<String>, ProvisionError> {
        let action = "check for existing bucket";
        let resp = self
            .context
            .admin
            .list_buckets(call)
            .map_err(|e| call_failed(action, request_ctx, &e))?;
        if resp.status != STATUS_OK {
            return Err(unexpected_status(action, request_ctx, &[STATUS_OK], resp.status));
        }
        let buckets = resp
            .body
            .ok_or_else(|| missing_field(action, request_ctx, "bucket list"))?;
        Ok(buckets.into_iter().find(|b| b.has_alias(name)).map(|b| b.id))
    }

    fn response(&self, bucket_id: String) -> CreateBucketResponse {
        CreateBucketResponse {
            bucket_id,
            bucket_info: protocol_descriptor(&self.context.connection),
        }
    }
}
