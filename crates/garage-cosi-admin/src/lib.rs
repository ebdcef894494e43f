//! Client side of the Garage administrative control plane.
//!
//! This crate defines the narrow [`AdminApi`] capability the provisioning
//! engine depends on, the JSON wire types of the Garage admin API v1, a
//! blocking HTTP implementation and an in-memory fake used by tests.

pub mod config;
pub mod context;
pub mod http;
pub mod memory;
pub mod types;

pub use config::AdminConfig;
pub use context::CallContext;
pub use http::HttpAdminClient;
pub use memory::{AdminCall, Fault, MemoryAdmin};
pub use types::{
    AddKeyRequest, AllowBucketKeyRequest, ApiResponse, BucketInfo, BucketKeyPermissions,
    BucketSummary, CreateBucketRequest, KeyInfo, SecretKey,
};

/// HTTP statuses the control plane answers with on the calls we make.
pub const STATUS_OK: u16 = 200;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_NOT_FOUND: u16 = 404;

use thiserror::Error;

/// Failure to complete a round trip with the control plane.
///
/// A control-plane answer with an unexpected status is not an `AdminError`;
/// it is returned as an [`ApiResponse`] and judged by the caller.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin API transport error: {0}")]
    Transport(String),
    #[error("admin API response decoding failed: {0}")]
    Decode(String),
    #[error("admin API call cancelled")]
    Cancelled,
    #[error("admin API call deadline exceeded")]
    DeadlineExceeded,
}

/// The six control-plane operations the provisioning engine relies on.
///
/// Implementations must tolerate concurrent use from many in-flight calls.
pub trait AdminApi: Send + Sync {
    /// List every bucket with its global aliases.
    fn list_buckets(
        &self,
        ctx: &CallContext,
    ) -> Result<ApiResponse<Vec<BucketSummary>>, AdminError>;

    /// Create a bucket under the given global alias.
    fn create_bucket(
        &self,
        ctx: &CallContext,
        req: &CreateBucketRequest,
    ) -> Result<ApiResponse<BucketInfo>, AdminError>;

    /// Delete a bucket by id. Answers 204 on success, 404 if it does not exist.
    fn delete_bucket(&self, ctx: &CallContext, id: &str) -> Result<ApiResponse<()>, AdminError>;

    /// Create a new access key. The secret is only ever returned here.
    fn add_key(
        &self,
        ctx: &CallContext,
        req: &AddKeyRequest,
    ) -> Result<ApiResponse<KeyInfo>, AdminError>;

    /// Bind an access key to a bucket with the given permissions.
    fn allow_bucket_key(
        &self,
        ctx: &CallContext,
        req: &AllowBucketKeyRequest,
    ) -> Result<ApiResponse<()>, AdminError>;

    /// Delete an access key by id. Answers 204 on success, 404 if it does not exist.
    fn delete_key(&self, ctx: &CallContext, id: &str) -> Result<ApiResponse<()>, AdminError>;
}
