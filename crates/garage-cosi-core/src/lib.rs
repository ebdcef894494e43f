//! Provisioning engine for the Garage COSI driver.
//!
//! Maps the four bucket lifecycle operations (create/delete bucket,
//! grant/revoke access) onto calls against the Garage admin API, keeps
//! create and delete idempotent, derives access-key permissions from
//! caller parameters and translates every control-plane outcome into the
//! [`ProvisionError`] taxonomy.

pub mod access;
pub mod bucket;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod permissions;

pub use access::{AccessLifecycle, AuthenticationType, GrantAccessRequest, GrantAccessResponse};
pub use bucket::{BucketLifecycle, CreateBucketResponse};
pub use config::{ConfigError, DriverConfig};
pub use credentials::{
    protocol_descriptor, s3_credentials, ConnectionInfo, CredentialBundle, CredentialDetails,
    ProtocolDescriptor, S3Protocol, S3SignatureVersion,
};
pub use engine::{EngineContext, ProvisioningEngine};
pub use permissions::{parse_bool, parse_permissions, ParseError, PermissionSet};

use garage_cosi_admin::AdminError;
use std::fmt;
use thiserror::Error;
use tracing::error;

/// Outcome kinds reported to the RPC layer. Messages stay generic;
/// control-plane details are only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unsupported,
    Internal,
    Cancelled,
    DeadlineExceeded,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Unsupported => "Unimplemented",
            ErrorKind::Internal => "Internal",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::DeadlineExceeded => "DeadlineExceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ProvisionError::Unsupported(_) => ErrorKind::Unsupported,
            ProvisionError::Internal(_) => ErrorKind::Internal,
            ProvisionError::Cancelled(_) => ErrorKind::Cancelled,
            ProvisionError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProvisionError::InvalidArgument(m)
            | ProvisionError::Unsupported(m)
            | ProvisionError::Internal(m)
            | ProvisionError::Cancelled(m)
            | ProvisionError::DeadlineExceeded(m) => m,
        }
    }
}

/// A control-plane round trip that did not complete.
pub(crate) fn call_failed(action: &str, context: &str, err: &AdminError) -> ProvisionError {
    error!("failed to {action} ({context}): {err}");
    let msg = format!("failed to {action}");
    match err {
        AdminError::Cancelled => ProvisionError::Cancelled(msg),
        AdminError::DeadlineExceeded => ProvisionError::DeadlineExceeded(msg),
        _ => ProvisionError::Internal(msg),
    }
}

/// A control-plane answer outside the expected status allowlist.
pub(crate) fn unexpected_status(
    action: &str,
    context: &str,
    expected: &[u16],
    got: u16,
) -> ProvisionError {
    error!(
        "failed to {action} ({context}): unexpected HTTP status code {got}, expected {expected:?}"
    );
    ProvisionError::Internal(format!("failed to {action}"))
}

/// A 200 answer whose body lacks what we need.
pub(crate) fn missing_field(action: &str, context: &str, field: &str) -> ProvisionError {
    error!("failed to {action} ({context}): response is missing {field}");
    ProvisionError::Internal(format!("failed to {action}"))
}
