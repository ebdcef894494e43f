use crate::credentials::{s3_credentials, CredentialBundle};
use crate::engine::EngineContext;
use crate::permissions::parse_permissions;
use crate::{call_failed, missing_field, unexpected_status, ProvisionError};
use garage_cosi_admin::{
    AddKeyRequest, AllowBucketKeyRequest, CallContext, STATUS_NO_CONTENT, STATUS_OK,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// How the workload authenticates against the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum AuthenticationType {
    /// Static access key and secret.
    Key,
    /// Identity federation.
    Iam,
}

impl FromStr for AuthenticationType {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "key" => Ok(AuthenticationType::Key),
            "iam" => Ok(AuthenticationType::Iam),
            other => Err(ProvisionError::InvalidArgument(format!(
                "unknown authentication type '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for AuthenticationType {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationType::Key => f.write_str("KEY"),
            AuthenticationType::Iam => f.write_str("IAM"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessRequest {
    /// Name given to the access key.
    pub name: String,
    pub bucket_id: String,
    pub authentication_type: AuthenticationType,
    #[serde(default)]
    pub parameters: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantAccessResponse {
    pub account_id: String,
    pub credentials: CredentialBundle,
}

/// Issues and revokes access keys bound to buckets.
pub struct AccessLifecycle {
    context: Arc<EngineContext>,
}

impl AccessLifecycle {
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self { context }
    }

    /// Create an access key, bind it to the bucket and return its credentials.
    ///
    /// Not idempotent: every call creates a new key, even for a name that
    /// already has one. If the parameters do not parse, the key created in
    /// the first step is left behind.
    pub fn grant(
        &self,
        call: &CallContext,
        req: &GrantAccessRequest,
    ) -> Result<GrantAccessResponse, ProvisionError> {
        info!(
            "grant access request: name={} bucket_id={} authentication_type={}",
            req.name, req.bucket_id, req.authentication_type
        );
        let request_ctx = format!("name={} bucket_id={}", req.name, req.bucket_id);

        match req.authentication_type {
            AuthenticationType::Key => {}
            AuthenticationType::Iam => {
                error!("authentication type IAM not implemented ({request_ctx})");
                return Err(ProvisionError::Unsupported(
                    "authentication type IAM not implemented".to_owned(),
                ));
            }
        }

        let key_resp = self
            .context
            .admin
            .add_key(
                call,
                &AddKeyRequest {
                    name: req.name.clone(),
                },
            )
            .map_err(|e| call_failed("create key", &request_ctx, &e))?;
        if key_resp.status != STATUS_OK {
            return Err(unexpected_status(
                "create key",
                &request_ctx,
                &[STATUS_OK],
                key_resp.status,
            ));
        }
        let key = key_resp
            .body
            .ok_or_else(|| missing_field("create key", &request_ctx, "key info"))?;
        let secret = key
            .secret_access_key
            .ok_or_else(|| missing_field("create key", &request_ctx, "secret access key"))?;
        let request_ctx = format!("{request_ctx} account_id={}", key.access_key_id);

        let permissions = parse_permissions(req.parameters.as_ref()).map_err(|e| {
            error!("failed to parse bucket access parameters ({request_ctx}): {e}");
            ProvisionError::InvalidArgument(format!(
                "failed to parse bucket access parameters: {e}"
            ))
        })?;

        let allow = AllowBucketKeyRequest {
            bucket_id: req.bucket_id.clone(),
            access_key_id: key.access_key_id.clone(),
            permissions: permissions.into(),
        };
        let allow_resp = self
            .context
            .admin
            .allow_bucket_key(call, &allow)
            .map_err(|e| call_failed("assign key to bucket", &request_ctx, &e))?;
        if allow_resp.status != STATUS_OK {
            return Err(unexpected_status(
                "assign key to bucket",
                &request_ctx,
                &[STATUS_OK],
                allow_resp.status,
            ));
        }

        info!(
            "granted access on {} to {} (owner={} read={} write={})",
            req.bucket_id,
            key.access_key_id,
            permissions.owner,
            permissions.read,
            permissions.write
        );
        let credentials = s3_credentials(
            &self.context.connection,
            &key.access_key_id,
            secret.expose(),
        );
        Ok(GrantAccessResponse {
            account_id: key.access_key_id,
            credentials,
        })
    }

    /// Delete an access key. Unlike bucket deletion, a key that does not
    /// exist is an error.
    pub fn revoke(&self, call: &CallContext, account_id: &str) -> Result<(), ProvisionError> {
        info!("revoke access request: account_id={account_id}");
        let request_ctx = format!("account_id={account_id}");

        let resp = self
            .context
            .admin
            .delete_key(call, account_id)
            .map_err(|e| call_failed("delete key", &request_ctx, &e))?;
        if resp.status != STATUS_NO_CONTENT {
            return Err(unexpected_status(
                "delete key",
                &request_ctx,
                &[STATUS_NO_CONTENT],
                resp.status,
            ));
        }
        Ok(())
    }
}
