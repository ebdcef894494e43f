use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw control-plane answer: the HTTP status and, on 200, the decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(body: T) -> Self {
        Self {
            status: crate::STATUS_OK,
            body: Some(body),
        }
    }

    /// A response that carries no body, e.g. 204 or any error status.
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Whether the status is one of `allowed`.
    pub fn status_in(&self, allowed: &[u16]) -> bool {
        allowed.contains(&self.status)
    }
}

/// Access-key secret. Never printed; use [`SecretKey::expose`] to read it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Entry of `GET /v1/bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub id: String,
    #[serde(default)]
    pub global_aliases: Vec<String>,
}

impl BucketSummary {
    pub fn has_alias(&self, alias: &str) -> bool {
        self.global_aliases.iter().any(|a| a == alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketRequest {
    pub global_alias: String,
}

/// Body of a successful `POST /v1/bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub id: String,
    #[serde(default)]
    pub global_aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddKeyRequest {
    pub name: String,
}

/// Body of a successful `POST /v1/key`.
///
/// Garage only includes the secret in the answer to key creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    #[serde(default)]
    pub name: String,
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: Option<SecretKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketKeyPermissions {
    pub read: bool,
    pub write: bool,
    pub owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowBucketKeyRequest {
    pub bucket_id: String,
    pub access_key_id: String,
    pub permissions: BucketKeyPermissions,
}
