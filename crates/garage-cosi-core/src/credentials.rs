use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PROTOCOL_S3: &str = "s3";

pub const SECRET_ENDPOINT: &str = "endpoint";
pub const SECRET_REGION: &str = "region";
pub const SECRET_ACCESS_KEY_ID: &str = "accessKeyID";
pub const SECRET_ACCESS_SECRET_KEY: &str = "accessSecretKey";

/// Where clients reach the object store, handed out with every grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub endpoint: String,
    pub region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum S3SignatureVersion {
    #[serde(rename = "S3V4")]
    V4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Protocol {
    pub region: String,
    pub signature_version: S3SignatureVersion,
}

/// Access protocol of a provisioned bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolDescriptor {
    S3(S3Protocol),
}

/// Named secret values for one protocol.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDetails {
    pub secrets: BTreeMap<String, String>,
}

impl fmt::Debug for CredentialDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: BTreeMap<&str, &str> = self
            .secrets
            .iter()
            .map(|(k, v)| {
                if k == SECRET_ACCESS_SECRET_KEY {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("CredentialDetails")
            .field("secrets", &shown)
            .finish()
    }
}

/// Credentials keyed by protocol identifier.
pub type CredentialBundle = BTreeMap<String, CredentialDetails>;

pub fn protocol_descriptor(conn: &ConnectionInfo) -> ProtocolDescriptor {
    ProtocolDescriptor::S3(S3Protocol {
        region: conn.region.clone(),
        signature_version: S3SignatureVersion::V4,
    })
}

pub fn s3_credentials(conn: &ConnectionInfo, key_id: &str, secret: &str) -> CredentialBundle {
    let secrets = BTreeMap::from([
        (SECRET_ENDPOINT.to_owned(), conn.endpoint.clone()),
        (SECRET_REGION.to_owned(), conn.region.clone()),
        (SECRET_ACCESS_KEY_ID.to_owned(), key_id.to_owned()),
        (SECRET_ACCESS_SECRET_KEY.to_owned(), secret.to_owned()),
    ]);
    BTreeMap::from([(PROTOCOL_S3.to_owned(), CredentialDetails { secrets })])
}
