use crate::credentials::ConnectionInfo;
use crate::permissions::parse_bool;
use garage_cosi_admin::AdminConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub const ENV_DRIVER_NAME: &str = "COSI_DRIVER_NAME";
pub const ENV_LISTEN_ADDR: &str = "COSI_LISTEN_ADDR";
pub const ENV_ADMIN_ENDPOINT: &str = "GARAGE_ADMIN_ENDPOINT";
pub const ENV_ADMIN_TOKEN: &str = "GARAGE_ADMIN_TOKEN";
pub const ENV_S3_ENDPOINT: &str = "GARAGE_S3_ENDPOINT";
pub const ENV_REGION: &str = "GARAGE_REGION";
pub const ENV_TLS_VERIFY: &str = "GARAGE_TLS_VERIFY";

pub const DEFAULT_DRIVER_NAME: &str = "garage.objectstorage.k8s.io";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9720";
pub const DEFAULT_REGION: &str = "garage";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Process configuration, loaded once at startup and never mutated.
#[derive(Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_driver_name")]
    pub driver_name: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub admin_endpoint: String,
    pub admin_token: String,
    pub s3_endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
}

fn default_driver_name() -> String {
    DEFAULT_DRIVER_NAME.to_owned()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_owned()
}

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

fn default_tls_verify() -> bool {
    true
}

impl DriverConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; unset keys fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, fallback: &str| lookup(key).unwrap_or_else(|| fallback.to_owned());

        let tls_verify = match lookup(ENV_TLS_VERIFY) {
            None => true,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Invalid {
                name: ENV_TLS_VERIFY,
                reason: format!("'{v}' is not a boolean"),
            })?,
        };

        let config = Self {
            driver_name: get(ENV_DRIVER_NAME, DEFAULT_DRIVER_NAME),
            listen_addr: get(ENV_LISTEN_ADDR, DEFAULT_LISTEN_ADDR),
            admin_endpoint: get(ENV_ADMIN_ENDPOINT, ""),
            admin_token: get(ENV_ADMIN_TOKEN, ""),
            s3_endpoint: get(ENV_S3_ENDPOINT, ""),
            region: get(ENV_REGION, DEFAULT_REGION),
            tls_verify,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (ENV_DRIVER_NAME, &self.driver_name),
            (ENV_LISTEN_ADDR, &self.listen_addr),
            (ENV_ADMIN_ENDPOINT, &self.admin_endpoint),
            (ENV_ADMIN_TOKEN, &self.admin_token),
            (ENV_S3_ENDPOINT, &self.s3_endpoint),
            (ENV_REGION, &self.region),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        for (name, url) in [
            (ENV_ADMIN_ENDPOINT, &self.admin_endpoint),
            (ENV_S3_ENDPOINT, &self.s3_endpoint),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("'{url}' must start with http:// or https://"),
                });
            }
        }
        Ok(())
    }

    pub fn admin_config(&self) -> AdminConfig {
        AdminConfig::new(&self.admin_endpoint)
            .with_token(&self.admin_token)
            .with_tls_verify(self.tls_verify)
    }

    pub fn connection(&self) -> ConnectionInfo {
        ConnectionInfo {
            endpoint: self.s3_endpoint.clone(),
            region: self.region.clone(),
        }
    }
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("driver_name", &self.driver_name)
            .field("listen_addr", &self.listen_addr)
            .field("admin_endpoint", &self.admin_endpoint)
            .field("admin_token", &"<redacted>")
            .field("s3_endpoint", &self.s3_endpoint)
            .field("region", &self.region)
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn minimal() -> HashMap<String, String> {
        env(&[
            (ENV_ADMIN_ENDPOINT, "http://garage:3903"),
            (ENV_ADMIN_TOKEN, "admin-token"),
            (ENV_S3_ENDPOINT, "http://garage:3900"),
        ])
    }

    #[test]
    fn env_defaults() {
        let vars = minimal();
        let config = DriverConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.driver_name, DEFAULT_DRIVER_NAME);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.region, DEFAULT_REGION);
        assert!(config.tls_verify);
        assert_eq!(config.connection().endpoint, "http://garage:3900");
        assert_eq!(config.admin_config().token.as_deref(), Some("admin-token"));
    }

    #[test]
    fn missing_token_rejected() {
        let mut vars = minimal();
        vars.remove(ENV_ADMIN_TOKEN);
        let err = DriverConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_ADMIN_TOKEN)));
    }

    #[test]
    fn endpoint_without_scheme_rejected() {
        let mut vars = minimal();
        vars.insert(ENV_S3_ENDPOINT.to_owned(), "garage:3900".to_owned());
        let err = DriverConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_S3_ENDPOINT, .. }));
    }

    #[test]
    fn tls_verify_toggle() {
        let mut vars = minimal();
        vars.insert(ENV_TLS_VERIFY.to_owned(), "false".to_owned());
        let config = DriverConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert!(!config.tls_verify);
        assert!(!config.admin_config().tls_verify);

        vars.insert(ENV_TLS_VERIFY.to_owned(), "nope".to_owned());
        assert!(DriverConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(
            &path,
            r#"{
                "admin_endpoint": "https://garage:3903",
                "admin_token": "t0k3n",
                "s3_endpoint": "https://s3.example.com",
                "region": "eu-west"
            }"#,
        )
        .unwrap();

        let config = DriverConfig::load(&path).unwrap();
        assert_eq!(config.region, "eu-west");
        assert_eq!(config.driver_name, DEFAULT_DRIVER_NAME);
        assert!(config.tls_verify);
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(DriverConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn debug_redacts_token() {
        let vars = minimal();
        let config = DriverConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("admin-token"));
    }
}
