use std::collections::HashMap;
use thiserror::Error;

pub const PARAM_OWNER: &str = "owner";
pub const PARAM_READ: &str = "read";
pub const PARAM_WRITE: &str = "write";

/// Permissions bound to an access key on a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet {
    pub owner: bool,
    pub read: bool,
    pub write: bool,
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self {
            owner: false,
            read: true,
            write: true,
        }
    }
}

impl From<PermissionSet> for garage_cosi_admin::BucketKeyPermissions {
    fn from(p: PermissionSet) -> Self {
        Self {
            read: p.read,
            write: p.write,
            owner: p.owner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parameter '{key}' is not a boolean: '{value}'")]
pub struct ParseError {
    pub key: String,
    pub value: String,
}

/// Parse the conventional textual booleans: `1 t T TRUE true True`
/// and `0 f F FALSE false False`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Derive the permission set from bucket access class parameters.
///
/// Each of `owner`, `read` and `write` overrides its default independently.
/// Unknown keys are ignored.
pub fn parse_permissions(
    params: Option<&HashMap<String, String>>,
) -> Result<PermissionSet, ParseError> {
    let mut perms = PermissionSet::default();
    let Some(params) = params else {
        return Ok(perms);
    };

    for (key, flag) in [
        (PARAM_OWNER, &mut perms.owner),
        (PARAM_READ, &mut perms.read),
        (PARAM_WRITE, &mut perms.write),
    ] {
        if let Some(value) = params.get(key) {
            *flag = parse_bool(value).ok_or_else(|| ParseError {
                key: key.to_owned(),
                value: value.clone(),
            })?;
        }
    }

    Ok(perms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn absent_params_yield_defaults() {
        let perms = parse_permissions(None).unwrap();
        assert_eq!(
            perms,
            PermissionSet {
                owner: false,
                read: true,
                write: true
            }
        );
    }

    #[test]
    fn empty_params_yield_defaults() {
        let perms = parse_permissions(Some(&HashMap::new())).unwrap();
        assert_eq!(perms, PermissionSet::default());
    }

    #[test]
    fn defaults_apply_per_flag() {
        let perms = parse_permissions(Some(&params(&[("owner", "true")]))).unwrap();
        assert_eq!(
            perms,
            PermissionSet {
                owner: true,
                read: true,
                write: true
            }
        );
    }

    #[test]
    fn read_only_access() {
        let perms = parse_permissions(Some(&params(&[("write", "false")]))).unwrap();
        assert!(perms.read);
        assert!(!perms.write);
        assert!(!perms.owner);
    }

    #[test]
    fn all_flags_overridden() {
        let perms = parse_permissions(Some(&params(&[
            ("owner", "1"),
            ("read", "F"),
            ("write", "False"),
        ])))
        .unwrap();
        assert_eq!(
            perms,
            PermissionSet {
                owner: true,
                read: false,
                write: false
            }
        );
    }

    #[test]
    fn non_boolean_fails() {
        let err = parse_permissions(Some(&params(&[("read", "maybe")]))).unwrap_err();
        assert_eq!(err.key, "read");
        assert_eq!(err.value, "maybe");
    }

    #[test]
    fn unknown_keys_ignored() {
        let extra = params(&[("region", "eu"), ("quota", "10G")]);
        let perms = parse_permissions(Some(&extra)).unwrap();
        assert_eq!(perms, PermissionSet::default());
    }

    #[test]
    fn conventional_booleans() {
        for v in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        for v in ["", "yes", "no", "tRuE", " true"] {
            assert_eq!(parse_bool(v), None, "{v}");
        }
    }
}
