//! Provider credential resolution.
//!
//! A credential can be written straight into the config (handy for local runs),
//! pointed at a file (container secret mounts) or read from an environment
//! variable. The first non-empty source wins, in that order.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential source configured (need one of: value, file, env)")]
    NoSourceProvided,

    #[error("Failed to read credential file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential file '{}' is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where to find a secret. Mirrors the `api_key*` keys of the provider config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl SecretRef {
    pub fn from_env(name: &str) -> Self {
        Self {
            env: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        has_source(self.value.as_deref())
            || has_source(self.file.as_deref())
            || has_source(self.env.as_deref())
    }

    pub fn resolve(&self) -> Result<SecretString> {
        resolve_secret(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env.as_deref(),
        )
    }

    /// Like [`resolve`](Self::resolve) but an unconfigured ref yields `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn has_source(s: Option<&str>) -> bool {
    s.is_some_and(|s| !s.trim().is_empty())
}

/// Resolves a secret from the first non-empty source: direct value, file, env var.
/// File contents and env values are trimmed.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path).map_err(|e| SecretError::FileRead {
            path: path.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~` or `~/`. `~user` forms are left alone.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("LONGFORM_TEST_KEY", "from-env");
        let secret = resolve_secret(Some("direct"), None, Some("LONGFORM_TEST_KEY")).unwrap();
        assert_eq!(secret.expose_secret(), "direct");
        std::env::remove_var("LONGFORM_TEST_KEY");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        std::env::set_var("LONGFORM_TEST_KEY", "from-env");

        let path = file.path().to_string_lossy().to_string();
        let secret = resolve_secret(None, Some(&path), Some("LONGFORM_TEST_KEY")).unwrap();
        assert_eq!(secret.expose_secret(), "from-file");
        std::env::remove_var("LONGFORM_TEST_KEY");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback() {
        std::env::set_var("LONGFORM_TEST_KEY", "sk-test\n");
        let secret = SecretRef::from_env("LONGFORM_TEST_KEY").resolve().unwrap();
        assert_eq!(secret.expose_secret(), "sk-test");
        std::env::remove_var("LONGFORM_TEST_KEY");
    }

    #[test]
    fn test_no_source() {
        let err = resolve_secret(None, Some(""), None).unwrap_err();
        assert!(matches!(err, SecretError::NoSourceProvided));
        assert!(SecretRef::default().resolve_optional().unwrap().is_none());
        assert!(!SecretRef::default().is_configured());
    }

    #[test]
    fn test_missing_file() {
        let err = resolve_secret(None, Some("/nonexistent/longform/key"), None).unwrap_err();
        assert!(matches!(err, SecretError::FileRead { .. }));
    }

    #[test]
    fn test_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        let err = resolve_secret(None, Some(&path), None).unwrap_err();
        assert!(matches!(err, SecretError::EmptyFile { .. }));
    }

    #[test]
    #[serial]
    fn test_unset_env_is_an_error_not_none() {
        std::env::remove_var("LONGFORM_TEST_MISSING");
        let err = SecretRef::from_env("LONGFORM_TEST_MISSING")
            .resolve_optional()
            .unwrap_err();
        assert!(matches!(err, SecretError::EnvVarNotSet { .. }));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/etc/key"), PathBuf::from("/etc/key"));
        assert_eq!(expand_home("~alice/key"), PathBuf::from("~alice/key"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/key"), home.join("key"));
            assert_eq!(expand_home("~"), home);
        }
    }
}
