use std::path::Path;

use mcpp_protocol::ServerConfig;
use tracing::error;

use crate::error::Result;

/// Loads a `ServerConfig` from a TOML file. Missing fields fall back to
/// `ServerConfig::default()` field by field, since every field in the wire
/// struct carries `#[serde(default)]`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).inspect_err(|err| {
        error!(path = %path.display(), %err, "failed to read config file");
    })?;
    let config = toml::from_str(&contents).inspect_err(|err| {
        error!(path = %path.display(), %err, "failed to parse config file");
    })?;
    Ok(config)
}

/// Same as `load_config`, but returns the default configuration when the
/// file does not exist rather than erroring, for first-run convenience.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents).inspect_err(|err| {
            error!(path = %path.display(), %err, "failed to parse config file");
        })?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(err) => {
            error!(path = %path.display(), %err, "failed to read config file");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_config_and_fills_defaults() {
        let mut file = tempfile_with_contents(
            r#"
            trusted_domains = ["*.example.com"]
            consent_timeout_seconds = 60
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.trusted_domains, vec!["*.example.com".to_string()]);
        assert_eq!(config.consent_timeout_seconds, 60);
        // Untouched fields keep their defaults.
        assert_eq!(config.default_on_timeout, mcpp_protocol::consent::ConsentDecision::Deny);
        file.flush().ok();
    }

    #[test]
    fn missing_file_returns_default_via_or_default_variant() {
        let config = load_config_or_default("/nonexistent/path/mcpp.toml").unwrap();
        assert_eq!(config.consent_timeout_seconds, ServerConfig::default().consent_timeout_seconds);
    }

    #[test]
    fn missing_file_errors_via_strict_variant() {
        assert!(load_config("/nonexistent/path/mcpp.toml").is_err());
    }

    fn tempfile_with_contents(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }
}
