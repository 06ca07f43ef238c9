use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::types::{HttpConfig, ScriptletConfig};
use crate::error::{Result, ScriptletError};

const CONFIG_FILE: &str = "config.toml";

/// Platform config directory, or `$HOME/.scriptlet` when none is known.
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "scriptlet", "scriptlet")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .unwrap_or_else(|| home_dir().join(".scriptlet").join(CONFIG_FILE))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load and validate the configuration. A missing file yields the defaults.
pub fn load_config(config_path: Option<&Path>) -> Result<ScriptletConfig> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(ScriptletConfig::default())
        }
        Err(err) => Err(err.into()),
    }
}

/// Parse TOML text into a validated configuration.
pub fn parse_config(content: &str) -> Result<ScriptletConfig> {
    let config: ScriptletConfig =
        toml::from_str(content).map_err(|e| ScriptletError::TomlParse(e.to_string()))?;
    validate_http(&config.http)?;
    Ok(config)
}

fn validate_http(http: &HttpConfig) -> Result<()> {
    for host in &http.allowed_hosts {
        let host = host.trim();
        // Entries are compared against bare request hosts.
        let malformed = host.contains(['/', ':', '@']) || host.contains(char::is_whitespace);
        if host.is_empty() || malformed {
            return Err(ScriptletError::Config(format!(
                "allowed_hosts entry {:?} is not a bare host name",
                host
            )));
        }
    }

    if http.user_agent.is_empty() || http.user_agent.chars().any(char::is_control) {
        return Err(ScriptletError::Config(
            "user_agent must be a non-empty single-line string".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.sandbox.timeout_ms, 5_000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[sandbox]\nmemory_limit_bytes = 131072\n\n[http]\nenabled = true\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sandbox.memory_limit_bytes, 131_072);
        assert!(config.http.enabled);
    }

    #[test]
    fn test_malformed_file_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sandbox\ntimeout_ms = ").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ScriptletError::TomlParse(_)));
    }

    #[test]
    fn test_allowed_hosts_must_be_bare() {
        for entry in ["https://api.example.com", "api.example.com:443", "a.com/x", " "] {
            let toml = format!("[http]\nallowed_hosts = [{:?}]\n", entry);
            let err = parse_config(&toml).unwrap_err();
            assert!(matches!(err, ScriptletError::Config(_)), "{}", entry);
        }

        let config = parse_config("[http]\nallowed_hosts = [\"API.example.com\"]\n").unwrap();
        assert_eq!(config.http.allowed_hosts, vec!["API.example.com"]);
    }

    #[test]
    fn test_user_agent_must_be_single_line() {
        let err = parse_config("[http]\nuser_agent = \"a\\nb\"\n").unwrap_err();
        assert!(matches!(err, ScriptletError::Config(_)));
        assert!(parse_config("[http]\nuser_agent = \"\"\n").is_err());
    }
}
