use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptletConfig {
    pub sandbox: SandboxConfig,
    pub http: HttpConfig,
}

/// Per-session resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Script heap budget in bytes, on top of the interpreter's bootstrap usage
    pub memory_limit_bytes: usize,
    /// Wall-clock budget per eval in milliseconds (0 or negative disables it)
    pub timeout_ms: i64,
    /// Maximum captured console output per eval in bytes
    pub console_max_size_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 50_000,
            timeout_ms: 5_000,
            console_max_size_bytes: 10_000,
        }
    }
}

/// Configuration for the host side of `fetch()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Install the HTTP backend into new sessions
    pub enabled: bool,
    /// Hosts scripts may reach (empty = any host)
    pub allowed_hosts: Vec<String>,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_hosts: Vec::new(),
            user_agent: concat!("scriptlet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ScriptletConfig = toml::from_str(
            r#"
            [sandbox]
            timeout_ms = 250

            [http]
            allowed_hosts = ["api.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.sandbox.timeout_ms, 250);
        assert_eq!(config.sandbox.memory_limit_bytes, 50_000);
        assert_eq!(config.sandbox.console_max_size_bytes, 10_000);
        assert!(!config.http.enabled);
        assert_eq!(config.http.allowed_hosts, vec!["api.example.com"]);
        assert!(config.http.user_agent.starts_with("scriptlet/"));
    }
}
