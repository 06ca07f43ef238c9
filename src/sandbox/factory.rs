use tracing::debug;

use crate::config::types::HttpConfig;
use crate::error::Result;
use crate::sandbox::traits::HttpCallback;

#[cfg(feature = "http-client")]
use crate::sandbox::backends::HttpClientBackend;

#[cfg(not(feature = "http-client"))]
use crate::error::ScriptletError;

/// Create the `fetch()` backend described by the configuration.
///
/// Returns `None` when networking is disabled, leaving `fetch()` off.
pub fn create_http_backend(config: &HttpConfig) -> Result<Option<Box<dyn HttpCallback>>> {
    if !config.enabled {
        debug!("HTTP backend disabled by configuration");
        return Ok(None);
    }

    #[cfg(feature = "http-client")]
    {
        let backend = HttpClientBackend::new(config)?;
        Ok(Some(Box::new(backend)))
    }

    #[cfg(not(feature = "http-client"))]
    {
        Err(ScriptletError::Config(
            "HTTP support was not compiled in. Rebuild with --features http-client".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_yields_no_backend() {
        let backend = create_http_backend(&HttpConfig::default()).unwrap();
        assert!(backend.is_none());
    }

    #[cfg(feature = "http-client")]
    #[test]
    fn test_enabled_config_builds_client() {
        let config = HttpConfig {
            enabled: true,
            ..HttpConfig::default()
        };
        let backend = create_http_backend(&config).unwrap().unwrap();
        assert_eq!(backend.name(), "http-client");
    }
}
