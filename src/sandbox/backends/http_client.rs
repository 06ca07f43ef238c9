use std::collections::BTreeMap;

use reqwest::{Client, Method, Url};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::config::types::HttpConfig;
use crate::error::{Result, ScriptletError};
use crate::sandbox::traits::{HttpCallback, HttpRequest, HttpResponse};

/// `fetch()` backend that performs real HTTP requests.
///
/// The bridge is synchronous, so the backend drives reqwest on its own
/// current-thread runtime. It must not be called from inside another tokio
/// runtime.
pub struct HttpClientBackend {
    client: Client,
    runtime: Runtime,
    /// Lowercased host names; empty allows every host
    allowed_hosts: Vec<String>,
}

impl HttpClientBackend {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let allowed_hosts: Vec<String> = config
            .allowed_hosts
            .iter()
            .map(|host| host.trim().to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        info!(
            allowed_hosts = allowed_hosts.len(),
            user_agent = %config.user_agent,
            "HTTP client backend initialized"
        );

        Ok(Self {
            client,
            runtime,
            allowed_hosts,
        })
    }

    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty()
            || self
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }

    /// Validate the request against the allowlist and build the target URL.
    fn prepare(&self, request: &HttpRequest) -> Result<(Method, Url)> {
        let url = Url::parse(&request.url).map_err(|e| ScriptletError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ScriptletError::InvalidUrl {
                    url: request.url.clone(),
                    reason: format!("unsupported scheme '{}'", scheme),
                })
            }
        }

        let host = url.host_str().unwrap_or_default();
        if !self.is_host_allowed(host) {
            warn!(host = %host, "Fetch to host outside allowlist denied");
            return Err(ScriptletError::HostNotAllowed {
                host: host.to_string(),
            });
        }

        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| anyhow::anyhow!("invalid HTTP method '{}'", request.method))?;

        Ok((method, url))
    }

    async fn send(&self, method: Method, url: Url, body: Option<String>) -> Result<HttpResponse> {
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status: Some(i32::from(status.as_u16())),
            status_text: Some(status.canonical_reason().unwrap_or_default().to_string()),
            body: Some(body),
            headers,
        })
    }
}

impl HttpCallback for HttpClientBackend {
    fn name(&self) -> &str {
        "http-client"
    }

    fn call(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let (method, url) = self.prepare(request)?;
        debug!(method = %method, url = %url, "Sending fetch request");

        let response = self
            .runtime
            .block_on(self.send(method, url, request.body.clone()))?;
        debug!(status = ?response.status, "Fetch request completed");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(allowed: &[&str]) -> HttpClientBackend {
        let config = HttpConfig {
            enabled: true,
            allowed_hosts: allowed.iter().map(|h| h.to_string()).collect(),
            ..HttpConfig::default()
        };
        HttpClientBackend::new(&config).unwrap()
    }

    fn request(url: &str) -> HttpRequest {
        HttpRequest {
            method: "get".to_string(),
            url: url.to_string(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_empty_allowlist_allows_any_host() {
        let backend = backend(&[]);
        assert!(backend.is_host_allowed("example.com"));
        let (method, url) = backend.prepare(&request("https://example.com/a")).unwrap();
        assert_eq!(method, Method::GET);
        assert_eq!(url.path(), "/a");
    }

    #[test]
    fn test_host_outside_allowlist_is_denied() {
        let backend = backend(&["API.example.com "]);
        assert!(backend.is_host_allowed("api.example.com"));

        let err = backend
            .call(&request("https://other.example.com/"))
            .unwrap_err();
        match err.downcast_ref::<ScriptletError>() {
            Some(ScriptletError::HostNotAllowed { host }) => {
                assert_eq!(host, "other.example.com")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_urls_are_rejected() {
        let backend = backend(&[]);
        for url in ["not a url", "file:///etc/passwd"] {
            let err = backend.prepare(&request(url)).unwrap_err();
            assert!(matches!(err, ScriptletError::InvalidUrl { .. }), "{}", url);
        }
    }
}
