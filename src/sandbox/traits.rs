use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One request made by script code through `fetch()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
    /// Script-supplied headers are never forwarded, so this is always empty
    pub headers: BTreeMap<String, String>,
}

/// What the host hands back for a [`HttpRequest`].
///
/// Every field is optional; the bridge fills in `200`, `"OK"` and `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpResponse {
    pub status: Option<i32>,
    pub status_text: Option<String>,
    pub body: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: Some(200),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: i32, status_text: impl Into<String>) -> Self {
        self.status = Some(status);
        self.status_text = Some(status_text.into());
        self
    }

    /// Parse a `{status?, statusText?, body?, headers?}` JSON document.
    ///
    /// Anything other than a JSON object is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            let err: serde_json::Error =
                serde::de::Error::custom("HTTP response must be a JSON object");
            return Err(err.into());
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Host side of the script's `fetch()` primitive.
///
/// Called synchronously on the evaluating thread; the evaluation is blocked
/// until it returns and the timeout budget cannot interrupt it.
pub trait HttpCallback {
    /// Returns the callback name used in logs
    fn name(&self) -> &str {
        "callback"
    }

    /// Perform the request. An error is raised inside the script as
    /// `fetch() failed: <error>`.
    fn call(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

impl<F> HttpCallback for F
where
    F: Fn(&HttpRequest) -> anyhow::Result<HttpResponse>,
{
    fn call(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_from_json() {
        let response = HttpResponse::from_json(
            r#"{"status": 404, "statusText": "Not Found", "headers": {"x-id": "7"}}"#,
        )
        .unwrap();
        assert_eq!(response.status, Some(404));
        assert_eq!(response.status_text.as_deref(), Some("Not Found"));
        assert_eq!(response.body, None);
        assert_eq!(response.headers.get("x-id").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_response_from_empty_json() {
        assert_eq!(HttpResponse::from_json("{}").unwrap(), HttpResponse::default());
        assert!(HttpResponse::from_json("[1]").is_err());
        assert!(HttpResponse::from_json("\"x\"").is_err());
        assert!(HttpResponse::from_json("{").is_err());
    }

    #[test]
    fn test_closure_is_callback() {
        let callback = |request: &HttpRequest| -> anyhow::Result<HttpResponse> {
            Ok(HttpResponse::ok(request.url.clone()))
        };
        let request = HttpRequest {
            method: "GET".to_string(),
            url: "https://example.com/".to_string(),
            body: None,
            headers: BTreeMap::new(),
        };
        let response = callback.call(&request).unwrap();
        assert_eq!(response.body.as_deref(), Some("https://example.com/"));
        assert_eq!(callback.name(), "callback");
    }
}
