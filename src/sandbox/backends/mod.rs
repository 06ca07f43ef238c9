#[cfg(feature = "http-client")]
mod http_client;

#[cfg(feature = "http-client")]
pub use http_client::HttpClientBackend;
