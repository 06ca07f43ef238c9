mod backends;
mod factory;
mod traits;

pub mod classify;
pub mod console;
pub mod governor;
pub mod marshal;
pub mod primitives;
pub mod value;

#[cfg(feature = "http-client")]
pub use backends::HttpClientBackend;

pub use classify::{ExceptionKind, ScriptException};
pub use console::ConsoleBuffer;
pub use factory::create_http_backend;
pub use governor::TimeoutGovernor;
pub use traits::{HttpCallback, HttpRequest, HttpResponse};
pub use value::HostValue;
