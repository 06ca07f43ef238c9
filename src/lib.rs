pub mod cli;
pub mod config;
pub mod error;
pub mod sandbox;
pub mod session;

pub use error::{Result, ScriptletError};
pub use sandbox::{HostValue, HttpCallback, HttpRequest, HttpResponse};
pub use session::{EvalOutcome, EvalResult, Session, SessionLimits};
