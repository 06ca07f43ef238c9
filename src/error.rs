use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptletError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    // Session errors
    #[error("Out of memory while creating sandbox session ({requested} byte arena)")]
    OutOfMemory { requested: usize },

    #[error("{message}")]
    Syntax { message: String },

    #[error("{message}")]
    Script {
        message: String,
        stack: Option<String>,
    },

    #[error("JavaScript execution timeout exceeded ({timeout_ms} ms)")]
    Timeout { timeout_ms: i64 },

    #[error("Variable name cannot be empty")]
    InvalidVariableName,

    #[error("Failed to convert host value to JavaScript value: {0}")]
    Marshal(String),

    // Network bridge errors
    #[error("Host '{host}' is not in the fetch allowlist")]
    HostNotAllowed { host: String },

    #[error("Invalid fetch URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // HTTP errors
    #[cfg(feature = "http-client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Generic wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ScriptletError>;
