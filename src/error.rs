use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Malformed decomposition: {0}")]
    Decomposition(String),

    #[error("Plan validation failed: {0}")]
    PlanInvalid(#[from] crate::orchestration::validator::ValidationError),

    #[error("Agent runner binary not found")]
    RunnerBinaryNotFound,

    #[error("Agent execution failed: {0}")]
    AgentFailed(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("No response within {elapsed:?} on flow {flow}")]
    RequestTimeout {
        flow: String,
        elapsed: std::time::Duration,
    },

    #[error("Agent already registered: {id}")]
    AgentAlreadyRegistered { id: String },

    #[error("Invalid flow transition from {from} to {to}")]
    InvalidTransition {
        from: crate::acp::AcpState,
        to: crate::acp::AcpState,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
