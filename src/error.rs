use thiserror::Error;

/// Failures surfaced by the assistant core. None of them are recovered locally.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend communication failed: {0}")]
    Backend(String),

    #[error("malformed estimate response: {0}")]
    MalformedResponse(String),

    #[error("unregistered tool: {0}")]
    UnregisteredTool(String),

    #[error("invalid arguments for tool {tool}: {reason}")]
    ToolArguments { tool: String, reason: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
