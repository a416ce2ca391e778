//! Error types shared across LoopDraw crates.

/// Top-level error type for LoopDraw operations.
#[derive(Debug, thiserror::Error)]
pub enum LoopdrawError {
    #[error("Timeline error: {message}")]
    Timeline { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Script error at line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LoopdrawError.
pub type LoopdrawResult<T> = Result<T, LoopdrawError>;

impl LoopdrawError {
    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn script(line: usize, msg: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
