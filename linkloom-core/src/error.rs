use linkloom_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render graph: {0}")]
    Render(String),

    #[error("Need {0} in PATH for image generation")]
    ToolMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
