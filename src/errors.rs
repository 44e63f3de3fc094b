use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("config error: {0}")]
    Config(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("event loop error: {0}")]
    EventLoop(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CompositorError> = std::result::Result<T, E>;
