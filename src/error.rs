use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("no text to type")]
    EmptyInput,
    #[error("a typing session is already running")]
    SessionActive,
    #[error("keystroke injection failed: {0}")]
    Injection(String),
    #[error("failed to start worker thread: {0}")]
    Spawn(String),
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        SessionError::Injection(format!("{err:#}"))
    }
}
