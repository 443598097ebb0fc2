use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid request token: {0} (expected: req_<unix_seconds>_<counter>)")]
    InvalidToken(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
