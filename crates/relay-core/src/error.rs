use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("script executor is not initialized")]
    ExecutorUnavailable,

    #[error("script execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("server stopped before the script returned")]
    Stopped,

    #[error("request expired before the script returned")]
    Expired,
}
