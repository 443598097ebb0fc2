use async_trait::async_trait;
use relay_model::{Outcome, Script};

use crate::error::ApiError;

/// Backend behind the HTTP surface.
///
/// This trait abstracts the backend implementation, allowing users to:
/// - Use the provided `DispatcherApiAdapter`
/// - Implement custom handlers with additional logic (auth, rate limiting, etc.)
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Resolve an HTTP identifier to an enabled script.
    fn lookup(&self, identifier: &str) -> Option<Script>;

    /// Run `script` with `content` and wait for its outcome.
    async fn execute(&self, script: &Script, content: String) -> Result<Outcome, ApiError>;
}
