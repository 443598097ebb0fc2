use serde::{Deserialize, Serialize};

use crate::{RequestToken, ScriptId};

/// Event name emitted to the executor hook for every inbound request.
pub const EXECUTE_EVENT: &str = "script.http.execute";

/// Payload of [`EXECUTE_EVENT`].
///
/// The executor runs `script_id` with `content` and reports back under `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    #[serde(rename = "requestToken")]
    pub token: RequestToken,
    #[serde(rename = "scriptID")]
    pub script_id: ScriptId,
    pub content: String,
}
