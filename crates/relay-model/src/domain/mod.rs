mod request_token;
pub use request_token::RequestToken;

mod outcome;
pub use outcome::{Outcome, ScriptResult};

mod script;
pub use script::Script;

mod execution;
pub use execution::{EXECUTE_EVENT, ExecutionRequest};

/// Stable identifier of a user script inside the host application.
///
/// This is the host's own id, not the HTTP identifier derived from it
/// (see [`Script::identifier`]).
pub type ScriptId = String;
