mod domain;
pub use domain::{
    EXECUTE_EVENT, ExecutionRequest, Outcome, RequestToken, Script, ScriptId, ScriptResult,
};

mod error;
pub use error::{ModelError, ModelResult};
