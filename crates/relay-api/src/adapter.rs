use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use relay_core::{Dispatcher, HookRef};
use relay_model::{Outcome, Script};

use crate::{directory::ScriptDirectory, error::ApiError, handler::ApiHandler};

/// Replaceable executor hook shared between the gateway and its adapter.
pub(crate) type HookSlot = Arc<RwLock<Option<HookRef>>>;

/// Adapter that bridges a [`ScriptDirectory`] and a [`Dispatcher`] to [`ApiHandler`].
pub struct DispatcherApiAdapter {
    directory: ScriptDirectory,
    dispatcher: Dispatcher,
    hook: HookSlot,
}

impl DispatcherApiAdapter {
    pub fn new(directory: ScriptDirectory, dispatcher: Dispatcher) -> Self {
        Self {
            directory,
            dispatcher,
            hook: HookSlot::default(),
        }
    }

    pub(crate) fn with_hook_slot(mut self, hook: HookSlot) -> Self {
        self.hook = hook;
        self
    }

    pub fn set_hook(&self, hook: HookRef) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    fn current_hook(&self) -> Option<HookRef> {
        self.hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ApiHandler for DispatcherApiAdapter {
    fn lookup(&self, identifier: &str) -> Option<Script> {
        self.directory.lookup(identifier)
    }

    async fn execute(&self, script: &Script, content: String) -> Result<Outcome, ApiError> {
        let hook = self.current_hook();
        self.dispatcher
            .dispatch(&script.id, content, hook.as_deref())
            .await
            .map_err(ApiError::from)
    }
}
