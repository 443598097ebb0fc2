use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use relay_model::Script;

/// Scripts currently exposed over HTTP, keyed by [`Script::identifier`].
#[derive(Debug, Clone, Default)]
pub struct ScriptDirectory {
    scripts: Arc<RwLock<HashMap<String, Script>>>,
}

impl ScriptDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `script`; replaces any script with the same identifier. Returns the identifier.
    pub fn enable(&self, script: Script) -> String {
        let identifier = script.identifier();
        self.scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.clone(), script);
        identifier
    }

    /// Stop exposing `script`. Returns whether it was exposed.
    pub fn disable(&self, script: &Script) -> bool {
        self.scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&script.identifier())
            .is_some()
    }

    pub fn is_enabled(&self, script: &Script) -> bool {
        self.scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&script.identifier())
    }

    pub fn lookup(&self, identifier: &str) -> Option<Script> {
        self.scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
