use serde::{Deserialize, Serialize};

use crate::ScriptId;

/// User script as known to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Host-side script id.
    pub id: ScriptId,
    /// Display name, only used in logs.
    pub name: String,
    /// Plugin id; when present it is the HTTP identifier as-is.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plugin_id: String,
}

impl Script {
    pub fn new(id: impl Into<ScriptId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plugin_id: String::new(),
        }
    }

    pub fn with_plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = plugin_id.into();
        self
    }

    /// Stable identifier used in the HTTP path (`/{prefix}/{identifier}`).
    ///
    /// Resolution order:
    /// 1. `plugin_id` when non-empty;
    /// 2. characters 6..14 of `id` when `id` has at least 15 characters;
    /// 3. everything after the first 6 characters when `id` is longer than 6;
    /// 4. `id` itself.
    pub fn identifier(&self) -> String {
        if !self.plugin_id.is_empty() {
            return self.plugin_id.clone();
        }

        let len = self.id.chars().count();
        if len >= 15 {
            self.id.chars().skip(6).take(8).collect()
        } else if len > 6 {
            self.id.chars().skip(6).collect()
        } else {
            self.id.clone()
        }
    }
}
