//! Hook discovery
//!
//! Turns manifest script names carrying the hook prefix into event bindings.

use crate::manifest::ScriptManifest;
use indexmap::IndexMap;

/// Event that prepares the invocation context. Always bound.
pub const INITIALIZE_EVENT: &str = "initialize";

/// Event name to binding, in discovery order.
pub type HookBindings = IndexMap<String, HookBinding>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Writes the invocation context, then runs the script unless synthetic.
    Initialize { synthetic: bool },
    /// Runs the script.
    Run,
}

/// A lifecycle event bound to the manifest script that handles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookBinding {
    pub event: String,
    /// Full manifest key, prefix included. This is what the engine runs.
    pub script_key: String,
    pub kind: HookKind,
}

impl HookBinding {
    /// True for the `initialize` binding that has no real script behind it.
    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, HookKind::Initialize { synthetic: true })
    }
}

#[derive(Debug, Clone)]
pub struct HookBinder {
    prefix: String,
}

impl HookBinder {
    /// `prefix` must already be normalized (see [`crate::config::normalize_prefix`]).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the event bindings for `manifest`.
    ///
    /// A `null` initialize script is seeded ahead of the real entries so a
    /// manifest-defined initialize script replaces it. Later duplicates win.
    pub fn discover(&self, manifest: &ScriptManifest) -> HookBindings {
        let mut scripts: IndexMap<&str, Option<&str>> = IndexMap::new();
        let initialize_key = format!("{}{INITIALIZE_EVENT}", self.prefix);
        scripts.insert(initialize_key.as_str(), None);
        for entry in manifest.entries() {
            scripts.insert(entry.name.as_str(), entry.command.as_deref());
        }

        let mut bindings = HookBindings::new();
        for (key, command) in scripts {
            let Some(event) = key.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            let kind = if event == INITIALIZE_EVENT {
                HookKind::Initialize {
                    synthetic: command.is_none(),
                }
            } else {
                HookKind::Run
            };
            bindings.insert(
                event.to_string(),
                HookBinding {
                    event: event.to_string(),
                    script_key: key.to_string(),
                    kind,
                },
            );
        }

        tracing::debug!(
            "Discovered {} hook(s) with prefix '{}': {:?}",
            bindings.len(),
            self.prefix,
            bindings.keys().collect::<Vec<_>>()
        );
        bindings
    }
}
