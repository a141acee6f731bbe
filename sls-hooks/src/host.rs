//! Read-only view of the host invocation

use serde_json::Map;
use serde_json::Value;
use std::path::PathBuf;

/// State of the host tool for the current process run.
///
/// Built by the host and only ever read here.
#[derive(Debug, Clone, Default)]
pub struct Host {
    pub invocation_id: String,
    pub version: String,
    /// Command words the host was invoked with, e.g. `["deploy", "function"]`.
    pub cli_commands: Vec<String>,
    pub cli_options: Map<String, Value>,
    /// Service directory. The manifest is read from here.
    pub service_path: PathBuf,
    /// Top-level fields of the service descriptor.
    pub service: Map<String, Value>,
}

impl Host {
    pub fn new(invocation_id: impl Into<String>, service_path: impl Into<PathBuf>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            service_path: service_path.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_cli(mut self, commands: Vec<String>, options: Map<String, Value>) -> Self {
        self.cli_commands = commands;
        self.cli_options = options;
        self
    }

    pub fn with_service(mut self, service: Map<String, Value>) -> Self {
        self.service = service;
        self
    }

    /// `custom.<name>` section of the service descriptor.
    pub fn custom_config(&self, name: &str) -> Option<&Value> {
        self.service.get("custom")?.get(name)
    }
}
