//! Invocation context snapshot
//!
//! During `initialize` the host state is written as JSON to a uniquely named
//! temp file. Scripts find it through [`CONTEXT_ENV`]. The file lives exactly
//! as long as the [`ContextGuard`] that owns it.

use crate::error::HooksError;
use crate::error::Result;
use crate::host::Host;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// Environment variable through which scripts locate the context file.
pub const CONTEXT_ENV: &str = "SLS_CONTEXT";

/// Service descriptor fields copied into the snapshot.
pub const SERVICE_FIELDS: &[&str] = &[
    "service",
    "custom",
    "plugins",
    "provider",
    "functions",
    "resources",
    "package",
    "frameworkVersion",
    "app",
    "tenant",
    "org",
    "layers",
    "outputs",
];

const FILE_PREFIX: &str = "sls-context-";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    pub invocation_id: String,
    pub version: String,
    pub cli_commands: Vec<String>,
    pub cli_options: Map<String, Value>,
    pub service_path: PathBuf,
    pub service: Map<String, Value>,
}

impl InvocationContext {
    pub fn from_host(host: &Host) -> Self {
        let service = SERVICE_FIELDS
            .iter()
            .filter_map(|field| {
                host.service
                    .get(*field)
                    .filter(|value| is_truthy(value))
                    .map(|value| ((*field).to_string(), value.clone()))
            })
            .collect();

        Self {
            invocation_id: host.invocation_id.clone(),
            version: host.version.clone(),
            cli_commands: host.cli_commands.clone(),
            cli_options: host.cli_options.clone(),
            service_path: host.service_path.clone(),
            service,
        }
    }

    /// Read a snapshot back, as a script would from `$SLS_CONTEXT`.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content).map_err(std::io::Error::other)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Owns the context file. Dropping the guard deletes the file; deletion
/// errors are ignored so they never hold up process exit.
#[derive(Debug)]
pub struct ContextGuard {
    path: TempPath,
}

impl ContextGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now. Already-removed files are fine.
    pub fn close(self) {
        if let Err(e) = self.path.close() {
            tracing::debug!("Context file cleanup failed: {e}");
        }
    }
}

/// Writes [`InvocationContext`] snapshots to temp files.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshotWriter {
    dir: Option<PathBuf>,
}

impl ContextSnapshotWriter {
    /// Write into the OS temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write into `dir` instead of the OS temp directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Serialize `context` to a fresh file. On failure the partial file is
    /// removed before the error is returned.
    pub async fn write(&self, context: &InvocationContext) -> Result<ContextGuard> {
        let json = serde_json::to_vec(context).map_err(HooksError::ContextSerialize)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(FILE_PREFIX).suffix(FILE_SUFFIX);
        let temp = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(HooksError::ContextWrite)?;

        let (file, path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(&json).await.map_err(HooksError::ContextWrite)?;
        file.flush().await.map_err(HooksError::ContextWrite)?;

        tracing::debug!("Wrote invocation context to {}", path.display());
        Ok(ContextGuard { path })
    }
}
