//! Script execution engine
//!
//! The hooks layer only hands the engine a script pattern and the options
//! to run it with. How patterns expand and how scripts are sequenced is the
//! engine's business. [`run_all::RunAllEngine`] is the bundled implementation.

pub mod pattern;
pub mod run_all;

use crate::config::RunAllOptions;
use crate::streams::ResolvedStreams;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

pub use run_all::RunAllEngine;

/// Runs script sets on behalf of hooks.
#[async_trait]
pub trait ExecutionEngine: Send + Sync + Debug {
    /// Run every script matched by `patterns` and wait for them to finish.
    ///
    /// Fails when any underlying script fails, according to the engine's
    /// own aggregation rules.
    async fn run(&self, patterns: &[String], options: &RunOptions) -> Result<(), EngineError>;
}

/// Per-invocation options passed to the engine.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub streams: ResolvedStreams,
    pub parallel: bool,
    pub continue_on_error: bool,
    pub race: bool,
    /// 0 means unbounded.
    pub max_parallel: usize,
    pub print_name: bool,
    pub print_label: bool,
    pub silent: bool,
    /// Appended to every script command line.
    pub arguments: Vec<String>,
    /// Extra environment for spawned scripts.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(config: &RunAllOptions, streams: ResolvedStreams) -> Self {
        Self {
            streams,
            parallel: config.parallel,
            continue_on_error: config.continue_on_error,
            race: config.race,
            max_parallel: config.max_parallel,
            print_name: config.print_name,
            print_label: config.print_label,
            silent: config.silent,
            arguments: config.arguments.clone(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

/// Engine failures, surfaced verbatim as hook failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No scripts match pattern '{0}'")]
    NoMatchingScript(String),

    #[error("Invalid script pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to spawn script '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script '{name}' failed: {}", describe_exit(.code))]
    ScriptFailed { name: String, code: Option<i32> },

    #[error("Stream error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;

    #[test]
    fn test_run_options_copy_pass_through_settings() {
        let config = RunAllOptions {
            parallel: true,
            max_parallel: 3,
            print_label: true,
            arguments: vec!["--stage".to_string(), "dev".to_string()],
            stderr: StreamConfig::Suppressed,
            ..RunAllOptions::default()
        };
        let options = RunOptions::new(&config, ResolvedStreams::default());

        assert!(options.parallel);
        assert_eq!(options.max_parallel, 3);
        assert!(options.print_label);
        assert_eq!(options.arguments, vec!["--stage", "dev"]);
        assert!(options.env.is_empty());
    }

    #[test]
    fn test_script_failure_messages() {
        let failed = EngineError::ScriptFailed {
            name: "hook:deploy".to_string(),
            code: Some(3),
        };
        assert_eq!(failed.to_string(), "Script 'hook:deploy' failed: exit code 3");

        let killed = EngineError::ScriptFailed {
            name: "hook:deploy".to_string(),
            code: None,
        };
        assert_eq!(killed.to_string(), "Script 'hook:deploy' failed: terminated by signal");
    }
}
