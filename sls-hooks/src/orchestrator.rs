//! Hook script execution

use crate::context::CONTEXT_ENV;
use crate::engine::ExecutionEngine;
use crate::engine::RunOptions;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

/// Runs the script set behind a hook with the plugin's resolved options.
#[derive(Debug, Clone)]
pub struct ExecutionOrchestrator {
    engine: Arc<dyn ExecutionEngine>,
    options: RunOptions,
    debug: bool,
}

impl ExecutionOrchestrator {
    pub fn new(engine: Arc<dyn ExecutionEngine>, options: RunOptions, debug: bool) -> Self {
        Self {
            engine,
            options,
            debug,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the script registered under `script_key`.
    ///
    /// When a context file exists its path is exported to the scripts as
    /// `SLS_CONTEXT`. Engine failures are returned as-is.
    pub async fn run(&self, script_key: &str, context_path: Option<&Path>) -> Result<()> {
        if self.debug {
            tracing::info!(target: "sls_hooks", "Running hook script {script_key}");
        }

        let mut options = self.options.clone();
        if let Some(path) = context_path {
            options
                .env
                .insert(CONTEXT_ENV.to_string(), path.display().to_string());
        }

        self.engine.run(&[script_key.to_string()], &options).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::error::HooksError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Debug, Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<(Vec<String>, BTreeMap<String, String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ExecutionEngine for RecordingEngine {
        async fn run(&self, patterns: &[String], options: &RunOptions) -> std::result::Result<(), EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push((patterns.to_vec(), options.env.clone()));
            if self.fail {
                Err(EngineError::ScriptFailed {
                    name: patterns[0].clone(),
                    code: Some(1),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_runs_single_script_key() {
        let engine = Arc::new(RecordingEngine::default());
        let orchestrator = ExecutionOrchestrator::new(engine.clone(), RunOptions::default(), false);

        orchestrator.run("hook:deploy", None).await.unwrap();

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["hook:deploy".to_string()]);
        assert!(!calls[0].1.contains_key(CONTEXT_ENV));
    }

    #[tokio::test]
    async fn test_exports_context_path() {
        let engine = Arc::new(RecordingEngine::default());
        let orchestrator = ExecutionOrchestrator::new(engine.clone(), RunOptions::default(), true);

        orchestrator
            .run("hook:deploy", Some(Path::new("/tmp/sls-context-abc.json")))
            .await
            .unwrap();

        let calls = engine.calls.lock().unwrap();
        assert_eq!(
            calls[0].1.get(CONTEXT_ENV).map(String::as_str),
            Some("/tmp/sls-context-abc.json")
        );
        assert!(orchestrator.options().env.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_debug_mode_logs_each_hook_script() {
        let engine = Arc::new(RecordingEngine::default());
        let orchestrator = ExecutionOrchestrator::new(engine, RunOptions::default(), true);

        orchestrator.run("hook:deploy", None).await.unwrap();

        assert!(logs_contain("Running hook script hook:deploy"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_hook_scripts_are_not_logged_without_debug() {
        let engine = Arc::new(RecordingEngine::default());
        let orchestrator = ExecutionOrchestrator::new(engine, RunOptions::default(), false);

        orchestrator.run("hook:deploy", None).await.unwrap();

        assert!(!logs_contain("Running hook script"));
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = Arc::new(RecordingEngine {
            fail: true,
            ..RecordingEngine::default()
        });
        let orchestrator = ExecutionOrchestrator::new(engine, RunOptions::default(), false);

        let err = orchestrator.run("hook:deploy", None).await.unwrap_err();
        assert!(matches!(
            err,
            HooksError::Engine(EngineError::ScriptFailed { code: Some(1), .. })
        ));
    }
}
