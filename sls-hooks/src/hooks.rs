//! Plugin entry point
//!
//! [`ServerlessHooks`] is built once per process. Construction parses the
//! configuration, resolves streams and discovers hooks; afterwards the host
//! only looks up bindings by event name and fires them.

use crate::binder::HookBinder;
use crate::binder::HookBinding;
use crate::binder::HookBindings;
use crate::binder::HookKind;
use crate::config::HooksConfig;
use crate::config::PLUGIN_NAME;
use crate::context::ContextGuard;
use crate::context::ContextSnapshotWriter;
use crate::context::InvocationContext;
use crate::engine::ExecutionEngine;
use crate::engine::RunAllEngine;
use crate::engine::RunOptions;
use crate::error::Result;
use crate::host::Host;
use crate::manifest::ScriptManifest;
use crate::orchestrator::ExecutionOrchestrator;
use crate::streams::ResolvedStreams;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct ServerlessHooks {
    config: HooksConfig,
    streams: ResolvedStreams,
    hooks: HookBindings,
    orchestrator: ExecutionOrchestrator,
    context_writer: ContextSnapshotWriter,
    context: Mutex<Option<ContextGuard>>,
}

impl ServerlessHooks {
    /// Build the plugin with the bundled run-all engine over the service's
    /// `package.json` scripts.
    pub fn new(host: &Host) -> Result<Self> {
        Self::build(host, None)
    }

    /// Build the plugin with a caller-supplied engine.
    pub fn with_engine(host: &Host, engine: Arc<dyn ExecutionEngine>) -> Result<Self> {
        Self::build(host, Some(engine))
    }

    fn build(host: &Host, engine: Option<Arc<dyn ExecutionEngine>>) -> Result<Self> {
        let config = HooksConfig::from_service(host.custom_config(PLUGIN_NAME))?;
        let streams = ResolvedStreams::resolve(&config.run_all_options)?;
        let manifest = ScriptManifest::load(&host.service_path);
        let hooks = HookBinder::new(config.hook_prefix()).discover(&manifest);

        let engine =
            engine.unwrap_or_else(|| Arc::new(RunAllEngine::from_manifest(&manifest)));
        let mut options = RunOptions::new(&config.run_all_options, streams.clone());
        if !host.service_path.as_os_str().is_empty() {
            options.cwd = Some(host.service_path.clone());
        }
        let orchestrator = ExecutionOrchestrator::new(engine, options, config.debug);

        tracing::debug!(
            "{PLUGIN_NAME} bound {} hook(s) for service at {}",
            hooks.len(),
            host.service_path.display()
        );

        Ok(Self {
            config,
            streams,
            hooks,
            orchestrator,
            context_writer: ContextSnapshotWriter::new(),
            context: Mutex::new(None),
        })
    }

    /// Write context snapshots with `writer` instead of the default.
    pub fn with_context_writer(mut self, writer: ContextSnapshotWriter) -> Self {
        self.context_writer = writer;
        self
    }

    pub fn config(&self) -> &HooksConfig {
        &self.config
    }

    /// Event name to handler mapping the host dispatches through.
    pub fn hooks(&self) -> &HookBindings {
        &self.hooks
    }

    pub fn streams(&self) -> &ResolvedStreams {
        &self.streams
    }

    /// Path of the current context file, once `initialize` has run.
    pub async fn context_path(&self) -> Option<PathBuf> {
        self.context
            .lock()
            .await
            .as_ref()
            .map(|guard| guard.path().to_path_buf())
    }

    /// Fire `event`. Returns `false` when nothing is bound to it.
    pub async fn fire(&self, event: &str, host: &Host) -> Result<bool> {
        let Some(binding) = self.hooks.get(event) else {
            tracing::debug!("No hook bound to event {event}");
            return Ok(false);
        };
        self.invoke(binding, host).await?;
        Ok(true)
    }

    /// Run the handler behind `binding`.
    pub async fn invoke(&self, binding: &HookBinding, host: &Host) -> Result<()> {
        match binding.kind {
            HookKind::Initialize { synthetic } => {
                self.initialize(host).await?;
                if synthetic {
                    return Ok(());
                }
                self.run_hook(&binding.script_key).await
            }
            HookKind::Run => self.run_hook(&binding.script_key).await,
        }
    }

    async fn initialize(&self, host: &Host) -> Result<()> {
        let context = InvocationContext::from_host(host);
        let guard = self.context_writer.write(&context).await?;
        if let Some(previous) = self.context.lock().await.replace(guard) {
            previous.close();
        }
        self.streams.raise_listener_ceiling();
        Ok(())
    }

    async fn run_hook(&self, script_key: &str) -> Result<()> {
        let context_path = self.context_path().await;
        self.orchestrator
            .run(script_key, context_path.as_deref())
            .await
    }

    /// Delete the context file. Also happens when the plugin is dropped.
    pub async fn shutdown(&self) {
        if let Some(guard) = self.context.lock().await.take() {
            guard.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::INITIALIZE_EVENT;
    use crate::engine::EngineError;
    use crate::error::HooksError;
    use crate::streams::StreamHandle;
    use crate::streams::StreamName;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct RecordingEngine {
        calls: StdMutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl ExecutionEngine for RecordingEngine {
        async fn run(&self, patterns: &[String], options: &RunOptions) -> std::result::Result<(), EngineError> {
            let context = options.env.get(crate::context::CONTEXT_ENV).cloned();
            self.calls
                .lock()
                .unwrap()
                .push((patterns.join(" "), context));
            Ok(())
        }
    }

    fn host_with(dir: &TempDir, scripts: Value, custom: Value) -> Host {
        std::fs::write(
            dir.path().join("package.json"),
            json!({ "scripts": scripts }).to_string(),
        )
        .unwrap();
        let Value::Object(service) = json!({
            "service": "svc",
            "custom": { "serverless-hooks": custom }
        }) else {
            unreachable!()
        };
        Host::new("invocation-1", dir.path())
            .with_version("3.0.0")
            .with_service(service)
    }

    fn build(host: &Host, dir: &TempDir) -> (ServerlessHooks, Arc<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::default());
        let hooks = ServerlessHooks::with_engine(host, engine.clone())
            .unwrap()
            .with_context_writer(ContextSnapshotWriter::in_dir(dir.path()));
        (hooks, engine)
    }

    #[tokio::test]
    async fn test_synthetic_initialize_only_writes_context() {
        let dir = TempDir::new().unwrap();
        let host = host_with(&dir, json!({ "build": "tsc" }), Value::Null);
        let (hooks, engine) = build(&host, &dir);

        assert_eq!(hooks.hooks().keys().collect::<Vec<_>>(), vec![INITIALIZE_EVENT]);
        assert!(hooks.fire(INITIALIZE_EVENT, &host).await.unwrap());

        assert!(engine.calls.lock().unwrap().is_empty());
        let path = hooks.context_path().await.unwrap();
        assert_eq!(InvocationContext::load(&path).unwrap().invocation_id, "invocation-1");
    }

    #[tokio::test]
    async fn test_real_initialize_runs_after_context() {
        let dir = TempDir::new().unwrap();
        let host = host_with(&dir, json!({ "hook:initialize": "cmd" }), Value::Null);
        let (hooks, engine) = build(&host, &dir);

        hooks.fire(INITIALIZE_EVENT, &host).await.unwrap();

        let path = hooks.context_path().await.unwrap();
        let calls = engine.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![("hook:initialize".to_string(), Some(path.display().to_string()))]
        );
    }

    #[tokio::test]
    async fn test_hook_without_initialize_has_no_context() {
        let dir = TempDir::new().unwrap();
        let host = host_with(
            &dir,
            json!({ "hook:initialize": null, "hook:deploy": "echo hi" }),
            Value::Null,
        );
        let (hooks, engine) = build(&host, &dir);

        assert!(hooks.hooks()[INITIALIZE_EVENT].is_synthetic());
        assert!(hooks.fire("deploy", &host).await.unwrap());

        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![("hook:deploy".to_string(), None)]
        );
        assert!(hooks.context_path().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_event_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let host = host_with(&dir, json!({}), Value::Null);
        let (hooks, engine) = build(&host, &dir);

        assert!(!hooks.fire("package", &host).await.unwrap());
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_prefix_from_service_config() {
        let dir = TempDir::new().unwrap();
        let host = host_with(
            &dir,
            json!({ "hook:deploy": "old", "on:deploy": "new" }),
            json!({ "hookPrefix": "on::" }),
        );
        let (hooks, engine) = build(&host, &dir);

        assert_eq!(hooks.config().hook_prefix(), "on:");
        hooks.fire("deploy", &host).await.unwrap();
        assert_eq!(engine.calls.lock().unwrap()[0].0, "on:deploy");
    }

    #[tokio::test]
    async fn test_initialize_raises_listener_ceiling() {
        let dir = TempDir::new().unwrap();
        let host = host_with(&dir, json!({}), json!({ "runAllOptions": { "stderr": false } }));
        let (hooks, _engine) = build(&host, &dir);

        let stdout = hooks
            .streams()
            .get(StreamName::Stdout)
            .and_then(StreamHandle::host_stream)
            .unwrap()
            .clone();
        assert!(hooks.streams().get(StreamName::Stderr).is_none());
        assert!(hooks.orchestrator.options().streams.stderr.is_none());
        assert_ne!(stdout.max_listeners(), 0);

        hooks.fire(INITIALIZE_EVENT, &host).await.unwrap();
        assert_eq!(stdout.max_listeners(), 0);
    }

    #[tokio::test]
    async fn test_reinitialize_replaces_context_and_shutdown_cleans_up() {
        let dir = TempDir::new().unwrap();
        let host = host_with(&dir, json!({}), Value::Null);
        let (hooks, _engine) = build(&host, &dir);

        hooks.fire(INITIALIZE_EVENT, &host).await.unwrap();
        let first = hooks.context_path().await.unwrap();
        hooks.fire(INITIALIZE_EVENT, &host).await.unwrap();
        let second = hooks.context_path().await.unwrap();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());

        hooks.shutdown().await;
        assert!(!second.exists());
        assert!(hooks.context_path().await.is_none());
    }

    #[tokio::test]
    async fn test_unopenable_stream_fails_construction() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope").join("out.log");
        let host = host_with(
            &dir,
            json!({ "hook:deploy": "echo hi" }),
            json!({ "runAllOptions": { "stdout": missing.display().to_string() } }),
        );

        let err = ServerlessHooks::new(&host).unwrap_err();
        assert!(matches!(
            err,
            HooksError::StreamOpen {
                stream: StreamName::Stdout,
                ..
            }
        ));
    }
}
