//! # sls-hooks
//!
//! Run `package.json` scripts when a service lifecycle event fires.
//!
//! ## Overview
//!
//! Any script whose name starts with the hook prefix (`hook:` by default)
//! is bound to the event named by the rest of the key, so `hook:deploy`
//! runs when the host fires `deploy`. An `initialize` hook always exists:
//! it writes a JSON snapshot of the invocation to a temp file and points
//! scripts at it through `SLS_CONTEXT`.
//!
//! ## Architecture
//!
//! - **Config**: `custom.serverless-hooks` section, parsed once
//! - **Streams**: stdin/stdout/stderr wiring, resolved once
//! - **Binder**: manifest scripts to event bindings
//! - **Context**: invocation snapshot with scoped cleanup
//! - **Orchestrator/Engine**: runs the bound script set
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sls_hooks::{Host, ServerlessHooks};
//!
//! let host = Host::new(invocation_id, service_path);
//! let hooks = ServerlessHooks::new(&host)?;
//!
//! hooks.fire("initialize", &host).await?;
//! hooks.fire("deploy", &host).await?;
//! hooks.shutdown().await;
//! ```

pub mod binder;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod host;
pub mod manifest;
pub mod orchestrator;
pub mod streams;

// Re-export commonly used types
pub use binder::{HookBinder, HookBinding, HookBindings, HookKind, INITIALIZE_EVENT};
pub use config::{HooksConfig, PLUGIN_NAME, RunAllOptions, StreamConfig};
pub use context::{CONTEXT_ENV, ContextGuard, ContextSnapshotWriter, InvocationContext};
pub use engine::{EngineError, ExecutionEngine, RunAllEngine, RunOptions};
pub use error::{HooksError, Result};
pub use hooks::ServerlessHooks;
pub use host::Host;
pub use manifest::ScriptManifest;
pub use orchestrator::ExecutionOrchestrator;
pub use streams::{ResolvedStreams, StreamHandle, StreamName};
