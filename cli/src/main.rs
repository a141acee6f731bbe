//! sls-hooks - fire service lifecycle events and run the bound scripts.
//!
//! Acts as the host for the hooks engine: it assembles the invocation state,
//! builds the plugin once, fires the requested events in order and removes
//! the context file on every way out.

mod service;
mod signals;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde_json::Map;
use serde_json::Value;
use sls_hooks::Host;
use sls_hooks::HookKind;
use sls_hooks::INITIALIZE_EVENT;
use sls_hooks::ServerlessHooks;

use signals::TerminationSignals;

#[derive(Parser)]
#[command(name = "sls-hooks", version)]
#[command(about = "Run package.json hook scripts for service lifecycle events")]
struct Cli {
    /// Service directory containing package.json
    #[arg(long, default_value = ".")]
    service_path: PathBuf,

    /// Service descriptor (default: serverless.yml/.yaml/.json in the service path)
    #[arg(long)]
    service_file: Option<PathBuf>,

    /// Invocation option passed to scripts through the context (key=value)
    #[arg(short = 'o', long = "option", value_parser = service::parse_option)]
    options: Vec<(String, Value)>,

    /// Do not fire `initialize` before the requested events
    #[arg(long)]
    no_initialize: bool,

    /// List bound hooks and exit
    #[arg(long)]
    list: bool,

    /// Lifecycle events to fire, in order
    events: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sls_hooks=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let host = build_host(&cli)?;
    let hooks = ServerlessHooks::new(&host).context("failed to set up serverless-hooks")?;

    if cli.list {
        for (event, binding) in hooks.hooks() {
            let note = match binding.kind {
                HookKind::Initialize { synthetic: true } => " (context only)",
                _ => "",
            };
            println!("{event}\t{}{note}", binding.script_key);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let events = planned_events(&cli.events, cli.no_initialize);
    let mut signals = TerminationSignals::new().context("failed to install signal handlers")?;

    // The plugin owns the context file; it is shut down before any return
    // below, and unwinding drops it as well.
    let outcome = tokio::select! {
        result = fire_all(&hooks, &host, &events) => Ok(result),
        signal = signals.recv() => Err(signal),
    };
    hooks.shutdown().await;

    match outcome {
        Ok(result) => result.map(|()| ExitCode::SUCCESS),
        Err(signal) => {
            tracing::warn!("Received {}, stopping hook scripts", signal.name());
            Ok(ExitCode::from(signal.exit_code()))
        }
    }
}

fn build_host(cli: &Cli) -> anyhow::Result<Host> {
    let service_path = cli
        .service_path
        .canonicalize()
        .with_context(|| format!("service path {} not found", cli.service_path.display()))?;

    let descriptor = match service::find_descriptor(&service_path, cli.service_file.as_deref()) {
        Some(path) => service::load_descriptor(&path)?,
        None => {
            tracing::debug!("No service descriptor in {}", service_path.display());
            Map::new()
        }
    };
    let options: Map<String, Value> = cli.options.iter().cloned().collect();

    Ok(Host::new(uuid::Uuid::new_v4().to_string(), service_path)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_cli(cli.events.clone(), options)
        .with_service(descriptor))
}

/// `initialize` always fires first unless disabled; repeats are dropped.
fn planned_events(requested: &[String], no_initialize: bool) -> Vec<String> {
    let mut events = Vec::with_capacity(requested.len() + 1);
    if !no_initialize {
        events.push(INITIALIZE_EVENT.to_string());
    }
    for event in requested {
        if !events.contains(event) {
            events.push(event.clone());
        }
    }
    events
}

async fn fire_all(hooks: &ServerlessHooks, host: &Host, events: &[String]) -> anyhow::Result<()> {
    for event in events {
        let fired = hooks
            .fire(event, host)
            .await
            .with_context(|| format!("hook for event '{event}' failed"))?;
        if !fired {
            tracing::debug!("No hook bound to '{event}', skipping");
        }
    }
    Ok(())
}
