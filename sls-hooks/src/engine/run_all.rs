//! Bundled run-all engine
//!
//! Runs manifest scripts through the platform shell, one after another or
//! concurrently, wiring each child to the resolved streams.

use super::EngineError;
use super::ExecutionEngine;
use super::RunOptions;
use super::pattern::Task;
use super::pattern::resolve_tasks;
use crate::manifest::ScriptManifest;
use crate::streams::ListenerGuard;
use crate::streams::StreamHandle;
use crate::streams::StreamName;
use async_trait::async_trait;
use futures::StreamExt;
use indexmap::IndexMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Command;

/// npm-run-all style engine over a fixed script table.
#[derive(Debug, Clone, Default)]
pub struct RunAllEngine {
    scripts: Arc<IndexMap<String, String>>,
}

impl RunAllEngine {
    pub fn new(scripts: IndexMap<String, String>) -> Self {
        Self {
            scripts: Arc::new(scripts),
        }
    }

    pub fn from_manifest(manifest: &ScriptManifest) -> Self {
        Self::new(manifest.commands())
    }

    pub fn scripts(&self) -> &IndexMap<String, String> {
        &self.scripts
    }
}

#[async_trait]
impl ExecutionEngine for RunAllEngine {
    async fn run(&self, patterns: &[String], options: &RunOptions) -> Result<(), EngineError> {
        let tasks = resolve_tasks(patterns, &self.scripts, &options.arguments)?;
        let label_width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);

        if options.parallel {
            run_parallel(&tasks, options, label_width).await
        } else {
            run_sequential(&tasks, options, label_width).await
        }
    }
}

async fn run_sequential(
    tasks: &[Task],
    options: &RunOptions,
    label_width: usize,
) -> Result<(), EngineError> {
    let mut first_error = None;

    for task in tasks {
        if let Err(e) = run_task(task, options, label_width).await {
            if !options.continue_on_error {
                return Err(e);
            }
            tracing::warn!("Continuing after failed script {}: {e}", task.name);
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Dropping the pending futures kills their children, which is how a failure
/// (or a race winner) stops the rest.
async fn run_parallel(
    tasks: &[Task],
    options: &RunOptions,
    label_width: usize,
) -> Result<(), EngineError> {
    let limit = match options.max_parallel {
        0 => tasks.len().max(1),
        n => n,
    };

    let pending: Vec<_> = tasks
        .iter()
        .map(|task| run_named(task, options, label_width))
        .collect();
    let mut running = futures::stream::iter(pending).buffer_unordered(limit);

    let mut first_error = None;
    while let Some((task, result)) = running.next().await {
        match result {
            Ok(()) if options.race => {
                tracing::debug!("Script {} won the race, stopping the others", task.name);
                return Ok(());
            }
            Ok(()) => {}
            Err(e) if !options.continue_on_error => return Err(e),
            Err(e) => {
                tracing::warn!("Continuing after failed script {}: {e}", task.name);
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

async fn run_named<'a>(
    task: &'a Task,
    options: &RunOptions,
    label_width: usize,
) -> (&'a Task, Result<(), EngineError>) {
    (task, run_task(task, options, label_width).await)
}

async fn run_task(task: &Task, options: &RunOptions, label_width: usize) -> Result<(), EngineError> {
    let streams = &options.streams;

    if options.print_name
        && !options.silent
        && let Some(stdout) = &streams.stdout
    {
        let banner = format!("\n> {}\n> {}\n\n", task.name, task.command);
        let mut writer = stdout.writer()?;
        writer.write_all(banner.as_bytes()).await?;
        writer.flush().await?;
    }

    let mut command = shell_command(&task.command);
    command.envs(&options.env).kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    let labelled = options.print_label;
    command.stdin(streams.stdio(StreamName::Stdin)?);
    command.stdout(child_output(streams.stdout.as_ref(), labelled)?);
    command.stderr(child_output(streams.stderr.as_ref(), labelled)?);

    let _listeners: Vec<ListenerGuard> = StreamName::ALL
        .iter()
        .filter_map(|name| streams.get(*name).and_then(StreamHandle::host_stream))
        .map(|host| host.attach())
        .collect();

    tracing::debug!("Spawning script {}: {}", task.name, task.command);
    let mut child = command.spawn().map_err(|source| EngineError::Spawn {
        name: task.name.clone(),
        source,
    })?;

    let label = format!("[{:<label_width$}] ", task.name);
    let stdout_pump = child
        .stdout
        .take()
        .map(|out| forward_labelled(out, label.clone(), streams.stdout.clone()));
    let stderr_pump = child
        .stderr
        .take()
        .map(|err| forward_labelled(err, label.clone(), streams.stderr.clone()));

    let (status, stdout_result, stderr_result) = tokio::join!(
        child.wait(),
        async {
            match stdout_pump {
                Some(pump) => pump.await,
                None => Ok(()),
            }
        },
        async {
            match stderr_pump {
                Some(pump) => pump.await,
                None => Ok(()),
            }
        },
    );
    let status = status?;
    stdout_result?;
    stderr_result?;

    if status.success() {
        Ok(())
    } else {
        Err(EngineError::ScriptFailed {
            name: task.name.clone(),
            code: status.code(),
        })
    }
}

fn child_output(handle: Option<&StreamHandle>, labelled: bool) -> std::io::Result<Stdio> {
    match handle {
        None => Ok(Stdio::null()),
        Some(_) if labelled => Ok(Stdio::piped()),
        Some(handle) => handle.stdio(),
    }
}

async fn forward_labelled<R>(
    reader: R,
    label: String,
    target: Option<StreamHandle>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(target) = target else {
        return Ok(());
    };
    let mut writer = target.writer()?;
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    // Output is labelled as raw bytes; scripts may print anything.
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }
        writer.write_all(label.as_bytes()).await?;
        writer.write_all(&line).await?;
    }
    writer.flush().await
}

fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(script);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }
}
