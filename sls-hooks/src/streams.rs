//! Stream resolution
//!
//! Each of the three logical streams is resolved exactly once, when the
//! plugin is constructed. Resolved handles are shared by every script run
//! for the lifetime of the process and are never closed or reopened here.

use crate::config::FileOpenOptions;
use crate::config::OpenFlags;
use crate::config::RunAllOptions;
use crate::config::StreamConfig;
use crate::error::HooksError;
use crate::error::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use tokio::io::AsyncWrite;

/// Listener ceiling applied to host streams until `initialize` raises it.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Logical stream name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamName {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamName {
    pub const ALL: [StreamName; 3] = [StreamName::Stdin, StreamName::Stdout, StreamName::Stderr];

    /// Output-class streams are opened for writing, stdin for reading.
    pub fn is_writable(self) -> bool {
        !matches!(self, StreamName::Stdin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamName::Stdin => "stdin",
            StreamName::Stdout => "stdout",
            StreamName::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the streams that alias the host process streams.
pub type UsedStreams = BTreeSet<StreamName>;

/// Alias of one of the host process's standard streams.
///
/// Every script run attached to the stream holds a [`ListenerGuard`]. When
/// more guards are live than the ceiling allows, a leak warning is logged
/// once. A ceiling of 0 means unlimited.
#[derive(Debug)]
pub struct HostStream {
    name: StreamName,
    listeners: AtomicUsize,
    max_listeners: AtomicUsize,
    warned: AtomicBool,
}

impl HostStream {
    pub fn new(name: StreamName) -> Self {
        Self {
            name,
            listeners: AtomicUsize::new(0),
            max_listeners: AtomicUsize::new(DEFAULT_MAX_LISTENERS),
            warned: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> StreamName {
        self.name
    }

    /// Register a listener for as long as the returned guard lives.
    pub fn attach(self: &Arc<Self>) -> ListenerGuard {
        let count = self.listeners.fetch_add(1, Ordering::SeqCst) + 1;
        let max = self.max_listeners.load(Ordering::SeqCst);
        if max != 0 && count > max && !self.warned.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                stream = %self.name,
                listeners = count,
                max_listeners = max,
                "possible listener leak detected on shared {} stream",
                self.name
            );
        }
        ListenerGuard {
            stream: Arc::clone(self),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    pub fn max_listeners(&self) -> usize {
        self.max_listeners.load(Ordering::SeqCst)
    }

    pub fn set_max_listeners(&self, max: usize) {
        self.max_listeners.store(max, Ordering::SeqCst);
    }

    /// Whether the leak warning has been emitted.
    pub fn leak_warned(&self) -> bool {
        self.warned.load(Ordering::SeqCst)
    }
}

/// Keeps a listener registered on a [`HostStream`] until dropped.
#[derive(Debug)]
pub struct ListenerGuard {
    stream: Arc<HostStream>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.stream.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A concrete, resolved stream.
#[derive(Debug, Clone)]
pub enum StreamHandle {
    Host(Arc<HostStream>),
    File(Arc<File>),
}

impl StreamHandle {
    /// Stdio for a child process. File handles are duplicated, not reopened,
    /// so every child shares the same open file.
    pub fn stdio(&self) -> std::io::Result<Stdio> {
        match self {
            StreamHandle::Host(_) => Ok(Stdio::inherit()),
            StreamHandle::File(file) => Ok(Stdio::from(file.try_clone()?)),
        }
    }

    /// Async writer targeting this stream, used for labelled and banner output.
    pub fn writer(&self) -> std::io::Result<Box<dyn AsyncWrite + Send + Unpin>> {
        match self {
            StreamHandle::Host(host) => Ok(match host.name() {
                StreamName::Stderr => Box::new(tokio::io::stderr()),
                _ => Box::new(tokio::io::stdout()),
            }),
            StreamHandle::File(file) => {
                Ok(Box::new(tokio::fs::File::from_std(file.try_clone()?)))
            }
        }
    }

    pub fn host_stream(&self) -> Option<&Arc<HostStream>> {
        match self {
            StreamHandle::Host(host) => Some(host),
            StreamHandle::File(_) => None,
        }
    }
}

/// The three resolved streams. `None` means suppressed.
#[derive(Debug, Clone, Default)]
pub struct ResolvedStreams {
    pub stdin: Option<StreamHandle>,
    pub stdout: Option<StreamHandle>,
    pub stderr: Option<StreamHandle>,
    used: UsedStreams,
}

impl ResolvedStreams {
    /// Resolve the stream configuration. Files that cannot be opened fail
    /// here, before any hook is bound.
    pub fn resolve(options: &RunAllOptions) -> Result<Self> {
        let mut streams = Self::default();
        for name in StreamName::ALL {
            let config = match name {
                StreamName::Stdin => &options.stdin,
                StreamName::Stdout => &options.stdout,
                StreamName::Stderr => &options.stderr,
            };
            let handle = streams.resolve_one(name, config)?;
            *streams.slot_mut(name) = handle;
        }
        Ok(streams)
    }

    fn resolve_one(&mut self, name: StreamName, config: &StreamConfig) -> Result<Option<StreamHandle>> {
        match config {
            StreamConfig::Suppressed => Ok(None),
            StreamConfig::Inherited => {
                self.used.insert(name);
                Ok(Some(StreamHandle::Host(Arc::new(HostStream::new(name)))))
            }
            StreamConfig::FileBacked { path, options } => {
                let file = open_stream_file(name, path, options)?;
                tracing::debug!(stream = %name, path = %path.display(), "opened file-backed stream");
                Ok(Some(StreamHandle::File(Arc::new(file))))
            }
        }
    }

    fn slot_mut(&mut self, name: StreamName) -> &mut Option<StreamHandle> {
        match name {
            StreamName::Stdin => &mut self.stdin,
            StreamName::Stdout => &mut self.stdout,
            StreamName::Stderr => &mut self.stderr,
        }
    }

    pub fn get(&self, name: StreamName) -> Option<&StreamHandle> {
        match name {
            StreamName::Stdin => self.stdin.as_ref(),
            StreamName::Stdout => self.stdout.as_ref(),
            StreamName::Stderr => self.stderr.as_ref(),
        }
    }

    /// Streams that alias host process streams.
    pub fn used(&self) -> &UsedStreams {
        &self.used
    }

    /// Lift the listener ceiling on every host stream in use.
    pub fn raise_listener_ceiling(&self) {
        for name in &self.used {
            if let Some(host) = self.get(*name).and_then(StreamHandle::host_stream) {
                host.set_max_listeners(0);
            }
        }
    }

    /// Child stdio for `name`, `Stdio::null()` when suppressed.
    pub fn stdio(&self, name: StreamName) -> std::io::Result<Stdio> {
        match self.get(name) {
            Some(handle) => handle.stdio(),
            None => Ok(Stdio::null()),
        }
    }
}

fn open_stream_file(name: StreamName, path: &Path, options: &FileOpenOptions) -> Result<File> {
    let flags = options.flags.unwrap_or(if name.is_writable() {
        OpenFlags::Truncate
    } else {
        OpenFlags::Read
    });

    let mut open = OpenOptions::new();
    match flags {
        OpenFlags::Read => {
            open.read(true);
        }
        OpenFlags::Truncate => {
            open.write(true).create(true).truncate(true);
        }
        OpenFlags::TruncateExclusive => {
            open.write(true).create_new(true);
        }
        OpenFlags::Append => {
            open.append(true).create(true);
        }
        OpenFlags::AppendExclusive => {
            open.append(true).create_new(true);
        }
    }

    #[cfg(unix)]
    if let Some(mode) = options.mode {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(mode);
    }

    open.open(path).map_err(|source| HooksError::StreamOpen {
        stream: name,
        path: path.to_path_buf(),
        source,
    })
}
