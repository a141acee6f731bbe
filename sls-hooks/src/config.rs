//! Plugin configuration
//!
//! Read once from the `custom.serverless-hooks` section of the service
//! descriptor. Stream settings accept the loose wire forms users already
//! write (`true`, `0`, `"out.log"`, `{ name = ... }`) and are narrowed into
//! [`StreamConfig`] while parsing, so nothing downstream probes types.

use crate::error::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Section name under `custom` in the service descriptor.
pub const PLUGIN_NAME: &str = "serverless-hooks";

/// Environment variable enabling the per-hook diagnostic line.
pub const DEBUG_ENV: &str = "SLS_DEBUG";

const DEFAULT_HOOK_PREFIX: &str = "hook";
const PREFIX_SEPARATOR: char = ':';

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    hook_prefix: Option<String>,
    #[serde(default)]
    run_all_options: RunAllOptions,
}

/// Immutable plugin configuration.
#[derive(Debug, Clone)]
pub struct HooksConfig {
    hook_prefix: String,
    pub run_all_options: RunAllOptions,
    pub debug: bool,
}

impl HooksConfig {
    /// Parse the plugin section. `None` yields the defaults.
    pub fn from_service(section: Option<&serde_json::Value>) -> Result<Self> {
        let raw = match section {
            Some(serde_json::Value::Null) | None => RawConfig::default(),
            Some(value) => RawConfig::deserialize(value)?,
        };
        let prefix = raw
            .hook_prefix
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_HOOK_PREFIX.to_string());

        Ok(Self {
            hook_prefix: normalize_prefix(&prefix),
            run_all_options: raw.run_all_options,
            debug: debug_from_env(),
        })
    }

    /// Binding prefix, always ending in exactly one `:`.
    pub fn hook_prefix(&self) -> &str {
        &self.hook_prefix
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            hook_prefix: normalize_prefix(DEFAULT_HOOK_PREFIX),
            run_all_options: RunAllOptions::default(),
            debug: false,
        }
    }
}

/// Trim every trailing separator, then append exactly one.
pub fn normalize_prefix(prefix: &str) -> String {
    format!(
        "{}{PREFIX_SEPARATOR}",
        prefix.trim_end_matches(PREFIX_SEPARATOR)
    )
}

fn debug_from_env() -> bool {
    std::env::var_os(DEBUG_ENV).is_some_and(|v| !v.is_empty())
}

/// Stream wiring plus the options passed through to the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunAllOptions {
    pub stdin: StreamConfig,
    pub stdout: StreamConfig,
    pub stderr: StreamConfig,
    pub parallel: bool,
    pub continue_on_error: bool,
    pub race: bool,
    /// 0 means unbounded.
    pub max_parallel: usize,
    pub print_name: bool,
    pub print_label: bool,
    pub silent: bool,
    pub arguments: Vec<String>,
}

impl Default for RunAllOptions {
    fn default() -> Self {
        Self {
            stdin: StreamConfig::Suppressed,
            stdout: StreamConfig::Inherited,
            stderr: StreamConfig::Inherited,
            parallel: false,
            continue_on_error: false,
            race: false,
            max_parallel: 0,
            print_name: false,
            print_label: false,
            silent: false,
            arguments: Vec::new(),
        }
    }
}

/// How one logical stream is wired into spawned scripts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Option<StreamConfigWire>")]
pub enum StreamConfig {
    /// Share the host process stream.
    Inherited,
    /// Not forwarded at all.
    Suppressed,
    /// Backed by a file opened once at construction.
    FileBacked {
        path: PathBuf,
        options: FileOpenOptions,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOpenOptions {
    /// `None` picks the stream direction's default (`w` or `r`).
    pub flags: Option<OpenFlags>,
    /// Unix permission bits applied when the file is created.
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlags {
    /// `r`
    Read,
    /// `w`
    Truncate,
    /// `wx`
    TruncateExclusive,
    /// `a`
    Append,
    /// `ax`
    AppendExclusive,
}

impl std::str::FromStr for OpenFlags {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Truncate),
            "wx" | "xw" => Ok(Self::TruncateExclusive),
            "a" => Ok(Self::Append),
            "ax" | "xa" => Ok(Self::AppendExclusive),
            other => Err(format!("unsupported stream flags '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamConfigWire {
    Flag(bool),
    Descriptor(i64),
    Path(String),
    File {
        name: PathBuf,
        #[serde(default)]
        flags: Option<String>,
        #[serde(default)]
        mode: Option<u32>,
    },
}

impl TryFrom<Option<StreamConfigWire>> for StreamConfig {
    type Error = String;

    fn try_from(wire: Option<StreamConfigWire>) -> std::result::Result<Self, Self::Error> {
        Ok(match wire {
            None | Some(StreamConfigWire::Flag(false)) | Some(StreamConfigWire::Descriptor(0)) => {
                Self::Suppressed
            }
            Some(StreamConfigWire::Flag(true)) | Some(StreamConfigWire::Descriptor(_)) => {
                Self::Inherited
            }
            Some(StreamConfigWire::Path(path)) if path.is_empty() => Self::Suppressed,
            Some(StreamConfigWire::Path(path)) => Self::FileBacked {
                path: PathBuf::from(path),
                options: FileOpenOptions::default(),
            },
            Some(StreamConfigWire::File { name, flags, mode }) => Self::FileBacked {
                path: name,
                options: FileOpenOptions {
                    flags: flags.as_deref().map(str::parse).transpose()?,
                    mode,
                },
            },
        })
    }
}
