//! Script name patterns
//!
//! A pattern is a script name, optionally followed by arguments:
//! `"build:* --verbose"`. Script names are `:`-separated; `*` matches inside
//! one segment and `**` spans segments.

use super::EngineError;
use globset::GlobBuilder;
use globset::GlobMatcher;
use indexmap::IndexMap;

const SEGMENT_SEPARATOR: char = ':';
const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// One script selected for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    /// Command line including appended arguments.
    pub command: String,
}

#[derive(Debug)]
enum NameMatcher {
    Exact(String),
    Glob(GlobMatcher),
}

impl NameMatcher {
    fn is_match(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(exact) => exact == name,
            NameMatcher::Glob(glob) => glob.is_match(to_path_like(name)),
        }
    }
}

#[derive(Debug)]
struct Pattern {
    raw: String,
    matcher: NameMatcher,
    args: Vec<String>,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidPattern {
            pattern: raw.to_string(),
            reason,
        };

        let mut words = shlex::split(raw)
            .ok_or_else(|| invalid("unbalanced quotes".to_string()))?
            .into_iter();
        let name = words
            .next()
            .ok_or_else(|| invalid("empty pattern".to_string()))?;

        let matcher = if name.contains(GLOB_CHARS) {
            let glob = GlobBuilder::new(&to_path_like(&name))
                .literal_separator(true)
                .build()
                .map_err(|e| invalid(e.to_string()))?;
            NameMatcher::Glob(glob.compile_matcher())
        } else {
            NameMatcher::Exact(name)
        };

        Ok(Self {
            raw: raw.to_string(),
            matcher,
            args: words.collect(),
        })
    }
}

fn to_path_like(name: &str) -> String {
    name.replace(SEGMENT_SEPARATOR, "/")
}

/// Expand `patterns` against the available scripts.
///
/// Results keep pattern order, then script order. A script selected by
/// several patterns runs once, with the arguments of the first. Every
/// pattern must match at least one script.
pub fn resolve_tasks(
    patterns: &[String],
    scripts: &IndexMap<String, String>,
    extra_args: &[String],
) -> Result<Vec<Task>, EngineError> {
    let mut tasks: IndexMap<&str, Task> = IndexMap::new();

    for raw in patterns {
        let pattern = Pattern::parse(raw)?;
        let mut matched = false;

        for (name, command) in scripts {
            if !pattern.matcher.is_match(name) {
                continue;
            }
            matched = true;
            if tasks.contains_key(name.as_str()) {
                continue;
            }
            let command = append_args(command, pattern.args.iter().chain(extra_args))
                .map_err(|reason| EngineError::InvalidPattern {
                    pattern: pattern.raw.clone(),
                    reason,
                })?;
            tasks.insert(
                name.as_str(),
                Task {
                    name: name.clone(),
                    command,
                },
            );
        }

        if !matched {
            return Err(EngineError::NoMatchingScript(pattern.raw));
        }
    }

    Ok(tasks.into_values().collect())
}

fn append_args<'a>(
    command: &str,
    args: impl Iterator<Item = &'a String>,
) -> Result<String, String> {
    let args: Vec<&str> = args.map(String::as_str).collect();
    if args.is_empty() {
        return Ok(command.to_string());
    }
    let quoted = shlex::try_join(args).map_err(|e| e.to_string())?;
    Ok(format!("{command} {quoted}"))
}
