//! Project command manifest (`package.json` scripts)

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use std::fmt;
use std::path::Path;

pub const MANIFEST_FILE: &str = "package.json";

/// One `scripts` entry. `command` is `None` for `null` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub name: String,
    pub command: Option<String>,
}

impl ScriptEntry {
    pub fn new(name: impl Into<String>, command: Option<&str>) -> Self {
        Self {
            name: name.into(),
            command: command.map(str::to_string),
        }
    }
}

/// Scripts in declaration order, duplicates included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptManifest {
    entries: Vec<ScriptEntry>,
}

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    scripts: Option<ScriptManifest>,
}

impl ScriptManifest {
    /// Read `<service_path>/package.json`.
    ///
    /// A missing or malformed manifest is treated as empty.
    pub fn load(service_path: &Path) -> Self {
        let path = service_path.join(MANIFEST_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No readable manifest at {}: {e}", path.display());
                return Self::default();
            }
        };
        match Self::from_json(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!("Ignoring unparsable manifest {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Parse the `scripts` table of a `package.json` document.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let package: PackageJson = serde_json::from_str(content)?;
        Ok(package.scripts.unwrap_or_default())
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ScriptEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runnable scripts by name. Later duplicates overwrite earlier ones and
    /// `null` entries are dropped.
    pub fn commands(&self) -> IndexMap<String, String> {
        let mut commands = IndexMap::new();
        for entry in &self.entries {
            match &entry.command {
                Some(command) => {
                    commands.insert(entry.name.clone(), command.clone());
                }
                None => {
                    commands.shift_remove(&entry.name);
                }
            }
        }
        commands
    }
}

impl<'de> Deserialize<'de> for ScriptManifest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = ScriptManifest;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of script names to command lines")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, command)) = map.next_entry::<String, Option<String>>()? {
                    entries.push(ScriptEntry { name, command });
                }
                Ok(ScriptManifest { entries })
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
