//! Service descriptor loading and CLI option parsing.

use anyhow::Context;
use anyhow::Result;
use serde_json::Map;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;

/// Descriptor file names probed in the service directory, in order.
pub const DESCRIPTOR_FILES: &[&str] = &["serverless.yml", "serverless.yaml", "serverless.json"];

/// Locate the service descriptor: `explicit` if given, otherwise the first
/// known file name present in `service_path`.
pub fn find_descriptor(service_path: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    DESCRIPTOR_FILES
        .iter()
        .map(|name| service_path.join(name))
        .find(|path| path.is_file())
}

/// Parse a YAML or JSON descriptor into its top-level fields.
pub fn load_descriptor(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read service file {}", path.display()))?;

    let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
    };

    match value {
        Value::Object(fields) => Ok(fields),
        Value::Null => Ok(Map::new()),
        _ => anyhow::bail!("service file {} is not a mapping", path.display()),
    }
}

/// Parse a `key=value` CLI option. Values that are valid JSON keep their
/// type, anything else is a string. A bare `key` means `true`.
pub fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = match raw.split_once('=') {
        Some((key, value)) => (
            key,
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string())),
        ),
        None => (raw, Value::Bool(true)),
    };
    if key.is_empty() {
        return Err(format!("option '{raw}' has an empty name"));
    }
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_descriptor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("serverless.yml"),
            "service: orders\ncustom:\n  serverless-hooks:\n    hookPrefix: sls\n",
        )
        .unwrap();

        let path = find_descriptor(dir.path(), None).unwrap();
        let fields = load_descriptor(&path).unwrap();
        assert_eq!(fields["service"], json!("orders"));
        assert_eq!(fields["custom"]["serverless-hooks"]["hookPrefix"], json!("sls"));
    }

    #[test]
    fn test_json_descriptor_and_probe_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("serverless.json"), r#"{ "service": "json" }"#).unwrap();
        assert_eq!(
            find_descriptor(dir.path(), None),
            Some(dir.path().join("serverless.json"))
        );

        std::fs::write(dir.path().join("serverless.yaml"), "service: yaml\n").unwrap();
        let path = find_descriptor(dir.path(), None).unwrap();
        assert_eq!(load_descriptor(&path).unwrap()["service"], json!("yaml"));
    }

    #[test]
    fn test_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_descriptor(dir.path(), None), None);
    }

    #[test]
    fn test_non_mapping_descriptor_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("serverless.yml");
        std::fs::write(&path, "- a\n- b\n").unwrap();
        assert!(load_descriptor(&path).is_err());
    }

    #[test]
    fn test_parse_option() {
        assert_eq!(parse_option("stage=dev").unwrap(), ("stage".to_string(), json!("dev")));
        assert_eq!(parse_option("count=3").unwrap(), ("count".to_string(), json!(3)));
        assert_eq!(parse_option("verbose").unwrap(), ("verbose".to_string(), json!(true)));
        assert!(parse_option("=x").is_err());
    }
}
