//! Merge engines: where layer documents come from

use super::document::Document;
use super::error::{LayerError, SetupError};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads named layer documents and merges them.
///
/// `read` returns `Ok(None)` when no document with that name exists and an
/// error only when one exists but cannot be used.
pub trait MergeEngine {
    /// Point the engine at the directory layers are read from.
    fn configure(&mut self, dir: &Path) -> Result<(), SetupError>;

    fn read(&self, name: &str) -> Result<Option<Document>, LayerError>;

    fn merge(&self, into: &mut Document, from: Document) {
        into.merge(from);
    }
}

/// On-disk document formats, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    fn parse(self, content: &str, path: &Path) -> Result<Value, LayerError> {
        match self {
            Format::Yaml => serde_yaml::from_str(content)
                .map_err(|source| LayerError::Yaml { path: path.to_path_buf(), source }),
            Format::Json => {
                let raw: serde_json::Value = serde_json::from_str(content)
                    .map_err(|source| LayerError::Json { path: path.to_path_buf(), source })?;
                Ok(json_to_yaml(raw))
            }
            Format::Toml => {
                let raw: toml::Value = toml::from_str(content)
                    .map_err(|source| LayerError::Toml { path: path.to_path_buf(), source })?;
                Ok(toml_to_yaml(raw))
            }
        }
    }
}

const DEFAULT_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "toml"];

/// Reads `<dir>/<name>.<ext>` from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileEngine {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl Default for FileEngine {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FileEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict or reorder the extensions tried for each layer name.
    /// Unknown extensions are ignored.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(Into::into)
            .filter(|ext: &String| Format::from_extension(ext).is_some())
            .collect();
        self
    }

    /// First existing file for `name`, in extension order.
    pub fn resolve(&self, name: &str) -> Option<(PathBuf, Format)> {
        self.extensions.iter().find_map(|ext| {
            let path = self.dir.join(format!("{name}.{ext}"));
            let format = Format::from_extension(ext)?;
            path.is_file().then_some((path, format))
        })
    }
}

impl MergeEngine for FileEngine {
    fn configure(&mut self, dir: &Path) -> Result<(), SetupError> {
        match fs::metadata(dir) {
            Ok(meta) if !meta.is_dir() => return Err(SetupError::NotADirectory(dir.to_path_buf())),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "Config directory {} does not exist; only defaults and env apply",
                    dir.display()
                );
            }
            Err(source) => return Err(SetupError::Io { path: dir.to_path_buf(), source }),
        }
        self.dir = dir.to_path_buf();
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Document>, LayerError> {
        let Some((path, format)) = self.resolve(name) else {
            return Ok(None);
        };

        let content = fs::read_to_string(&path)
            .map_err(|source| LayerError::Io { path: path.clone(), source })?;
        let value = format.parse(&content, &path)?;
        let document = Document::from_value(value)
            .map_err(|found| LayerError::NotAMapping { path: path.clone(), found })?;
        tracing::debug!("Read config layer {}", path.display());
        Ok(Some(document))
    }
}

/// Serves layers from memory, keyed by layer name. Handy for embedding
/// configuration in a binary and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    sources: HashMap<String, String>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register YAML `content` under the layer `name` (e.g. `"config.prod"`).
    pub fn with_layer(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.sources.insert(name.into(), content.into());
        self
    }
}

impl MergeEngine for InMemoryEngine {
    fn configure(&mut self, _dir: &Path) -> Result<(), SetupError> {
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Document>, LayerError> {
        let Some(content) = self.sources.get(name) else {
            return Ok(None);
        };
        let path = PathBuf::from(format!("<memory>/{name}"));
        let value = Format::Yaml.parse(content, &path)?;
        Document::from_value(value)
            .map(Some)
            .map_err(|found| LayerError::NotAMapping { path, found })
    }
}

fn json_to_yaml(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else {
                Value::Number(n.as_f64().unwrap_or_default().into())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Sequence(items.into_iter().map(json_to_yaml).collect())
        }
        serde_json::Value::Object(map) => Value::Mapping(
            map.into_iter().map(|(k, v)| (Value::String(k), json_to_yaml(v))).collect(),
        ),
    }
}

fn toml_to_yaml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Value::Number(f.into()),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.into_iter().map(toml_to_yaml).collect()),
        toml::Value::Table(table) => {
            let entries = table.into_iter().map(|(k, v)| (Value::String(k), toml_to_yaml(v)));
            Value::Mapping(entries.collect())
        }
    }
}
