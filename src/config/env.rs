//! Environment variable overlay

use super::document::{mapping_at, Document};
use super::keys::{KeyKind, KeySet};
use serde_yaml::Value;

/// Where variable values come from. The loader defaults to the process
/// environment; tests and embedders can swap in a map.
pub type EnvLookup<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;

pub fn process_env<'a>() -> EnvLookup<'a> {
    Box::new(|name| std::env::var(name).ok())
}

/// What an [`overlay`] pass changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Overlay {
    /// Variables written into the document.
    pub applied: usize,
    /// Optional structs that did not exist until a variable named one of
    /// their fields.
    pub created: Vec<Vec<String>>,
}

/// Write every set variable that names a leaf of `keys` into `doc`.
///
/// Empty values count as unset.
pub fn overlay(
    doc: &mut Document,
    keys: &KeySet,
    prefix: Option<&str>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Overlay {
    let mut result = Overlay::default();
    for info in keys.bindable() {
        let name = info.env_var(prefix);
        let Some(raw) = lookup(&name).filter(|v| !v.is_empty()) else {
            continue;
        };

        let parents = &info.segments[..info.segments.len() - 1];
        let missing = (1..=parents.len())
            .map(|depth| &parents[..depth])
            .find(|path| mapping_at(doc.as_mapping(), *path).is_none());
        if let Some(path) = missing {
            if !result.created.iter().any(|created| created.as_slice() == path) {
                result.created.push(path.to_vec());
            }
        }

        let element = keys.element_kind(&info.path());
        doc.set(&info.segments, convert(&raw, info.kind, element));
        tracing::debug!("Bound {} to config key {}", name, info.path());
        result.applied += 1;
    }
    result
}

/// Turn a raw variable into the value shape the leaf expects.
///
/// A value that does not parse as the expected type is kept as a string so the
/// decode step reports the mismatch.
pub fn convert(raw: &str, kind: KeyKind, element: Option<KeyKind>) -> Value {
    let trimmed = raw.trim();
    match kind {
        KeyKind::Bool => parse_bool(trimmed)
            .map(Value::Bool)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        KeyKind::Int => {
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Number(i.into())
            } else if let Ok(u) = trimmed.parse::<u64>() {
                Value::Number(u.into())
            } else {
                Value::String(raw.to_string())
            }
        }
        KeyKind::Float => trimmed
            .parse::<f64>()
            .map(|f| Value::Number(f.into()))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        KeyKind::Str | KeyKind::Enum => Value::String(raw.to_string()),
        KeyKind::Seq => {
            if trimmed.starts_with('[') {
                if let Ok(seq @ Value::Sequence(_)) = serde_yaml::from_str::<Value>(trimmed) {
                    return seq;
                }
            }
            let element = element.unwrap_or(KeyKind::Any);
            Value::Sequence(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| convert(part, element, None))
                    .collect(),
            )
        }
        KeyKind::Unit => Value::Null,
        KeyKind::Map | KeyKind::Struct | KeyKind::Any => {
            serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
    }
}

/// Accepts `1 t true 0 f false` in any case.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Db {
        host: String,
        port: u16,
    }

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Target {
        port: u16,
        debug: bool,
        database: Db,
        hosts: Vec<String>,
        ports: Vec<u16>,
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_convert_by_kind() {
        assert_eq!(convert("8080", KeyKind::Int, None), Value::Number(8080.into()));
        assert_eq!(convert("-3", KeyKind::Int, None), Value::Number((-3).into()));
        assert_eq!(convert("TRUE", KeyKind::Bool, None), Value::Bool(true));
        assert_eq!(convert("f", KeyKind::Bool, None), Value::Bool(false));
        assert_eq!(convert("8080", KeyKind::Str, None), Value::String("8080".into()));
        assert_eq!(convert("abc", KeyKind::Int, None), Value::String("abc".into()));
        assert_eq!(convert("10s", KeyKind::Any, None), Value::String("10s".into()));
        assert_eq!(convert("30", KeyKind::Any, None), Value::Number(30.into()));
    }

    #[test]
    fn test_convert_sequences() {
        let csv = convert("a, b ,,c", KeyKind::Seq, Some(KeyKind::Str));
        assert_eq!(csv, serde_yaml::from_str::<Value>("[a, b, c]").expect("yaml"));

        let ports = convert("80,443", KeyKind::Seq, Some(KeyKind::Int));
        assert_eq!(ports, serde_yaml::from_str::<Value>("[80, 443]").expect("yaml"));

        let flow = convert("[1, 2]", KeyKind::Seq, Some(KeyKind::Int));
        assert_eq!(flow, serde_yaml::from_str::<Value>("[1, 2]").expect("yaml"));
    }

    #[test]
    fn test_overlay_sets_only_bound_leaves() {
        let keys = KeySet::of::<Target>();
        let mut doc = Document::new();
        let env = lookup(&[
            ("PORT", "8080"),
            ("DATABASE_HOST", "db.internal"),
            ("DEBUG", ""),
            ("DATABASE", "ignored"),
            ("PORTS", "1,2"),
        ]);

        let result = overlay(&mut doc, &keys, None, &env);

        assert_eq!(result.applied, 3);
        assert_eq!(doc.get("port"), Some(&Value::Number(8080.into())));
        assert_eq!(doc.get("database.host"), Some(&Value::String("db.internal".into())));
        assert!(doc.get("debug").is_none(), "empty variables are unset");
        assert!(doc.get("database.port").is_none());
    }

    #[test]
    fn test_overlay_with_prefix() {
        let keys = KeySet::of::<Target>();
        let mut doc = Document::new();
        let env = lookup(&[("PORT", "1"), ("SVC_PORT", "2")]);

        overlay(&mut doc, &keys, Some("svc"), &env);

        assert_eq!(doc.get("port"), Some(&Value::Number(2.into())));
    }

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct WithOptional {
        name: String,
        db: Option<Db>,
    }

    #[test]
    fn test_overlay_reports_created_optional_structs() {
        let keys = KeySet::of::<WithOptional>();
        let env = lookup(&[("DB_HOST", "h"), ("DB_PORT", "1"), ("NAME", "n")]);

        let mut doc = Document::from_value(serde_yaml::from_str("name: x
db: ~
").expect("yaml"))
            .expect("doc");
        let result = overlay(&mut doc, &keys, None, &env);
        assert_eq!(result.applied, 3);
        assert_eq!(result.created, vec![vec!["db".to_string()]]);

        let mut doc =
            Document::from_value(serde_yaml::from_str("db:
  host: a
").expect("yaml"))
                .expect("doc");
        let result = overlay(&mut doc, &keys, None, &env);
        assert!(result.created.is_empty(), "existing struct is not created");
    }
}
