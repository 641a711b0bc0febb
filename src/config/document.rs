//! Case-insensitive key-path documents and last-write-wins merging

use serde_yaml::{Mapping, Value};

/// A parsed config layer: a mapping tree whose keys are all lower-case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a parsed value.
    ///
    /// `null` (an empty file) yields an empty document. Any other non-mapping
    /// root is rejected and the offending kind is returned.
    pub fn from_value(value: Value) -> Result<Self, &'static str> {
        match normalize(value) {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            other => Err(kind_name(&other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Merge `other` on top of `self`.
    ///
    /// Mappings present on both sides are merged key by key; every other value
    /// in `other` replaces what was there. Keys only present in `self` survive.
    pub fn merge(&mut self, other: Document) {
        merge_mappings(&mut self.root, other.root);
    }

    /// Look up a dotted key path, ignoring case.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first.to_lowercase().as_str())?;
        for segment in segments {
            current = current.as_mapping()?.get(segment.to_lowercase().as_str())?;
        }
        Some(current)
    }

    /// Write `value` at `segments`, creating intermediate mappings.
    ///
    /// A non-mapping value sitting on the way is replaced by a mapping.
    pub fn set<S: AsRef<str>>(&mut self, segments: &[S], value: Value) {
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut current = &mut self.root;
        for segment in parents {
            let key = Value::String(segment.as_ref().to_string());
            let slot = current.entry(key).or_insert_with(|| Value::Mapping(Mapping::new()));
            if !slot.is_mapping() {
                *slot = Value::Mapping(Mapping::new());
            }
            current = match slot {
                Value::Mapping(map) => map,
                _ => unreachable!("slot was just made a mapping"),
            };
        }
        current.insert(Value::String(last.as_ref().to_string()), value);
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub(crate) fn as_mapping_mut(&mut self) -> &mut Mapping {
        &mut self.root
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.root)
    }
}

fn merge_mappings(into: &mut Mapping, from: Mapping) {
    for (key, incoming) in from {
        match (into.get_mut(&key), incoming) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                merge_mappings(existing, incoming);
            }
            (_, incoming) => {
                into.insert(key, incoming);
            }
        }
    }
}

/// Lower-case every mapping key, recursing through mappings and sequences.
fn normalize(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| (Value::String(key_string(&key)), normalize(value)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize).collect()),
        // `!Variant payload`: the tag names an enum variant and must survive.
        Value::Tagged(mut tagged) => {
            tagged.value = normalize(tagged.value);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// The mapping reached by following `segments` exactly, without case folding.
pub(crate) fn mapping_at<'a, S: AsRef<str>>(
    root: &'a Mapping,
    segments: &[S],
) -> Option<&'a Mapping> {
    segments
        .iter()
        .try_fold(root, |map, segment| map.get(segment.as_ref()).and_then(Value::as_mapping))
}

pub(crate) fn mapping_at_mut<'a, S: AsRef<str>>(
    root: &'a mut Mapping,
    segments: &[S],
) -> Option<&'a mut Mapping> {
    segments
        .iter()
        .try_fold(root, |map, segment| {
            map.get_mut(segment.as_ref()).and_then(Value::as_mapping_mut)
        })
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_lowercase(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_lowercase())
            .unwrap_or_default(),
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
