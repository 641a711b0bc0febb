//! Key-path discovery for target types
//!
//! [`KeySet::of`] drives `T::deserialize` against a probing deserializer that
//! hands out placeholder values and records every struct field it is asked
//! for. The recorded paths tell the loader which environment variables can
//! bind into `T`, what type each leaf expects, and how each field is spelled.
//!
//! Types that reject a placeholder (an `IpAddr` given `""`, say) are retried
//! with the next candidate value. A field whose candidates run out is left out of its
//! struct on the following pass; its path was already recorded by then.

use serde::de::value::StrDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use super::document::mapping_at_mut;
use super::env::convert;
use serde_yaml::{Mapping, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Path segment standing for "any element of this sequence".
pub const SEQ_ELEMENT: &str = "[]";

const MAX_ATTEMPTS: usize = 8;
const MAX_DEPTH: usize = 16;
const MAX_ROUNDS: usize = 4096;

const STR_CANDIDATES: &[&str] =
    &["", "0", "0.0.0.0", "::", "127.0.0.1:0", "localhost", "http://localhost/"];

/// What a key path decodes into, as far as serde tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Bool,
    Int,
    Float,
    Str,
    Enum,
    Seq,
    Map,
    Struct,
    Unit,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// Field names as the target type declares them.
    pub segments: Vec<String>,
    pub kind: KeyKind,
    /// Declared as `Option<_>`; absent means `None`.
    pub optional: bool,
    /// A value the leaf is known to accept, used as its zero value.
    placeholder: Option<Value>,
}

impl KeyInfo {
    fn new(segments: Vec<String>, kind: KeyKind) -> Self {
        Self { segments, kind, optional: false, placeholder: None }
    }

    pub fn path(&self) -> String {
        self.segments.join(".")
    }

    /// Leaves outside of sequences can be set from the environment.
    pub fn is_bindable(&self) -> bool {
        self.kind != KeyKind::Struct && !self.segments.iter().any(|s| s == SEQ_ELEMENT)
    }

    pub fn placeholder(&self) -> Option<&Value> {
        self.placeholder.as_ref()
    }

    /// `database.max_open_conns` → `DATABASE_MAX_OPEN_CONNS` (or `APP_DATABASE_...`).
    pub fn env_var(&self, prefix: Option<&str>) -> String {
        let name = self.segments.join("_").to_uppercase();
        match prefix {
            Some(p) if !p.is_empty() => {
                format!("{}_{}", p.trim_end_matches('_').to_uppercase(), name)
            }
            _ => name,
        }
    }
}

/// Every key path a target type can decode, keyed by lower-cased dotted path.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: BTreeMap<String, KeyInfo>,
}

impl KeySet {
    pub fn of<T: DeserializeOwned>() -> Self {
        let state = RefCell::new(TraceState::default());

        for _ in 0..MAX_ROUNDS {
            state.borrow_mut().failed = None;
            let _ = T::deserialize(Tracer::root(&state));

            let mut st = state.borrow_mut();
            let Some(failure) = st.failed.take() else {
                break;
            };
            let attempts = st.attempts.entry(failure.path).or_insert(0);
            if *attempts >= MAX_ATTEMPTS {
                // Failing again after being dropped from its parent: nothing left to try.
                break;
            }
            *attempts = if failure.fatal { MAX_ATTEMPTS } else { *attempts + 1 };
        }

        let TraceState { mut keys, attempts, optional, mut placeholders, .. } = state.into_inner();
        for (key, info) in keys.iter_mut() {
            info.optional = optional.contains(key);
            let exhausted = attempts.get(key).is_some_and(|&n| n >= MAX_ATTEMPTS);
            info.placeholder = if exhausted { None } else { placeholders.remove(key) };
        }
        Self { keys }
    }

    pub fn get(&self, path: &str) -> Option<&KeyInfo> {
        self.keys.get(&path.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyInfo> {
        self.keys.values()
    }

    pub fn bindable(&self) -> impl Iterator<Item = &KeyInfo> {
        self.keys.values().filter(|info| info.is_bindable())
    }

    /// Kind of the elements of the sequence at `path`, if known.
    pub fn element_kind(&self, path: &str) -> Option<KeyKind> {
        self.get(&format!("{path}.{SEQ_ELEMENT}")).map(|info| info.kind)
    }

    pub fn env_var_names(&self, prefix: Option<&str>) -> Vec<String> {
        self.bindable().map(|info| info.env_var(prefix)).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Rename lower-cased document keys back to the spelling the target
    /// declares, so `#[serde(rename = "APP_NAME")]` matches `app_name:`, and
    /// bring scalars to the type their leaf expects (`port: "8080"`,
    /// `password: 123456`).
    pub(crate) fn canonicalize(&self, map: &mut Mapping) {
        let taken = std::mem::take(map);
        *map = self.canonical_mapping(taken, "");
    }

    fn canonical_mapping(&self, map: Mapping, prefix: &str) -> Mapping {
        map.into_iter()
            .map(|(key, value)| {
                let Value::String(name) = key else {
                    return (key, value);
                };
                let path =
                    if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
                let declared = self
                    .keys
                    .get(&path)
                    .and_then(|info| info.segments.last().cloned())
                    .unwrap_or(name);
                let value = self.canonical_value(value, &path);
                (Value::String(declared), value)
            })
            .collect()
    }

    fn canonical_value(&self, value: Value, path: &str) -> Value {
        match value {
            Value::Mapping(map) => Value::Mapping(self.canonical_mapping(map, path)),
            Value::Sequence(items) => {
                let element = format!("{path}.{SEQ_ELEMENT}");
                Value::Sequence(
                    items.into_iter().map(|item| self.canonical_value(item, &element)).collect(),
                )
            }
            Value::Tagged(mut tagged) => {
                tagged.value = self.canonical_value(tagged.value, path);
                Value::Tagged(tagged)
            }
            scalar => self.coerce(scalar, path),
        }
    }

    /// Weakly typed scalars: numbers and booleans become strings for string
    /// leaves, quoted numbers and booleans are parsed for typed leaves. Values
    /// that do not parse are left for decode to reject.
    fn coerce(&self, value: Value, path: &str) -> Value {
        let Some(kind) = self.keys.get(path).map(|info| info.kind) else {
            return value;
        };
        match (kind, value) {
            (KeyKind::Str, Value::Number(n)) => Value::String(n.to_string()),
            (KeyKind::Str, Value::Bool(b)) => Value::String(b.to_string()),
            (KeyKind::Int | KeyKind::Float | KeyKind::Bool, Value::String(raw)) => {
                convert(&raw, kind, None)
            }
            (_, value) => value,
        }
    }

    /// Give every absent, non-optional field of the struct at `parent` its
    /// zero value, recursing into nested structs.
    pub(crate) fn fill_missing(&self, root: &mut Mapping, parent: &[String]) {
        let children: Vec<&KeyInfo> = self
            .keys
            .values()
            .filter(|info| {
                info.segments.len() == parent.len() + 1
                    && info.segments.starts_with(parent)
                    && !info.optional
            })
            .collect();

        for info in children {
            let Some(map) = mapping_at_mut(root, parent) else {
                return;
            };
            let name = info.segments[parent.len()].as_str();
            if info.kind == KeyKind::Struct {
                if !map.contains_key(name) {
                    map.insert(Value::String(name.to_string()), Value::Mapping(Mapping::new()));
                }
                self.fill_missing(root, &info.segments);
            } else if !map.contains_key(name) {
                if let Some(zero) = &info.placeholder {
                    map.insert(Value::String(name.to_string()), zero.clone());
                }
            }
        }
    }
}

struct Failure {
    path: String,
    fatal: bool,
}

#[derive(Default)]
struct TraceState {
    keys: BTreeMap<String, KeyInfo>,
    attempts: HashMap<String, usize>,
    optional: HashSet<String>,
    /// Last candidate value handed out per path.
    placeholders: HashMap<String, Value>,
    failed: Option<Failure>,
}

#[derive(Debug, Error)]
enum TraceError {
    #[error("{0}")]
    Custom(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("candidate values exhausted")]
    Exhausted,
    #[error("type nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

impl de::Error for TraceError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        TraceError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        TraceError::MissingField(field)
    }
}

/// Note the innermost failing path so the next round can adjust it.
fn guarded<T>(
    state: &RefCell<TraceState>,
    path: String,
    result: Result<T, TraceError>,
) -> Result<T, TraceError> {
    if let Err(e) = &result {
        let mut st = state.borrow_mut();
        if st.failed.is_none() {
            let fatal = matches!(e, TraceError::MissingField(_) | TraceError::TooDeep);
            st.failed = Some(Failure { path, fatal });
        }
    }
    result
}

#[derive(Clone)]
struct Tracer<'s> {
    state: &'s RefCell<TraceState>,
    path: Vec<&'static str>,
    silent: bool,
}

impl<'s> Tracer<'s> {
    fn root(state: &'s RefCell<TraceState>) -> Self {
        Self { state, path: Vec::new(), silent: false }
    }

    fn child(&self, segment: &'static str) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self { state: self.state, path, silent: self.silent }
    }

    fn key(&self) -> String {
        self.path.join(".").to_lowercase()
    }

    fn record(&self, kind: KeyKind) {
        if self.silent || self.path.is_empty() {
            return;
        }
        let segments = self.path.iter().map(|s| s.to_string()).collect();
        self.state
            .borrow_mut()
            .keys
            .entry(self.key())
            .and_modify(|info| info.kind = kind)
            .or_insert_with(|| KeyInfo::new(segments, kind));
    }

    /// Remember the value about to be handed to the visitor.
    fn offer(&self, value: Value) {
        if self.silent || self.path.is_empty() {
            return;
        }
        self.state.borrow_mut().placeholders.insert(self.key(), value);
    }

    /// Register a field before descending, so it is known even if it fails.
    fn announce(&self, segment: &'static str) {
        if self.silent {
            return;
        }
        let child = self.child(segment);
        let segments = child.path.iter().map(|s| s.to_string()).collect();
        self.state
            .borrow_mut()
            .keys
            .entry(child.key())
            .or_insert_with(|| KeyInfo::new(segments, KeyKind::Any));
    }

    fn attempts_at(&self, key: &str) -> usize {
        self.state.borrow().attempts.get(key).copied().unwrap_or(0)
    }

    fn attempt(&self) -> usize {
        self.attempts_at(&self.key())
    }

    fn check_depth(&self) -> Result<(), TraceError> {
        if self.path.len() > MAX_DEPTH {
            Err(TraceError::TooDeep)
        } else {
            Ok(())
        }
    }
}

macro_rules! candidate_number {
    ($($method:ident => $visit:ident($ty:ty), $kind:expr;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
                self.record($kind);
                let n = match self.attempt() {
                    n @ (0 | 1) => n,
                    _ => return Err(TraceError::Exhausted),
                };
                self.offer(match $kind {
                    KeyKind::Float => Value::Number((n as f64).into()),
                    _ => Value::Number((n as u64).into()),
                });
                visitor.$visit(n as $ty)
            }
        )*
    };
}

impl<'de, 's> de::Deserializer<'de> for Tracer<'s> {
    type Error = TraceError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Any);
        match self.attempt() {
            0 => {
                self.offer(Value::Number(0.into()));
                visitor.visit_u64(0)
            }
            1 => {
                self.offer(Value::String(String::new()));
                visitor.visit_str("")
            }
            2 => {
                self.offer(Value::Null);
                visitor.visit_unit()
            }
            3 => {
                self.offer(Value::Bool(false));
                visitor.visit_bool(false)
            }
            4 => {
                self.offer(Value::Mapping(Mapping::new()));
                visitor.visit_map(EmptyMap)
            }
            5 => {
                self.offer(Value::Sequence(Vec::new()));
                visitor.visit_seq(Elements { template: self, remaining: 0 })
            }
            _ => Err(TraceError::Exhausted),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Bool);
        let value = match self.attempt() {
            0 => false,
            1 => true,
            _ => return Err(TraceError::Exhausted),
        };
        self.offer(Value::Bool(value));
        visitor.visit_bool(value)
    }

    candidate_number! {
        deserialize_i8 => visit_i8(i8), KeyKind::Int;
        deserialize_i16 => visit_i16(i16), KeyKind::Int;
        deserialize_i32 => visit_i32(i32), KeyKind::Int;
        deserialize_i64 => visit_i64(i64), KeyKind::Int;
        deserialize_i128 => visit_i128(i128), KeyKind::Int;
        deserialize_u8 => visit_u8(u8), KeyKind::Int;
        deserialize_u16 => visit_u16(u16), KeyKind::Int;
        deserialize_u32 => visit_u32(u32), KeyKind::Int;
        deserialize_u64 => visit_u64(u64), KeyKind::Int;
        deserialize_u128 => visit_u128(u128), KeyKind::Int;
        deserialize_f32 => visit_f32(f32), KeyKind::Float;
        deserialize_f64 => visit_f64(f64), KeyKind::Float;
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Str);
        let c = match self.attempt() {
            0 => 'a',
            1 => '0',
            _ => return Err(TraceError::Exhausted),
        };
        self.offer(Value::String(c.to_string()));
        visitor.visit_char(c)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Str);
        let Some(candidate) = STR_CANDIDATES.get(self.attempt()) else {
            return Err(TraceError::Exhausted);
        };
        self.offer(Value::String(candidate.to_string()));
        visitor.visit_str(candidate)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Any);
        match self.attempt() {
            0 => visitor.visit_bytes(&[]),
            _ => Err(TraceError::Exhausted),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.check_depth()?;
        if !self.silent && !self.path.is_empty() {
            self.state.borrow_mut().optional.insert(self.key());
        }
        // Descend on the first pass; if the inner type keeps failing, settle for None.
        if self.attempt() == 0 {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Unit);
        self.offer(Value::Null);
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.check_depth()?;
        self.record(KeyKind::Seq);
        self.offer(Value::Sequence(Vec::new()));
        let element = self.child(SEQ_ELEMENT);
        let remaining = usize::from(self.attempts_at(&element.key()) < MAX_ATTEMPTS);
        visitor.visit_seq(Elements { template: element, remaining })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        self.check_depth()?;
        self.record(KeyKind::Seq);
        let mut element = self.child(SEQ_ELEMENT);
        element.silent = true;
        visitor.visit_seq(Elements { template: element, remaining: len })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Map);
        self.offer(Value::Mapping(Mapping::new()));
        visitor.visit_map(EmptyMap)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        self.check_depth()?;
        self.record(KeyKind::Struct);
        for &field in fields {
            self.announce(field);
        }
        let live: Vec<&'static str> = fields
            .iter()
            .copied()
            .filter(|&field| self.attempts_at(&self.child(field).key()) < MAX_ATTEMPTS)
            .collect();
        visitor.visit_map(Fields { parent: self, fields: live.into_iter(), current: None })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        self.record(KeyKind::Enum);
        let Some(variant) = variants.get(self.attempt()).copied() else {
            return Err(TraceError::Exhausted);
        };
        self.offer(Value::String(variant.to_string()));
        let mut payload = self.clone();
        payload.silent = true;
        visitor.visit_enum(Variant { variant, payload })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        visitor.visit_str("")
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, TraceError> {
        visitor.visit_unit()
    }
}

struct Fields<'s> {
    parent: Tracer<'s>,
    fields: std::vec::IntoIter<&'static str>,
    current: Option<&'static str>,
}

impl<'de, 's> MapAccess<'de> for Fields<'s> {
    type Error = TraceError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, TraceError> {
        let Some(field) = self.fields.next() else {
            return Ok(None);
        };
        self.current = Some(field);
        let name: StrDeserializer<'static, TraceError> = field.into_deserializer();
        seed.deserialize(name).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, TraceError> {
        let field = self
            .current
            .take()
            .ok_or_else(|| TraceError::Custom("value requested before key".into()))?;
        let child = self.parent.child(field);
        let key = child.key();
        guarded(self.parent.state, key, seed.deserialize(child))
    }
}

struct Elements<'s> {
    template: Tracer<'s>,
    remaining: usize,
}

impl<'de, 's> SeqAccess<'de> for Elements<'s> {
    type Error = TraceError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, TraceError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let key = self.template.key();
        guarded(self.template.state, key, seed.deserialize(self.template.clone())).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct EmptyMap;

impl<'de> MapAccess<'de> for EmptyMap {
    type Error = TraceError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        _seed: K,
    ) -> Result<Option<K::Value>, TraceError> {
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        _seed: V,
    ) -> Result<V::Value, TraceError> {
        Err(TraceError::Custom("empty map has no values".into()))
    }
}

struct Variant<'s> {
    variant: &'static str,
    payload: Tracer<'s>,
}

impl<'de, 's> EnumAccess<'de> for Variant<'s> {
    type Error = TraceError;
    type Variant = Tracer<'s>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Tracer<'s>), TraceError> {
        let name: StrDeserializer<'static, TraceError> = self.variant.into_deserializer();
        let value = seed.deserialize(name)?;
        Ok((value, self.payload))
    }
}

impl<'de, 's> VariantAccess<'de> for Tracer<'s> {
    type Error = TraceError;

    fn unit_variant(self) -> Result<(), TraceError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, TraceError> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        de::Deserializer::deserialize_tuple(self, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, TraceError> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}
