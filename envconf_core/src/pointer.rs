//! # Path Pointers
//!
//! A pointer addresses a location in a nested JSON document. The same
//! pointer is used to request a value, to write it while resolving, to read
//! it back from the store and to derive the environment variable that can
//! override it.
//!
//! Accepted forms are the URI-fragment form `#/foo/bar` and the plain form
//! `/foo/bar`. The empty string and `#` address the root. Segments use JSON
//! pointer escaping: `~0` for `~` and `~1` for `/`.

use errors::PointerError;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pointer {
    segments: Vec<String>,
}

impl Pointer {
    /// The pointer addressing the whole document.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, PointerError> {
        let body = input.strip_prefix('#').unwrap_or(input);
        if body.is_empty() {
            return Ok(Self::root());
        }

        let Some(rest) = body.strip_prefix('/') else {
            return Err(PointerError::InvalidSyntax {
                pointer: input.to_string(),
            });
        };

        let segments = rest
            .split('/')
            .map(|raw| {
                unescape(raw).ok_or_else(|| PointerError::InvalidEscape {
                    pointer: input.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a pointer from a key-value store key relative to a namespace,
    /// e.g. `foo/bar` becomes `#/foo/bar`.
    pub fn from_kv_key(relative: &str) -> Self {
        if relative.is_empty() {
            return Self::root();
        }
        Self::from_segments(relative.split('/'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new pointer with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Splits off the first segment, returning it with the remaining pointer.
    pub fn split_first(&self) -> Option<(&str, Pointer)> {
        let (first, rest) = self.segments.split_first()?;
        Some((first.as_str(), Self::from_segments(rest.iter().cloned())))
    }

    /// Reads the value at this pointer.
    ///
    /// Returns `None` only when a segment is absent. An explicit `null` or
    /// empty string is present and returned as such.
    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Writes `value` at this pointer, creating intermediate objects as
    /// needed. Siblings along the path are left untouched; a scalar in the
    /// way of the path is replaced by an object.
    pub fn set(&self, document: &mut Value, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            *document = value;
            return;
        };

        let mut current = document;
        for segment in parents {
            current = child_mut(current, segment);
        }

        if let Some(index) = array_index(current, last) {
            current[index] = value;
        } else {
            object_mut(current).insert(last.clone(), value);
        }
    }

    /// Derives the environment variable name for this pointer.
    ///
    /// Segments are joined with `_` and upper-cased; any character that is
    /// not ASCII alphanumeric becomes `_`. When a namespace is given it is
    /// normalized the same way and prepended.
    pub fn env_name(&self, namespace: Option<&str>) -> String {
        let path = self
            .segments
            .iter()
            .map(|segment| normalize_env_component(segment))
            .collect::<Vec<_>>()
            .join("_");

        match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) if path.is_empty() => normalize_env_component(ns),
            Some(ns) => format!("{}_{}", normalize_env_component(ns), path),
            None => path,
        }
    }
}

fn array_index(value: &Value, segment: &str) -> Option<usize> {
    match value {
        Value::Array(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
        _ => None,
    }
}

fn child_mut<'a>(current: &'a mut Value, segment: &str) -> &'a mut Value {
    if let Some(index) = array_index(current, segment) {
        return &mut current[index];
    }
    object_mut(current)
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn normalize_env_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pointer {
    type Error = PointerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pointer> for String {
    fn from(pointer: Pointer) -> Self {
        pointer.to_string()
    }
}

impl JsonSchema for Pointer {
    fn schema_name() -> Cow<'static, str> {
        "Pointer".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "pattern": "^#?(/.*)?$",
            "description": "Path pointer such as `#/database/uri`"
        })
    }
}
