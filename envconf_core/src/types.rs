use crate::pointer::Pointer;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

/// Describes what must be resolved for one configuration namespace.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// The caller-supplied request: which pointers must resolve to a value,
/// which services are discovered through DNS SRV records, and which
/// pointers may legitimately stay absent.
///
/// ## Usage
/// ```rust
/// use envconf_core::RequestSpec;
/// use serde_json::json;
///
/// let spec: RequestSpec = serde_json::from_value(json!({
///     "name": "TEST",
///     "keys": ["#/foo/uri"],
///     "services": [
///         {"name": "foo.service.consul", "key": "#/foo/uri", "formatter": "https"}
///     ]
/// }))
/// .unwrap();
/// assert_eq!(spec.required_pointers().len(), 1);
/// ```
///
/// ## Validation
/// - `name`: 1-255 characters, must not contain `/`
/// - every service descriptor must pass its own validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct RequestSpec {
    /// Namespace name; also the env var prefix and key-value store folder.
    #[validate(length(min = 1, max = 255), custom(function = "validate_namespace"))]
    pub name: String,

    /// Pointers that must resolve to a defined value.
    #[serde(default)]
    pub keys: Vec<Pointer>,

    /// DNS-discoverable dependencies.
    #[serde(default)]
    #[validate(nested)]
    pub services: Vec<ServiceDescriptor>,

    /// Pointers exempt from the must-resolve rule.
    #[serde(default)]
    pub optional: Vec<Pointer>,
}

impl RequestSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            services: Vec::new(),
            optional: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: Pointer) -> Self {
        self.keys.push(key);
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn with_optional(mut self, pointer: Pointer) -> Self {
        self.optional.push(pointer);
        self
    }

    pub fn is_optional(&self, pointer: &Pointer) -> bool {
        self.optional.contains(pointer)
    }

    /// Every pointer a static source may populate: requested keys followed by
    /// each service's `key`, `prefix` and `suffix`, without duplicates.
    pub fn requested_pointers(&self) -> Vec<&Pointer> {
        let service_pointers = self.services.iter().flat_map(|service| {
            std::iter::once(&service.key)
                .chain(service.prefix.as_ref())
                .chain(service.suffix.as_ref())
        });
        dedup(self.keys.iter().chain(service_pointers))
    }

    /// Pointers that must be defined once resolution completes: requested
    /// keys followed by service target keys, minus the optional set.
    pub fn required_pointers(&self) -> Vec<&Pointer> {
        let targets = self.services.iter().map(|service| &service.key);
        dedup(self.keys.iter().chain(targets))
            .into_iter()
            .filter(|pointer| !self.is_optional(pointer))
            .collect()
    }

    /// JSON schema describing a request specification document.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(RequestSpec)
    }
}

/// One DNS SRV discoverable dependency of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct ServiceDescriptor {
    /// SRV record name, e.g. `foo.service.consul`.
    #[validate(length(min = 1, max = 253))]
    pub name: String,

    /// Where the formatted endpoint is stored.
    pub key: Pointer,

    /// `bareName`, `http`, `https` or `mongodb`; anything else is `bareName`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<Pointer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<Pointer>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, key: Pointer) -> Self {
        Self {
            name: name.into(),
            key,
            formatter: None,
            prefix: None,
            suffix: None,
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: impl Into<String>) -> Self {
        self.formatter = Some(formatter.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: Pointer) -> Self {
        self.prefix = Some(prefix);
        self
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: Pointer) -> Self {
        self.suffix = Some(suffix);
        self
    }
}

/// A key/value pair returned by a key-value backend, value already decoded.
///
/// `value` is `None` for folder entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: Option<String>,
}

impl KvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

fn dedup<'a>(pointers: impl Iterator<Item = &'a Pointer>) -> Vec<&'a Pointer> {
    let mut seen = HashSet::new();
    pointers.filter(|pointer| seen.insert(*pointer)).collect()
}

fn validate_namespace(value: &str) -> Result<(), ValidationError> {
    if value.contains('/') || value.trim().is_empty() {
        return Err(ValidationError::new("Namespace must be non-blank and contain no '/'"));
    }
    Ok(())
}
