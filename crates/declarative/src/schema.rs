//! Resource schema: identity key, properties, allowed values and defaults
//!
//! A [`ResourceDescriptor`] is built once at startup and describes the shape
//! of one resource kind. It owns a name → position lookup table so that
//! property access is a table lookup rather than per-property generated code.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Set of values a property accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedValues {
    /// Any value of the property's kind
    Any,
    /// One of a fixed list (order is preserved for display and filters)
    OneOf(Vec<String>),
}

impl AllowedValues {
    /// Check if a (normalized) value is accepted
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(values) => values.iter().any(|v| v == value),
        }
    }
}

/// Value kind, controls normalization before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text, compared verbatim
    Text,
    /// Boolean, canonicalized to `true` / `false`
    Boolean,
    /// Signed integer, canonicalized to its decimal form
    Integer,
    /// Sensitive text, passed through the provider's transform and never displayed
    Secret,
}

/// Value specification for one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: String,
    pub kind: ValueKind,
    pub allowed: AllowedValues,
    pub default: Option<String>,
    pub mutable: bool,
}

impl PropertySpec {
    fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            allowed: AllowedValues::Any,
            default: None,
            mutable: true,
        }
    }

    /// A free text property
    pub fn text(name: &str) -> Self {
        Self::new(name, ValueKind::Text)
    }

    /// A boolean property
    pub fn boolean(name: &str) -> Self {
        Self::new(name, ValueKind::Boolean)
    }

    /// An integer property
    pub fn integer(name: &str) -> Self {
        Self::new(name, ValueKind::Integer)
    }

    /// A secret property
    pub fn secret(name: &str) -> Self {
        Self::new(name, ValueKind::Secret)
    }

    /// Restrict the property to a fixed set of values
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = AllowedValues::OneOf(values.iter().map(|v| (*v).to_string()).collect());
        self
    }

    /// Declare a default used when a desired entry omits the property
    pub fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    /// Mark the property as fixed once the instance exists
    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }

    pub fn is_secret(&self) -> bool {
        self.kind == ValueKind::Secret
    }

    /// Normalize and validate a desired value
    ///
    /// Fails with a validation error if the value does not parse as the
    /// property's kind or falls outside its allowed set.
    pub fn normalize(&self, value: &str) -> Result<String> {
        let normalized = match self.kind {
            ValueKind::Text | ValueKind::Secret => value.to_string(),
            ValueKind::Boolean => parse_bool(value)
                .map(|b| b.to_string())
                .ok_or_else(|| {
                    Error::validation(format!(
                        "property '{}' expects a boolean, got '{}'",
                        self.name, value
                    ))
                })?,
            ValueKind::Integer => value
                .trim()
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|_| {
                    Error::validation(format!(
                        "property '{}' expects an integer, got '{}'",
                        self.name, value
                    ))
                })?,
        };

        if let AllowedValues::OneOf(values) = &self.allowed
            && !self.allowed.accepts(&normalized)
        {
            return Err(Error::validation(format!(
                "property '{}' must be one of [{}], got '{}'",
                self.name,
                values.join(", "),
                value
            )));
        }

        Ok(normalized)
    }

    /// Normalize an observed value
    ///
    /// Observed values are not held to the allowed set; values that fail to
    /// parse as the property's kind are kept verbatim so they show up as drift.
    pub fn normalize_observed(&self, value: &str) -> String {
        match self.kind {
            ValueKind::Boolean => parse_bool(value)
                .map(|b| b.to_string())
                .unwrap_or_else(|| value.to_string()),
            ValueKind::Integer => value
                .trim()
                .parse::<i64>()
                .map(|n| n.to_string())
                .unwrap_or_else(|_| value.to_string()),
            ValueKind::Text | ValueKind::Secret => value.to_string(),
        }
    }

    /// Render a value for display, hiding secrets
    pub fn display_value<'a>(&self, value: &'a str) -> &'a str {
        if self.is_secret() { "[redacted]" } else { value }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Schema of one manageable resource kind
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    kind: String,
    identity_key: String,
    properties: Vec<PropertySpec>,
    accessors: HashMap<String, usize>,
}

impl ResourceDescriptor {
    /// Build a descriptor, checking its invariants
    ///
    /// The identity key must not also be a property, property names must be
    /// unique and every declared default must be valid for its property.
    pub fn new(kind: &str, identity_key: &str, properties: Vec<PropertySpec>) -> Result<Self> {
        if identity_key.is_empty() {
            return Err(Error::validation(format!(
                "resource kind '{kind}' has no identity key"
            )));
        }

        let mut accessors = HashMap::with_capacity(properties.len());
        for (position, spec) in properties.iter().enumerate() {
            if spec.name == identity_key {
                return Err(Error::validation(format!(
                    "identity key '{identity_key}' of '{kind}' cannot be a property"
                )));
            }
            if accessors.insert(spec.name.clone(), position).is_some() {
                return Err(Error::validation(format!(
                    "property '{}' declared twice on '{kind}'",
                    spec.name
                )));
            }
            if let Some(default) = &spec.default {
                spec.normalize(default)?;
            }
        }

        Ok(Self {
            kind: kind.to_string(),
            identity_key: identity_key.to_string(),
            properties,
            accessors,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// Properties in declaration order
    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.accessors.get(name).map(|&i| &self.properties[i])
    }

    /// Look up a property, failing with a validation error if unknown
    pub fn require(&self, name: &str) -> Result<&PropertySpec> {
        self.property(name).ok_or_else(|| {
            Error::validation(format!(
                "unknown property '{}' for {} (known: {})",
                name,
                self.kind,
                self.property_names().join(", ")
            ))
        })
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }

    /// Allowed values of a property, if it is restricted
    pub fn allowed_values(&self, name: &str) -> Option<&[String]> {
        match self.property(name).map(|p| &p.allowed) {
            Some(AllowedValues::OneOf(values)) => Some(values),
            _ => None,
        }
    }
}
