//! Desired entries and discovered records

use crate::types::{Attributes, Ensure};
use serde::{Deserialize, Serialize};

/// One resource instance as declared in the catalog
///
/// Only explicitly set properties appear in `attributes`; unset properties
/// fall back to the descriptor's defaults at plan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredEntry {
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub attributes: Attributes,
}

impl DesiredEntry {
    /// An entry that should exist
    pub fn present(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ensure: Ensure::Present,
            attributes: Attributes::new(),
        }
    }

    /// An entry that should not exist
    pub fn absent(name: &str) -> Self {
        Self {
            ensure: Ensure::Absent,
            ..Self::present(name)
        }
    }

    /// Set a property
    pub fn with(mut self, property: &str, value: &str) -> Self {
        self.attributes
            .insert(property.to_string(), value.to_string());
        self
    }
}

/// One resource instance as observed on the managed system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualRecord {
    pub name: String,
    pub ensure: Ensure,
    pub attributes: Attributes,
    /// Provider-private addressing data (e.g. a server-assigned ordinal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl ActualRecord {
    /// A discovered record
    pub fn present(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ensure: Ensure::Present,
            attributes: Attributes::new(),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.handle = Some(handle.to_string());
        self
    }

    /// Set a property
    pub fn with(mut self, property: &str, value: &str) -> Self {
        self.attributes
            .insert(property.to_string(), value.to_string());
        self
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.attributes.get(property).map(String::as_str)
    }
}
