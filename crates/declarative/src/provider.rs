//! Provider trait for one resource kind
//!
//! A provider knows how to read every instance of its kind from the managed
//! system and how to build and issue the write commands that create, modify
//! or remove a single instance. Deciding *which* write is needed belongs to
//! the planner; the provider only performs it.

use crate::error::Result;
use crate::planner::Change;
use crate::record::ActualRecord;
use crate::schema::{PropertySpec, ResourceDescriptor};
use crate::types::Attributes;

/// Discovery and write access for one resource kind
///
/// # Example
///
/// ```ignore
/// use declarative::{ActualRecord, Attributes, Change, Provider, ResourceDescriptor, Result};
///
/// struct Files { descriptor: ResourceDescriptor }
///
/// impl Provider for Files {
///     fn descriptor(&self) -> &ResourceDescriptor { &self.descriptor }
///
///     fn discover(&self) -> Result<Vec<ActualRecord>> {
///         // one bulk query for every instance
///         Ok(vec![])
///     }
///
///     fn create(&self, name: &str, attributes: &Attributes) -> Result<()> { Ok(()) }
///     fn update(&self, current: &ActualRecord, changes: &[Change]) -> Result<()> { Ok(()) }
///     fn delete(&self, current: &ActualRecord) -> Result<()> { Ok(()) }
/// }
/// ```
pub trait Provider: Send + Sync {
    /// Schema of the managed kind
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Read every instance of the kind from the managed system
    ///
    /// Called exactly once per run. Must fail with a discovery error if the
    /// query fails or its output cannot be parsed, and with an ambiguous
    /// state error if two instances share an identity key.
    fn discover(&self) -> Result<Vec<ActualRecord>>;

    /// Canonicalize a desired secret value into the form the managed system stores
    ///
    /// Must be deterministic so that an unchanged desired value compares
    /// equal to the value stored by a previous run.
    fn transform(&self, _property: &PropertySpec, value: &str) -> Result<String> {
        Ok(value.to_string())
    }

    /// Instantiate a resource with fully resolved attributes
    fn create(&self, name: &str, attributes: &Attributes) -> Result<()>;

    /// Modify only the given attributes of an existing instance
    fn update(&self, current: &ActualRecord, changes: &[Change]) -> Result<()>;

    /// Remove an existing instance
    fn delete(&self, current: &ActualRecord) -> Result<()>;

    /// Human-readable description of an instance
    fn describe(&self, name: &str) -> String {
        format!("{} {}", self.descriptor().kind(), name)
    }
}
