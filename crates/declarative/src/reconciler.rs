//! Per-entry convergence and the run-scoped reconciler
//!
//! [`converge`] performs the write for one planned action and records the
//! outcome back into the cache entry. [`Reconciler`] ties one provider to
//! one prefetched cache for the duration of a run.

use crate::cache::{Cache, CacheEntry, prefetch};
use crate::error::{Error, Result};
use crate::planner::{Action, ExecutionPlan};
use crate::provider::Provider;
use crate::record::{ActualRecord, DesiredEntry};
use crate::types::{ApplyResult, Ensure};

/// Perform the write for `action` and update the cache entry on success
///
/// The cache entry is left untouched when the write fails, so `exists`
/// keeps reporting what the managed system last confirmed.
pub fn converge<P: Provider + ?Sized>(
    provider: &P,
    entry: &mut CacheEntry,
    action: &Action,
) -> Result<ApplyResult> {
    let kind = provider.descriptor().kind().to_string();

    match action {
        Action::NoOp => Ok(ApplyResult::NoChange),
        Action::Rejected { reason } => Err(Error::validation(reason.clone())),
        Action::Create { attributes } => {
            log::info!("Creating {} '{}'", kind, entry.name());
            provider.create(entry.name(), attributes)?;

            // Server-assigned addressing data is unknown until the next discovery
            entry.actual = Some(ActualRecord {
                name: entry.name().to_string(),
                ensure: Ensure::Present,
                attributes: attributes.clone(),
                handle: None,
            });
            Ok(ApplyResult::Created)
        }
        Action::Update { changes } => {
            let current = entry.current().cloned().ok_or_else(|| {
                Error::Other(format!(
                    "{} '{}' has no current record to update",
                    kind,
                    entry.name()
                ))
            })?;
            log::info!(
                "Updating {} '{}' ({} attribute(s))",
                kind,
                entry.name(),
                changes.len()
            );
            provider.update(&current, changes)?;

            if let Some(actual) = entry.actual.as_mut() {
                for change in changes {
                    actual
                        .attributes
                        .insert(change.property.clone(), change.to.clone());
                }
            }
            Ok(ApplyResult::Modified)
        }
        Action::Delete => {
            let current = entry.current().cloned().ok_or_else(|| {
                Error::Other(format!(
                    "{} '{}' has no current record to delete",
                    kind,
                    entry.name()
                ))
            })?;
            log::info!("Deleting {} '{}'", kind, entry.name());
            provider.delete(&current)?;

            if let Some(actual) = entry.actual.as_mut() {
                actual.ensure = Ensure::Absent;
            }
            Ok(ApplyResult::Removed)
        }
    }
}

/// Turn the outcome of [`converge`] into a reportable result
pub fn into_apply_result(outcome: Result<ApplyResult>) -> ApplyResult {
    match outcome {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            payload: e.payload().map(str::to_string),
            error: e.to_string(),
        },
    }
}

/// One provider bound to one prefetched cache
///
/// A reconciler is created per run and must not be reused: the cache it
/// owns reflects a single discovery pass plus the writes made since.
pub struct Reconciler<'a, P: Provider + ?Sized> {
    provider: &'a P,
    cache: Cache,
}

impl<'a, P: Provider + ?Sized> Reconciler<'a, P> {
    /// Discover once and bind the desired entries
    pub fn prefetch(provider: &'a P, desired: Vec<DesiredEntry>) -> Result<Self> {
        let cache = prefetch(provider, desired)?;
        Ok(Self { provider, cache })
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Whether the named instance currently exists, including this run's writes
    pub fn exists(&self, name: &str) -> bool {
        self.cache.exists(name)
    }

    /// Plan every entry against the current cache
    pub fn plan(&self) -> ExecutionPlan {
        ExecutionPlan::build(self.provider, &self.cache)
    }

    /// Converge a single entry by name
    pub fn reconcile_one(&mut self, name: &str) -> Result<ApplyResult> {
        let entry = self
            .cache
            .get(name)
            .ok_or_else(|| Error::validation(format!("'{name}' is not in the catalog")))?;
        let planned = crate::planner::plan_entry(self.provider, entry)?;

        let entry = self
            .cache
            .get_mut(name)
            .ok_or_else(|| Error::validation(format!("'{name}' is not in the catalog")))?;
        converge(self.provider, entry, &planned.action)
    }
}
