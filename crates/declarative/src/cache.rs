//! Prefetch cache: desired entries joined to discovered records
//!
//! The cache is built from exactly one discovery pass and lives for one run.
//! Writes performed during the run are recorded back into it so that
//! `exists` and re-planning observe convergence without querying the
//! managed system again.

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::record::{ActualRecord, DesiredEntry};
use serde::Serialize;
use std::collections::HashMap;

/// Where a desired entry stands relative to the managed system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchState {
    /// No instance with this identity exists
    Unmatched,
    /// An instance exists and satisfies the desired entry
    InSync,
    /// An instance exists but differs from the desired entry
    OutOfSync,
}

/// A desired entry bound to its discovered record, if any
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub desired: DesiredEntry,
    /// Current view of the instance; updated after each successful write
    pub actual: Option<ActualRecord>,
}

impl CacheEntry {
    pub fn name(&self) -> &str {
        &self.desired.name
    }

    /// Whether the instance currently exists, including writes made this run
    pub fn exists(&self) -> bool {
        self.actual
            .as_ref()
            .is_some_and(|a| a.ensure.is_present())
    }

    /// The bound record, if it currently exists
    pub fn current(&self) -> Option<&ActualRecord> {
        self.actual.as_ref().filter(|a| a.ensure.is_present())
    }
}

/// Per-run cache built by [`prefetch`]
#[derive(Debug, Clone, Serialize)]
pub struct Cache {
    kind: String,
    entries: Vec<CacheEntry>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
    unmanaged: Vec<ActualRecord>,
}

impl Cache {
    /// Join desired entries with discovered records by identity key
    ///
    /// Fails if two discovered records share an identity key, or if the
    /// desired set names the same instance twice.
    pub fn build(
        kind: &str,
        desired: Vec<DesiredEntry>,
        discovered: Vec<ActualRecord>,
    ) -> Result<Self> {
        ensure_unique(kind, &discovered)?;

        let mut positions = HashMap::with_capacity(desired.len());
        for (position, entry) in desired.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(Error::validation(format!(
                    "{kind} entry #{} has no identity key",
                    position + 1
                )));
            }
            if positions.insert(entry.name.clone(), position).is_some() {
                return Err(Error::validation(format!(
                    "{kind} '{}' is declared more than once",
                    entry.name
                )));
            }
        }

        let mut by_name: HashMap<String, ActualRecord> = HashMap::new();
        let mut unmanaged = Vec::new();
        for record in discovered {
            if positions.contains_key(&record.name) {
                by_name.insert(record.name.clone(), record);
            } else {
                unmanaged.push(record);
            }
        }

        let entries = desired
            .into_iter()
            .map(|desired| {
                let actual = by_name.remove(&desired.name);
                CacheEntry { desired, actual }
            })
            .collect();

        Ok(Self {
            kind: kind.to_string(),
            entries,
            positions,
            unmanaged,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Look up an entry by identity key
    pub fn get(&self, name: &str) -> Option<&CacheEntry> {
        self.positions.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CacheEntry> {
        self.positions.get(name).map(|&i| &mut self.entries[i])
    }

    /// Whether the named instance currently exists
    ///
    /// Reflects writes made earlier in the same run.
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some_and(CacheEntry::exists)
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [CacheEntry] {
        &mut self.entries
    }

    /// Discovered instances the catalog does not mention (never acted on)
    pub fn unmanaged(&self) -> &[ActualRecord] {
        &self.unmanaged
    }

    /// Unmatched entries whose key equals an unmanaged record's key
    /// ignoring ASCII case, as `(desired, discovered)` pairs
    pub fn case_collisions(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter(|entry| entry.actual.is_none())
            .filter_map(|entry| {
                self.unmanaged
                    .iter()
                    .find(|record| record.name.eq_ignore_ascii_case(entry.name()))
                    .map(|record| (entry.name(), record.name.as_str()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fail with [`Error::AmbiguousState`] if two records share an identity key
pub fn ensure_unique(kind: &str, records: &[ActualRecord]) -> Result<()> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.name.as_str()).or_default() += 1;
    }

    // Report the first duplicate in discovery order
    for record in records {
        let count = counts[record.name.as_str()];
        if count > 1 {
            return Err(Error::AmbiguousState {
                kind: kind.to_string(),
                name: record.name.clone(),
                count,
            });
        }
    }

    Ok(())
}

/// Discover once and join the result with the desired entries
pub fn prefetch<P: Provider + ?Sized>(provider: &P, desired: Vec<DesiredEntry>) -> Result<Cache> {
    let kind = provider.descriptor().kind().to_string();
    let discovered = provider.discover()?;
    log::debug!(
        "Discovered {} {} instance(s) for {} desired entr{}",
        discovered.len(),
        kind,
        desired.len(),
        if desired.len() == 1 { "y" } else { "ies" }
    );

    let cache = Cache::build(&kind, desired, discovered)?;
    for entry in cache.entries() {
        log::trace!(
            "{} '{}': {}",
            kind,
            entry.name(),
            if entry.actual.is_some() { "matched" } else { "unmatched" }
        );
    }
    for (desired, discovered) in cache.case_collisions() {
        log::warn!(
            "{kind} '{desired}' is not declared but '{discovered}' exists; keys match exactly, so it will be planned as new"
        );
    }
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_binds_by_name() {
        let cache = Cache::build(
            "db",
            vec![DesiredEntry::present("a"), DesiredEntry::present("c")],
            vec![ActualRecord::present("a"), ActualRecord::present("b")],
        )
        .unwrap();

        assert!(cache.get("a").unwrap().actual.is_some());
        assert!(cache.get("c").unwrap().actual.is_none());
        assert!(cache.exists("a"));
        assert!(!cache.exists("c"));
        assert!(!cache.exists("b"));
        assert_eq!(cache.unmanaged().len(), 1);
        assert_eq!(cache.unmanaged()[0].name, "b");
    }

    #[test]
    fn test_duplicate_discovered_is_ambiguous() {
        let result = Cache::build(
            "db",
            vec![DesiredEntry::present("a")],
            vec![
                ActualRecord::present("x"),
                ActualRecord::present("a"),
                ActualRecord::present("a"),
            ],
        );

        match result {
            Err(Error::AmbiguousState { name, count, .. }) => {
                assert_eq!(name, "a");
                assert_eq!(count, 2);
            }
            other => panic!("expected ambiguous state, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_unmanaged_is_still_ambiguous() {
        let result = Cache::build(
            "db",
            vec![],
            vec![ActualRecord::present("b"), ActualRecord::present("b")],
        );
        assert!(matches!(result, Err(Error::AmbiguousState { .. })));
    }

    #[test]
    fn test_duplicate_desired_rejected() {
        let result = Cache::build(
            "db",
            vec![DesiredEntry::present("a"), DesiredEntry::absent("a")],
            vec![],
        );
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_missing_identity_rejected() {
        let result = Cache::build("db", vec![DesiredEntry::present("  ")], vec![]);
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_catalog_order_preserved() {
        let cache = Cache::build(
            "db",
            vec![
                DesiredEntry::present("z"),
                DesiredEntry::present("a"),
                DesiredEntry::present("m"),
            ],
            vec![],
        )
        .unwrap();
        let names: Vec<_> = cache.entries().iter().map(CacheEntry::name).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_case_collision_reported_but_not_bound() {
        let cache = Cache::build(
            "db",
            vec![
                DesiredEntry::present("dc=Example,dc=com"),
                DesiredEntry::present("dc=other"),
            ],
            vec![ActualRecord::present("dc=example,dc=com")],
        )
        .unwrap();

        assert!(!cache.exists("dc=Example,dc=com"));
        assert_eq!(
            cache.case_collisions(),
            vec![("dc=Example,dc=com", "dc=example,dc=com")]
        );
    }
}
