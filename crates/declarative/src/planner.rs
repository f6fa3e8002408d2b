//! Execution planner - decides what each desired entry needs
//!
//! Planning is pure: it compares every cache entry against its desired
//! state and produces an [`Action`] without issuing any command. Validation
//! errors are detected here, before anything touches the managed system.

use crate::cache::{Cache, CacheEntry, MatchState};
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::record::DesiredEntry;
use crate::types::{Attributes, Ensure};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

const REDACTED: &str = "[redacted]";

/// A single attribute-level difference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub property: String,
    /// Observed value (`None` if the property is not set)
    pub from: Option<String>,
    /// Desired value
    pub to: String,
    /// Values must not be displayed
    pub secret: bool,
}

impl Serialize for Change {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Change", 3)?;
        state.serialize_field("property", &self.property)?;
        if self.secret {
            state.serialize_field("from", &self.from.as_ref().map(|_| REDACTED))?;
            state.serialize_field("to", REDACTED)?;
        } else {
            state.serialize_field("from", &self.from)?;
            state.serialize_field("to", &self.to)?;
        }
        state.end()
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            return write!(f, "{}: {}", self.property, REDACTED);
        }
        match &self.from {
            Some(from) => write!(f, "{}: {} → {}", self.property, from, self.to),
            None => write!(f, "{}: (unset) → {}", self.property, self.to),
        }
    }
}

/// What reconciliation must do for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    /// Already converged
    NoOp,
    /// Instantiate with these resolved attributes
    Create { attributes: Attributes },
    /// Modify only the differing attributes
    Update { changes: Vec<Change> },
    /// Remove the instance
    Delete,
    /// The entry failed validation; nothing will be issued for it
    Rejected { reason: String },
}

impl Action {
    /// Whether this action issues a write
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Update { .. } | Self::Delete)
    }
}

/// Planned action for one entry
#[derive(Debug, Clone, Serialize)]
pub struct PlannedChange {
    pub name: String,
    pub state: MatchState,
    pub action: Action,
}

/// Plan for one reconciliation run, in catalog order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Plan every entry of the cache
    ///
    /// Entries that fail validation become [`Action::Rejected`]; they never
    /// prevent other entries from being planned.
    pub fn build<P: Provider + ?Sized>(provider: &P, cache: &Cache) -> Self {
        let changes = cache
            .entries()
            .iter()
            .map(|entry| match plan_entry(provider, entry) {
                Ok(change) => change,
                Err(e) => {
                    log::warn!("{} '{}' rejected: {}", cache.kind(), entry.name(), e);
                    PlannedChange {
                        name: entry.name().to_string(),
                        state: if entry.exists() {
                            MatchState::OutOfSync
                        } else {
                            MatchState::Unmatched
                        },
                        action: Action::Rejected {
                            reason: e.to_string(),
                        },
                    }
                }
            })
            .collect();

        Self { changes }
    }

    /// Filter plan to only include entries whose name contains `target`
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => Self {
                changes: self
                    .changes
                    .into_iter()
                    .filter(|c| c.name.contains(t))
                    .collect(),
            },
        }
    }

    /// Entries that issue a write
    pub fn writes(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action.is_write())
    }

    /// Number of entries that issue a write
    pub fn total_writes(&self) -> usize {
        self.writes().count()
    }

    /// Entries rejected by validation
    pub fn rejected(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes
            .iter()
            .filter(|c| matches!(c.action, Action::Rejected { .. }))
    }

    /// Whether nothing remains to be done (no writes, no rejections)
    pub fn is_converged(&self) -> bool {
        self.changes
            .iter()
            .all(|c| matches!(c.action, Action::NoOp))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Resolve a desired entry into the full attribute set to converge to
///
/// Explicitly set properties are validated and normalized; omitted
/// properties fall back to their declared default, and properties with
/// neither are left unmanaged. Secret values go through the provider's
/// transform.
pub fn resolve_desired<P: Provider + ?Sized>(
    provider: &P,
    entry: &DesiredEntry,
) -> Result<Attributes> {
    let descriptor = provider.descriptor();

    if entry.name.trim().is_empty() {
        return Err(Error::validation(format!(
            "{} entry is missing its identity key '{}'",
            descriptor.kind(),
            descriptor.identity_key()
        )));
    }

    for property in entry.attributes.keys() {
        descriptor.require(property)?;
    }

    let mut resolved = Attributes::new();
    for spec in descriptor.properties() {
        let raw = match (entry.attributes.get(&spec.name), &spec.default) {
            (Some(value), _) => value,
            (None, Some(default)) => default,
            (None, None) => continue,
        };

        let mut value = spec.normalize(raw)?;
        if spec.is_secret() {
            value = provider.transform(spec, &value)?;
        }
        resolved.insert(spec.name.clone(), value);
    }

    Ok(resolved)
}

/// Decide the action for one cache entry
pub fn plan_entry<P: Provider + ?Sized>(provider: &P, entry: &CacheEntry) -> Result<PlannedChange> {
    let descriptor = provider.descriptor();
    let desired = resolve_desired(provider, &entry.desired)?;
    let name = entry.name().to_string();

    let (state, action) = match (entry.desired.ensure, entry.current()) {
        (Ensure::Present, None) => (
            MatchState::Unmatched,
            Action::Create {
                attributes: desired,
            },
        ),
        (Ensure::Absent, None) => (MatchState::Unmatched, Action::NoOp),
        (Ensure::Absent, Some(_)) => (MatchState::OutOfSync, Action::Delete),
        (Ensure::Present, Some(current)) => {
            let mut changes = Vec::new();
            for (property, want) in &desired {
                let have = current.attributes.get(property);
                if have == Some(want) {
                    continue;
                }

                let spec = descriptor.require(property)?;
                if !spec.mutable {
                    return Err(Error::validation(format!(
                        "property '{}' of {} '{}' cannot change from '{}' to '{}'",
                        property,
                        descriptor.kind(),
                        name,
                        have.map_or("(unset)", |h| spec.display_value(h)),
                        spec.display_value(want)
                    )));
                }

                changes.push(Change {
                    property: property.clone(),
                    from: have.cloned(),
                    to: want.clone(),
                    secret: spec.is_secret(),
                });
            }

            if changes.is_empty() {
                (MatchState::InSync, Action::NoOp)
            } else {
                (MatchState::OutOfSync, Action::Update { changes })
            }
        }
    };

    Ok(PlannedChange {
        name,
        state,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ActualRecord;
    use crate::schema::{PropertySpec, ResourceDescriptor};

    struct Widgets {
        descriptor: ResourceDescriptor,
    }

    impl Widgets {
        fn new() -> Self {
            Self {
                descriptor: ResourceDescriptor::new(
                    "widget",
                    "name",
                    vec![
                        PropertySpec::text("shape")
                            .one_of(&["round", "square"])
                            .with_default("round")
                            .immutable(),
                        PropertySpec::text("color"),
                        PropertySpec::boolean("enabled").with_default("false"),
                        PropertySpec::secret("token"),
                    ],
                )
                .unwrap(),
            }
        }
    }

    impl Provider for Widgets {
        fn descriptor(&self) -> &ResourceDescriptor {
            &self.descriptor
        }

        fn discover(&self) -> Result<Vec<ActualRecord>> {
            Ok(vec![])
        }

        fn transform(&self, _property: &crate::schema::PropertySpec, value: &str) -> Result<String> {
            Ok(format!("{{REV}}{}", value.chars().rev().collect::<String>()))
        }

        fn create(&self, _name: &str, _attributes: &Attributes) -> Result<()> {
            Ok(())
        }

        fn update(&self, _current: &ActualRecord, _changes: &[Change]) -> Result<()> {
            Ok(())
        }

        fn delete(&self, _current: &ActualRecord) -> Result<()> {
            Ok(())
        }
    }

    fn entry(desired: DesiredEntry, actual: Option<ActualRecord>) -> CacheEntry {
        CacheEntry { desired, actual }
    }

    #[test]
    fn test_resolve_applies_defaults_and_transform() {
        let p = Widgets::new();
        let resolved = resolve_desired(
            &p,
            &DesiredEntry::present("w").with("enabled", "YES").with("token", "abc"),
        )
        .unwrap();

        assert_eq!(resolved["shape"], "round");
        assert_eq!(resolved["enabled"], "true");
        assert_eq!(resolved["token"], "{REV}cba");
        assert!(!resolved.contains_key("color"));
    }

    #[test]
    fn test_resolve_rejects_unknown_property() {
        let p = Widgets::new();
        let err = resolve_desired(&p, &DesiredEntry::present("w").with("weight", "3")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_resolve_rejects_value_outside_allowed_set() {
        let p = Widgets::new();
        let err =
            resolve_desired(&p, &DesiredEntry::present("w").with("shape", "oval")).unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn test_unmatched_present_creates() {
        let p = Widgets::new();
        let planned = plan_entry(&p, &entry(DesiredEntry::present("w"), None)).unwrap();
        assert_eq!(planned.state, MatchState::Unmatched);
        assert!(matches!(planned.action, Action::Create { .. }));
    }

    #[test]
    fn test_default_compares_equal_to_observed() {
        let p = Widgets::new();
        let actual = ActualRecord::present("w")
            .with("shape", "round")
            .with("enabled", "false");
        let planned =
            plan_entry(&p, &entry(DesiredEntry::present("w"), Some(actual))).unwrap();
        assert_eq!(planned.state, MatchState::InSync);
        assert_eq!(planned.action, Action::NoOp);
    }

    #[test]
    fn test_only_differing_attributes_updated() {
        let p = Widgets::new();
        let actual = ActualRecord::present("w")
            .with("shape", "round")
            .with("enabled", "false")
            .with("color", "red");
        let desired = DesiredEntry::present("w").with("color", "blue");

        let planned = plan_entry(&p, &entry(desired, Some(actual))).unwrap();
        assert_eq!(
            planned.action,
            Action::Update {
                changes: vec![Change {
                    property: "color".into(),
                    from: Some("red".into()),
                    to: "blue".into(),
                    secret: false,
                }]
            }
        );
    }

    #[test]
    fn test_missing_observed_property_is_a_change() {
        let p = Widgets::new();
        let actual = ActualRecord::present("w").with("shape", "round");
        let planned =
            plan_entry(&p, &entry(DesiredEntry::present("w"), Some(actual))).unwrap();
        match planned.action {
            Action::Update { changes } => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].property, "enabled");
                assert_eq!(changes[0].from, None);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_immutable_change_rejected() {
        let p = Widgets::new();
        let actual = ActualRecord::present("w")
            .with("shape", "round")
            .with("enabled", "false");
        let desired = DesiredEntry::present("w").with("shape", "square");
        let err = plan_entry(&p, &entry(desired, Some(actual))).unwrap_err();
        assert!(err.to_string().contains("cannot change"));
    }

    #[test]
    fn test_absent_transitions() {
        let p = Widgets::new();
        let planned = plan_entry(
            &p,
            &entry(DesiredEntry::absent("w"), Some(ActualRecord::present("w"))),
        )
        .unwrap();
        assert_eq!(planned.action, Action::Delete);

        let planned = plan_entry(&p, &entry(DesiredEntry::absent("w"), None)).unwrap();
        assert_eq!(planned.action, Action::NoOp);
    }

    #[test]
    fn test_secret_change_is_redacted() {
        let change = Change {
            property: "token".into(),
            from: Some("old".into()),
            to: "new".into(),
            secret: true,
        };
        assert_eq!(change.to_string(), "token: [redacted]");
    }

    #[test]
    fn test_build_rejects_without_blocking_others() {
        let p = Widgets::new();
        let cache = Cache::build(
            "widget",
            vec![
                DesiredEntry::present("bad").with("shape", "oval"),
                DesiredEntry::present("good"),
            ],
            vec![],
        )
        .unwrap();

        let plan = ExecutionPlan::build(&p, &cache);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.rejected().count(), 1);
        assert_eq!(plan.total_writes(), 1);
        assert!(!plan.is_converged());
    }

    #[test]
    fn test_filter_by_target() {
        let plan = ExecutionPlan {
            changes: vec![
                PlannedChange {
                    name: "dc=example,dc=com".into(),
                    state: MatchState::Unmatched,
                    action: Action::NoOp,
                },
                PlannedChange {
                    name: "dc=other,dc=org".into(),
                    state: MatchState::Unmatched,
                    action: Action::NoOp,
                },
            ],
        };
        let filtered = plan.filter_by_target(Some("example"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.changes[0].name, "dc=example,dc=com");
    }
}
