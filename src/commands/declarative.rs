//! Declarative commands for slapdconf
//!
//! - `status` - Show each database's state against the catalog
//! - `diff` - Preview what apply would change
//! - `apply` - Make the server's databases match the catalog
//!
//! Every command performs exactly one discovery pass.

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{
    Action, ActualRecord, Cache, Change, Ensure, ExecuteOptions, ExecutionPlan, MatchState,
    Provider, prefetch,
};
use ldapkit::DatabaseProvider;
use ldapkit::password;
use serde::Serialize;

use crate::Context;
use crate::engine::{self, ApplyOptions, differ};
use crate::paths;
use crate::progress;
use crate::runner;
use crate::schema::SlapdConfig;
use crate::ui;

// ============================================================================
// Session
// ============================================================================

/// A loaded catalog plus the provider configured from it
pub struct Session {
    pub config: SlapdConfig,
    pub provider: DatabaseProvider,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let path = paths::catalog_path(ctx.config.as_deref())?;
        let config = SlapdConfig::load(&path)?;
        let provider = provider_for(&config)?;
        Ok(Self { config, provider })
    }

    /// Discover once and join the result with the catalog
    fn prefetch(&self, ctx: &Context) -> Result<Cache> {
        let desired = self.config.to_desired_entries()?;
        let pb = (!ctx.quiet).then(|| progress::spinner("Discovering databases..."));

        match prefetch(&self.provider, desired) {
            Ok(cache) => {
                if let Some(pb) = pb {
                    pb.finish_and_clear();
                }
                log::info!(
                    "Discovered {} managed and {} unmanaged database(s)",
                    cache.entries().iter().filter(|e| e.exists()).count(),
                    cache.unmanaged().len()
                );
                Ok(cache)
            }
            Err(e) => {
                if let Some(pb) = pb {
                    progress::finish_error(&pb, "Discovery failed");
                }
                if let Some(diagnostic) = e.diagnostic().filter(|d| !d.is_empty()) {
                    log::debug!("ldapsearch said: {diagnostic}");
                }
                Err(e).context("Could not read database definitions from cn=config")
            }
        }
    }
}

/// Build the provider described by the catalog's connection settings
pub fn provider_for(config: &SlapdConfig) -> Result<DatabaseProvider> {
    let context = host_context(config)?;
    let provider = DatabaseProvider::system(config.connection.connection.clone(), context)?
        .with_scheme(config.connection.password_scheme);
    Ok(provider)
}

/// Salt context: the configured host id, else the hostname
pub fn host_context(config: &SlapdConfig) -> Result<String> {
    match &config.connection.host_id {
        Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => runner::hostname(),
    }
}

// ============================================================================
// Status Command
// ============================================================================

/// Status of one catalog entry, safe to print
#[derive(Debug, Serialize)]
pub struct EntryStatus {
    pub suffix: String,
    pub ensure: Ensure,
    pub state: &'static str,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A database on the server the catalog does not mention
#[derive(Debug, Serialize)]
pub struct UnmanagedStatus {
    pub suffix: String,
    pub handle: Option<String>,
    pub backend: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub kind: String,
    pub databases: Vec<EntryStatus>,
    pub unmanaged: Vec<UnmanagedStatus>,
}

impl StatusReport {
    pub fn build(cache: &Cache, plan: &ExecutionPlan) -> Self {
        let databases = plan
            .changes
            .iter()
            .map(|change| {
                let desired = cache.get(&change.name).map(|e| &e.desired);
                let current = cache.get(&change.name).and_then(|e| e.current());
                let (action, changes, reason) = match &change.action {
                    Action::NoOp => ("none", Vec::new(), None),
                    Action::Create { .. } => ("create", Vec::new(), None),
                    Action::Update { changes } => ("update", changes.clone(), None),
                    Action::Delete => ("delete", Vec::new(), None),
                    Action::Rejected { reason } => ("rejected", Vec::new(), Some(reason.clone())),
                };
                let notes = match (desired, current) {
                    (Some(desired), Some(current)) => {
                        rootpw_notes(&changes, desired.attributes.get("rootpw"), current)
                    }
                    _ => Vec::new(),
                };

                EntryStatus {
                    suffix: change.name.clone(),
                    ensure: desired.map_or(Ensure::Present, |d| d.ensure),
                    state: state_label(change.state, &change.action),
                    action,
                    changes,
                    reason,
                    notes,
                }
            })
            .collect();

        let unmanaged = cache
            .unmanaged()
            .iter()
            .map(|record| UnmanagedStatus {
                suffix: record.name.clone(),
                handle: record.handle.clone(),
                backend: record.get("backend").map(str::to_string),
            })
            .collect();

        Self {
            kind: cache.kind().to_string(),
            databases,
            unmanaged,
        }
    }
}

fn state_label(state: MatchState, action: &Action) -> &'static str {
    match (state, action) {
        (_, Action::Rejected { .. }) => "rejected",
        (MatchState::InSync, _) => "in-sync",
        (MatchState::OutOfSync, _) => "out-of-sync",
        (MatchState::Unmatched, Action::NoOp) => "absent",
        (MatchState::Unmatched, _) => "missing",
    }
}

/// Explain a rootpw difference when the stored hash still matches the password
fn rootpw_notes(changes: &[Change], plaintext: Option<&String>, current: &ActualRecord) -> Vec<String> {
    let (Some(plaintext), Some(stored)) = (plaintext, current.get("rootpw")) else {
        return Vec::new();
    };
    if !changes.iter().any(|c| c.property == "rootpw") || password::is_hashed(plaintext) {
        return Vec::new();
    }
    match password::verify(plaintext, stored) {
        Ok(true) => vec!["rootpw: stored hash matches the password but uses a different salt".into()],
        Ok(false) => vec!["rootpw: stored hash does not match the password".into()],
        Err(_) => vec!["rootpw: stored value is not a salted SHA hash".into()],
    }
}

pub fn status(ctx: &Context, target: Option<&str>, json: bool) -> Result<()> {
    let session = Session::open(ctx)?;
    let cache = session.prefetch(ctx)?;
    let plan = ExecutionPlan::build(&session.provider, &cache).filter_by_target(target);
    let report = StatusReport::build(&cache, &plan);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::header("Database Status");
    ui::kv("server", &session.provider.connection().uri);

    if report.databases.is_empty() {
        println!();
        ui::dim("No databases in the catalog");
    } else {
        ui::section("Catalog");
    }
    for entry in &report.databases {
        let marker = match entry.state {
            "in-sync" | "absent" => "✓".green(),
            "rejected" => "✗".red(),
            _ => "●".yellow(),
        };
        println!(
            "  {} {:<36} {}",
            marker,
            entry.suffix,
            format!("{} (ensure {})", entry.state, entry.ensure).dimmed()
        );
        for change in &entry.changes {
            ui::dim(&format!("    {change}"));
        }
        if let Some(reason) = &entry.reason {
            println!("      {}", reason.red());
        }
        for note in &entry.notes {
            ui::dim(&format!("    {note}"));
        }
    }

    if !report.unmanaged.is_empty() && target.is_none() {
        ui::section("Not in catalog (left alone)");
        for db in &report.unmanaged {
            println!(
                "  {} {:<36} {}",
                "○".dimmed(),
                db.suffix,
                db.handle.as_deref().unwrap_or("").dimmed()
            );
        }
    }

    let pending = plan.total_writes();
    println!();
    if pending == 0 && plan.rejected().count() == 0 {
        ui::success("Everything is converged");
    } else if pending > 0 {
        ui::info(&format!(
            "{pending} change(s) pending; run 'slapdconf diff' for details"
        ));
    }
    Ok(())
}

// ============================================================================
// Diff Command
// ============================================================================

pub fn diff(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let cache = session.prefetch(ctx)?;
    let plan = ExecutionPlan::build(&session.provider, &cache).filter_by_target(target);

    differ::display_plan(session.provider.descriptor(), &plan, ctx.verbose > 0);
    Ok(())
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(
    ctx: &Context,
    target: Option<&str>,
    dry_run: bool,
    yes: bool,
    jobs: usize,
    fail_fast: bool,
) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut cache = session.prefetch(ctx)?;
    let plan = ExecutionPlan::build(&session.provider, &cache).filter_by_target(target);

    let opts = ApplyOptions {
        core: ExecuteOptions {
            dry_run,
            jobs: jobs.max(1),
            fail_fast,
            verbose: ctx.verbose > 0,
        },
        yes,
        quiet: ctx.quiet,
    };

    let summary = engine::execute(&session.provider, &mut cache, &plan, &opts)?;
    if !summary.is_success() {
        bail!("{} database(s) failed to converge", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ActualRecord, DesiredEntry, ResourceDescriptor};

    fn descriptor() -> ResourceDescriptor {
        ldapkit::database::descriptor().unwrap()
    }

    /// Plans against a fixed discovery result, without a server
    struct Fixed {
        descriptor: ResourceDescriptor,
        records: Vec<ActualRecord>,
    }

    impl Provider for Fixed {
        fn descriptor(&self) -> &ResourceDescriptor {
            &self.descriptor
        }
        fn discover(&self) -> declarative::Result<Vec<ActualRecord>> {
            Ok(self.records.clone())
        }
        fn transform(
            &self,
            _property: &declarative::PropertySpec,
            value: &str,
        ) -> declarative::Result<String> {
            password::transform(&[value], "host-a").map_err(Into::into)
        }
        fn create(&self, _: &str, _: &declarative::Attributes) -> declarative::Result<()> {
            Ok(())
        }
        fn update(&self, _: &ActualRecord, _: &[Change]) -> declarative::Result<()> {
            Ok(())
        }
        fn delete(&self, _: &ActualRecord) -> declarative::Result<()> {
            Ok(())
        }
    }

    fn report(records: Vec<ActualRecord>, desired: Vec<DesiredEntry>) -> StatusReport {
        let provider = Fixed {
            descriptor: descriptor(),
            records,
        };
        let cache = prefetch(&provider, desired).unwrap();
        let plan = ExecutionPlan::build(&provider, &cache);
        StatusReport::build(&cache, &plan)
    }

    fn mdb(suffix: &str) -> ActualRecord {
        ActualRecord::present(suffix)
            .with_handle("{1}mdb")
            .with("backend", "mdb")
            .with("directory", "/var/lib/ldap")
            .with("readonly", "false")
    }

    #[test]
    fn test_states() {
        let report = report(
            vec![mdb("dc=a"), mdb("dc=b"), mdb("dc=other")],
            vec![
                DesiredEntry::present("dc=a"),
                DesiredEntry::present("dc=b").with("readonly", "true"),
                DesiredEntry::present("dc=c"),
                DesiredEntry::absent("dc=d"),
            ],
        );

        let states: Vec<_> = report.databases.iter().map(|d| d.state).collect();
        assert_eq!(states, vec!["in-sync", "out-of-sync", "missing", "absent"]);
        assert_eq!(report.databases[1].action, "update");
        assert_eq!(report.unmanaged.len(), 1);
        assert_eq!(report.unmanaged[0].suffix, "dc=other");
        assert_eq!(report.unmanaged[0].backend.as_deref(), Some("mdb"));
    }

    #[test]
    fn test_rejected_entry_has_reason() {
        let report = report(
            vec![mdb("dc=a")],
            vec![DesiredEntry::present("dc=a").with("backend", "hdb")],
        );
        assert_eq!(report.databases[0].state, "rejected");
        assert!(report.databases[0].reason.is_some());
    }

    #[test]
    fn test_json_never_contains_rootpw() {
        let stored = password::hash("secret", "another-host", ldapkit::Scheme::Ssha);
        let report = report(
            vec![mdb("dc=a").with("rootpw", &stored)],
            vec![DesiredEntry::present("dc=a").with("rootpw", "secret")],
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains(&stored));
        assert!(json.contains("[redacted]"));
        assert_eq!(
            report.databases[0].notes,
            vec!["rootpw: stored hash matches the password but uses a different salt"]
        );
    }
}
