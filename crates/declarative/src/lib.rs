//! # Declarative
//!
//! Reconciliation of declared resource instances against a managed system.
//!
//! A run discovers every instance of one resource kind with a single bulk
//! query, joins the result with the desired entries, plans the minimal
//! write for each entry and then converges them.
//!
//! ## Core Concepts
//!
//! - **ResourceDescriptor**: The schema of a kind (identity key, properties, defaults)
//! - **Provider**: Discovery and create/update/delete for one kind
//! - **Cache**: Desired entries bound to discovered records for one run
//! - **ExecutionPlan**: The action chosen for every entry, before any write
//! - **Executor**: Converges planned writes, sequentially or in parallel
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{DesiredEntry, ExecuteOptions, reconcile_simple};
//!
//! let provider = MyProvider::new(executor);
//! let desired = vec![
//!     DesiredEntry::present("dc=example,dc=com").with("directory", "/var/lib/ldap/example"),
//!     DesiredEntry::absent("dc=legacy,dc=com"),
//! ];
//!
//! let run = reconcile_simple(&provider, desired, &ExecuteOptions::default())?;
//! println!("{} change(s)", run.summary.total_changes());
//! ```
//!
//! ## Collaborator Traits
//!
//! - [`CommandExecutor`]: Runs external commands for providers
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks or process runners.

pub mod cache;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod provider;
pub mod reconciler;
pub mod record;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use cache::{Cache, CacheEntry, MatchState, ensure_unique, prefetch};
pub use context::{
    AutoConfirm, AutoDecline, CommandExecutor, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::DiffSummary;
pub use error::{Error, Result};
pub use executor::{Reconciliation, execute, reconcile, reconcile_simple};
pub use planner::{Action, Change, ExecutionPlan, PlannedChange, plan_entry, resolve_desired};
pub use provider::Provider;
pub use reconciler::{Reconciler, converge};
pub use record::{ActualRecord, DesiredEntry};
pub use schema::{AllowedValues, PropertySpec, ResourceDescriptor, ValueKind};
pub use types::{
    ApplyResult, Attributes, CommandOutput, Ensure, ExecuteOptions, ExecuteSummary, Operation,
};
