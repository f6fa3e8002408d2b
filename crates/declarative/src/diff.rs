//! Diff statistics for an execution plan

use crate::planner::{Action, ExecutionPlan};
use serde::Serialize;

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Number of instances to create
    pub additions: usize,
    /// Number of instances to remove
    pub removals: usize,
    /// Number of instances to modify
    pub modifications: usize,
    /// Number of attribute-level changes across all modifications
    pub attribute_changes: usize,
    /// Number of entries rejected by validation
    pub rejected: usize,
    /// Number of entries already converged
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a plan
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        let mut summary = Self::default();
        for change in &plan.changes {
            match &change.action {
                Action::NoOp => summary.unchanged += 1,
                Action::Create { .. } => summary.additions += 1,
                Action::Delete => summary.removals += 1,
                Action::Update { changes } => {
                    summary.modifications += 1;
                    summary.attribute_changes += changes.len();
                }
                Action::Rejected { .. } => summary.rejected += 1,
            }
        }
        summary
    }

    /// Total number of writes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
