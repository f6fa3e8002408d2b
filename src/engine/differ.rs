//! Plan display

use colored::Colorize;
use declarative::{Action, DiffSummary, ExecutionPlan, PlannedChange, ResourceDescriptor};

/// One-line symbol for a planned action
fn symbol(action: &Action) -> colored::ColoredString {
    match action {
        Action::NoOp => "○".dimmed(),
        Action::Create { .. } => "+".green(),
        Action::Update { .. } => "~".yellow(),
        Action::Delete => "-".red(),
        Action::Rejected { .. } => "!".red().bold(),
    }
}

/// Detail lines shown under a planned change
pub fn detail_lines(descriptor: &ResourceDescriptor, change: &PlannedChange) -> Vec<String> {
    match &change.action {
        Action::NoOp | Action::Delete => Vec::new(),
        Action::Create { attributes } => attributes
            .iter()
            .map(|(property, value)| {
                let shown = descriptor
                    .property(property)
                    .map_or(value.as_str(), |spec| spec.display_value(value));
                format!("{property} = {shown}")
            })
            .collect(),
        Action::Update { changes } => changes.iter().map(ToString::to_string).collect(),
        Action::Rejected { reason } => vec![reason.clone()],
    }
}

/// Display the plan in a user-friendly format
///
/// Converged entries are listed only when `show_unchanged` is set.
pub fn display_plan(descriptor: &ResourceDescriptor, plan: &ExecutionPlan, show_unchanged: bool) {
    let summary = DiffSummary::from_plan(plan);
    if !summary.has_changes() && summary.rejected == 0 {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Database Plan".bold()
    );
    println!("│");

    for change in &plan.changes {
        if matches!(change.action, Action::NoOp) && !show_unchanged {
            continue;
        }

        let label = match &change.action {
            Action::NoOp => "(in sync)",
            Action::Create { .. } => "(will create)",
            Action::Update { .. } => "(will modify)",
            Action::Delete => "(will remove)",
            Action::Rejected { .. } => "(rejected)",
        };
        println!(
            "│   {} {:<36} {}",
            symbol(&change.action),
            change.name,
            label.dimmed()
        );

        for line in detail_lines(descriptor, change) {
            let line = if matches!(change.action, Action::Rejected { .. }) {
                line.red().to_string()
            } else {
                line.dimmed().to_string()
            };
            println!("│       {line}");
        }
    }

    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to modify ({} attributes), {} to remove",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.attribute_changes,
        summary.removals.to_string().red()
    );
    if summary.rejected > 0 {
        println!(
            "│          {} rejected",
            summary.rejected.to_string().red().bold()
        );
    }
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Attributes, Change, MatchState};

    fn descriptor() -> ResourceDescriptor {
        ldapkit::database::descriptor().unwrap()
    }

    #[test]
    fn test_create_details_hide_rootpw() {
        let mut attributes = Attributes::new();
        attributes.insert("backend".into(), "mdb".into());
        attributes.insert("rootpw".into(), "{SSHA}abcd".into());
        let change = PlannedChange {
            name: "dc=a".into(),
            state: MatchState::Unmatched,
            action: Action::Create { attributes },
        };

        let lines = detail_lines(&descriptor(), &change);
        assert_eq!(lines, vec!["backend = mdb", "rootpw = [redacted]"]);
    }

    #[test]
    fn test_update_details() {
        let change = PlannedChange {
            name: "dc=a".into(),
            state: MatchState::OutOfSync,
            action: Action::Update {
                changes: vec![Change {
                    property: "readonly".into(),
                    from: Some("false".into()),
                    to: "true".into(),
                    secret: false,
                }],
            },
        };

        let lines = detail_lines(&descriptor(), &change);
        assert_eq!(lines, vec!["readonly: false → true"]);
    }
}
