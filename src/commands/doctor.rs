use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::Context;
use crate::commands::declarative::provider_for;
use crate::paths;
use crate::runner;
use crate::schema::SlapdConfig;
use crate::ui;
use ldapkit::platform::{OS_RELEASE, OsRelease, PackageTable};

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("slapdconf Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    // Check 1: Catalog
    let config = check_catalog(ctx, &mut issues);
    let config = config.unwrap_or_default();

    // Check 2: Client tools
    check_commands(&config, &mut issues);

    // Check 3: Packages for this OS family
    check_packages(&config.package_table(), Path::new(OS_RELEASE), &mut issues);

    // Check 4: Server reachable
    check_server(&config, &mut issues);

    println!();
    if issues.is_empty() {
        ui::success("All checks passed!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }
}

fn check_catalog(ctx: &Context, issues: &mut Vec<Issue>) -> Option<SlapdConfig> {
    ui::section("Catalog");

    let path = match paths::catalog_path(ctx.config.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            ui::error("Could not determine config directory");
            issues.push(Issue {
                category: "Catalog",
                summary: "Could not determine config directory".into(),
                detail: Some(format!("{e}")),
                fix: Some(format!("Set {} or pass --config", paths::ENV_CONFIG_DIR)),
                fix_cmd: None,
            });
            return None;
        }
    };

    if !path.exists() {
        println!(
            "  {} {} {}",
            "✗".red(),
            path.display(),
            "(not found)".red()
        );
        issues.push(Issue {
            category: "Catalog",
            summary: "No catalog file".into(),
            detail: Some(format!("Expected at {}", path.display())),
            fix: Some("Create it with a [connection] table and [[databases]] entries".into()),
            fix_cmd: None,
        });
        return None;
    }

    match SlapdConfig::load(&path) {
        Ok(config) => {
            println!(
                "  {} {} {}",
                "✓".green(),
                path.display(),
                format!("({} database(s))", config.databases.len()).dimmed()
            );
            Some(config)
        }
        Err(e) => {
            println!("  {} {} {}", "✗".red(), path.display(), "(invalid)".red());
            issues.push(Issue {
                category: "Catalog",
                summary: "Catalog does not validate".into(),
                detail: Some(format!("{e:#}")),
                fix: Some("Fix the reported entry and re-run".into()),
                fix_cmd: None,
            });
            None
        }
    }
}

fn check_commands(config: &SlapdConfig, issues: &mut Vec<Issue>) {
    ui::section("Client Tools");

    let connection = &config.connection.connection;
    let tools = [
        (connection.ldapsearch.as_str(), "Discovery (ldapsearch)"),
        (connection.ldapmodify.as_str(), "Writes (ldapmodify)"),
    ];

    for (cmd, desc) in tools {
        if runner::command_exists(cmd) {
            println!("  {} {} - {}", "✓".green(), cmd, desc.dimmed());
        } else {
            println!("  {} {} - {} {}", "✗".red(), cmd, desc, "(missing)".red());
            issues.push(Issue {
                category: "Client Tools",
                summary: format!("{cmd} is not on PATH"),
                detail: Some(format!("{desc} is required for every command")),
                fix: Some("Install the OpenLDAP client package listed under Packages".into()),
                fix_cmd: None,
            });
        }
    }
}

fn check_packages(table: &PackageTable, os_release: &Path, issues: &mut Vec<Issue>) {
    ui::section("Packages");

    let Some(release) = OsRelease::load(os_release) else {
        ui::warn(&format!("Could not read {}", os_release.display()));
        return;
    };
    if let Some(name) = &release.pretty_name {
        ui::kv("os", name);
    }

    match release.lookup(table) {
        Some((family, packages)) => {
            ui::kv("family", family);
            ui::kv("packages", &packages.join(", "));
        }
        None => {
            let families: Vec<&str> = release.families().collect();
            println!("  {} no package mapping", "✗".red());
            issues.push(Issue {
                category: "Packages",
                summary: "OS family has no package mapping".into(),
                detail: Some(format!("Tried: {}", families.join(", "))),
                fix: Some("Add the family under [packages] in the catalog".into()),
                fix_cmd: None,
            });
        }
    }
}

fn check_server(config: &SlapdConfig, issues: &mut Vec<Issue>) {
    ui::section("Server");
    ui::kv("uri", &config.connection.connection.uri);

    let provider = match provider_for(config) {
        Ok(p) => p,
        Err(e) => {
            issues.push(Issue {
                category: "Server",
                summary: "Could not configure the connection".into(),
                detail: Some(format!("{e:#}")),
                fix: Some("Set connection.host_id in the catalog".into()),
                fix_cmd: None,
            });
            return;
        }
    };

    match provider.probe() {
        Ok(count) => {
            println!(
                "  {} cn=config readable {}",
                "✓".green(),
                format!("({count} database entries)").dimmed()
            );
        }
        Err(e) => {
            let category = e.category();
            println!("  {} {}", "✗".red(), category.description().red());
            issues.push(Issue {
                category: "Server",
                summary: category.description().to_string(),
                detail: Some(e.to_string()),
                fix: Some(category.advice().to_string()),
                fix_cmd: (category == ldapkit::ErrorCategory::Connectivity)
                    .then(|| "systemctl status slapd".to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_package_lookup_from_os_release() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ID=debian\nPRETTY_NAME=\"Debian 12\"").unwrap();

        let mut issues = Vec::new();
        check_packages(&ldapkit::platform::default_packages(), file.path(), &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_unknown_family_is_an_issue() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ID=plan9").unwrap();

        let mut issues = Vec::new();
        check_packages(&ldapkit::platform::default_packages(), file.path(), &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].detail.as_deref(), Some("Tried: plan9"));
    }

    #[test]
    fn test_missing_tool_is_an_issue() {
        let mut config = SlapdConfig::default();
        config.connection.connection.ldapsearch = "slapdconf-missing-ldapsearch".into();
        config.connection.connection.ldapmodify = "slapdconf-missing-ldapmodify".into();

        let mut issues = Vec::new();
        check_commands(&config, &mut issues);
        assert_eq!(issues.len(), 2);
    }
}
