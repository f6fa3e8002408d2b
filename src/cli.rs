use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slapdconf")]
#[command(author = "slapdconf contributors")]
#[command(version)]
#[command(about = "Declarative management of OpenLDAP database definitions", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Catalog file (default: <config dir>/slapdconf.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show each database's state against the catalog
    Status(StatusArgs),

    /// Preview what apply would change
    Diff(TargetArgs),

    /// Make the server's databases match the catalog
    Apply(ApplyArgs),

    /// Hash a password the way rootpw is stored
    HashPassword(HashArgs),

    /// Check client tools, packages and server connectivity
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Declarative Commands
// ============================================================================

#[derive(Parser)]
pub struct TargetArgs {
    /// Only include databases whose suffix contains this text
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// Only include databases whose suffix contains this text
    pub target: Option<String>,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only include databases whose suffix contains this text
    pub target: Option<String>,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of databases converged in parallel
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Stop issuing writes after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

// ============================================================================
// Password Hashing
// ============================================================================

#[derive(Parser)]
pub struct HashArgs {
    /// Password to hash (exactly one)
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Salt context (default: catalog host_id, then the hostname)
    #[arg(long)]
    pub context: Option<String>,

    /// Hash scheme
    #[arg(long, value_enum, default_value = "ssha")]
    pub scheme: SchemeArg,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SchemeArg {
    Ssha,
    Ssha256,
}

impl From<SchemeArg> for ldapkit::Scheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Ssha => Self::Ssha,
            SchemeArg::Ssha256 => Self::Ssha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "slapdconf",
            "apply",
            "--dry-run",
            "--jobs",
            "4",
            "--fail-fast",
            "dc=example",
        ]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.dry_run);
        assert!(!args.yes);
        assert_eq!(args.jobs, 4);
        assert!(args.fail_fast);
        assert_eq!(args.target.as_deref(), Some("dc=example"));
    }

    #[test]
    fn test_hash_password_keeps_all_inputs() {
        // Arity is checked by the transform, not by clap
        let cli = Cli::parse_from(["slapdconf", "hash-password", "a", "b"]);
        let Command::HashPassword(args) = cli.command else {
            panic!("expected hash-password");
        };
        assert_eq!(args.inputs, vec!["a", "b"]);
        assert!(matches!(args.scheme, SchemeArg::Ssha));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["slapdconf", "status", "--json", "-vv", "-c", "/tmp/x.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }
}
