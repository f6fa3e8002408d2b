//! # ldapkit
//!
//! OpenLDAP `cn=config` database management through the LDAP client tools.
//!
//! This crate provides functionality for:
//! - Discovering database definitions with `ldapsearch` and parsing the LDIF output
//! - Creating, modifying and deleting them with `ldapmodify` change records
//! - Hashing `olcRootPW` values in the `{SSHA}` format with a per-host salt
//! - Classifying client tool failures so operators can tell bad input from a dead server
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{DesiredEntry, ExecuteOptions, reconcile_simple};
//! use ldapkit::{Connection, DatabaseProvider};
//!
//! let provider = DatabaseProvider::system(Connection::default(), "ldap01.example.com")
//!     .expect("valid schema");
//!
//! let desired = vec![
//!     DesiredEntry::present("dc=example,dc=com")
//!         .with("directory", "/var/lib/ldap/example")
//!         .with("rootdn", "cn=admin,dc=example,dc=com")
//!         .with("rootpw", "secret"),
//! ];
//!
//! let run = reconcile_simple(&provider, desired, &ExecuteOptions::default())
//!     .expect("reconciliation failed");
//! println!("{} change(s)", run.summary.total_changes());
//! ```
//!
//! ## Password Hashing
//!
//! ```
//! let hashed = ldapkit::password::transform(&["secret"], "ldap01").unwrap();
//! assert!(hashed.starts_with("{SSHA}"));
//! assert!(ldapkit::password::verify("secret", &hashed).unwrap());
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod database;
pub mod error;
pub mod ldif;
pub mod password;
pub mod platform;

pub use backend::Connection;
pub use backend::cli::LdapCli;
pub use database::DatabaseProvider;
pub use error::{Error, ErrorCategory, Result};
pub use password::Scheme;
