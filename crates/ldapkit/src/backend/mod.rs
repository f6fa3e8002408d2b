//! Connection settings and the process backend for the LDAP client tools.
//!
//! Every read goes through `ldapsearch` and every write through
//! `ldapmodify`, both authenticated with SASL against the configured URI.

pub mod cli;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base DN of the OpenLDAP configuration tree.
pub const CONFIG_BASE: &str = "cn=config";

/// Default timeout for a single client tool invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How to reach `cn=config` on the managed host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    /// Server URI, normally the local `ldapi:///` socket
    pub uri: String,
    /// SASL mechanism passed with `-Y`
    pub sasl_mech: String,
    /// Path or name of the search tool
    pub ldapsearch: String,
    /// Path or name of the modify tool
    pub ldapmodify: String,
    /// Per-command timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            uri: "ldapi:///".to_string(),
            sasl_mech: "EXTERNAL".to_string(),
            ldapsearch: "ldapsearch".to_string(),
            ldapmodify: "ldapmodify".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Connection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Arguments for an `ldapsearch` of `cn=config` with the given filter.
    ///
    /// `-LLL` drops comments and the version line. Long values are still
    /// folded in the output.
    pub fn search_args<'a>(&'a self, filter: &'a str) -> Vec<&'a str> {
        vec![
            "-LLL",
            "-Q",
            "-Y",
            &self.sasl_mech,
            "-H",
            &self.uri,
            "-b",
            CONFIG_BASE,
            filter,
        ]
    }

    /// Arguments for an `ldapmodify` reading change records from stdin.
    pub fn modify_args(&self) -> Vec<&str> {
        vec!["-Q", "-Y", &self.sasl_mech, "-H", &self.uri]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_connection() {
        let conn = Connection::default();
        assert_eq!(conn.uri, "ldapi:///");
        assert_eq!(conn.timeout(), Duration::from_secs(30));
        assert_eq!(
            conn.modify_args(),
            vec!["-Q", "-Y", "EXTERNAL", "-H", "ldapi:///"]
        );
    }

    #[test]
    fn test_search_args_scope_to_config() {
        let conn = Connection {
            uri: "ldap://127.0.0.1".into(),
            ..Default::default()
        };
        let args = conn.search_args("(objectClass=*)");
        assert_eq!(args[0], "-LLL");
        assert!(args.windows(2).any(|w| w == ["-b", "cn=config"]));
        assert!(args.windows(2).any(|w| w == ["-H", "ldap://127.0.0.1"]));
        assert_eq!(args.last(), Some(&"(objectClass=*)"));
    }
}
