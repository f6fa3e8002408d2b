//! OS family detection and the package-name lookup table.
//!
//! Package names differ per distribution family; which names to install
//! is configuration, so the table itself comes from the catalog and this
//! module only resolves the host's family against it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Standard location of the os-release file.
pub const OS_RELEASE: &str = "/etc/os-release";

/// OS family → package names.
pub type PackageTable = BTreeMap<String, Vec<String>>;

/// Fields of `/etc/os-release` needed for family resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: Option<String>,
    pub id_like: Vec<String>,
    pub pretty_name: Option<String>,
}

impl OsRelease {
    /// Parse os-release content (`KEY=value`, values optionally quoted).
    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            match key.trim() {
                "ID" => release.id = Some(value.to_ascii_lowercase()),
                "ID_LIKE" => {
                    release.id_like = value
                        .split_whitespace()
                        .map(str::to_ascii_lowercase)
                        .collect();
                }
                "PRETTY_NAME" => release.pretty_name = Some(value.to_string()),
                _ => {}
            }
        }
        release
    }

    /// Read and parse an os-release file; `None` if it cannot be read.
    pub fn load(path: &Path) -> Option<Self> {
        fs::read_to_string(path).ok().map(|c| Self::parse(&c))
    }

    /// Family candidates, most specific first.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.id.iter().chain(self.id_like.iter()).map(String::as_str)
    }

    /// Resolve the first candidate family present in the table.
    pub fn lookup<'a>(&self, table: &'a PackageTable) -> Option<(&'a str, &'a [String])> {
        self.families().find_map(|family| {
            table
                .get_key_value(family)
                .map(|(k, v)| (k.as_str(), v.as_slice()))
        })
    }
}

/// Package names used when the catalog does not configure any.
pub fn default_packages() -> PackageTable {
    let entry = |family: &str, names: &[&str]| -> (String, Vec<String>) {
        (
            family.to_string(),
            names.iter().map(|n| (*n).to_string()).collect(),
        )
    };
    PackageTable::from([
        entry("debian", &["slapd", "ldap-utils"]),
        entry("rhel", &["openldap-servers", "openldap-clients"]),
        entry("fedora", &["openldap-servers", "openldap-clients"]),
        entry("suse", &["openldap2", "openldap2-client"]),
        entry("alpine", &["openldap", "openldap-clients"]),
        entry("arch", &["openldap"]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU: &str = r#"PRETTY_NAME="Ubuntu 24.04 LTS"
NAME="Ubuntu"
ID=ubuntu
ID_LIKE=debian
"#;

    const ROCKY: &str = r#"NAME="Rocky Linux"
ID="rocky"
ID_LIKE="rhel centos fedora"
"#;

    #[test]
    fn test_parse_os_release() {
        let release = OsRelease::parse(UBUNTU);
        assert_eq!(release.id.as_deref(), Some("ubuntu"));
        assert_eq!(release.id_like, vec!["debian"]);
        assert_eq!(release.pretty_name.as_deref(), Some("Ubuntu 24.04 LTS"));
    }

    #[test]
    fn test_lookup_falls_back_to_id_like() {
        let table = default_packages();
        let (family, packages) = OsRelease::parse(UBUNTU).lookup(&table).unwrap();
        assert_eq!(family, "debian");
        assert_eq!(packages, ["slapd", "ldap-utils"]);

        let (family, _) = OsRelease::parse(ROCKY).lookup(&table).unwrap();
        assert_eq!(family, "rhel");
    }

    #[test]
    fn test_unknown_family() {
        let release = OsRelease::parse("ID=plan9\n");
        assert!(release.lookup(&default_packages()).is_none());
    }
}
