//! Catalog schema: the desired database definitions for one host

use anyhow::{Context, Result, bail};
use declarative::{DesiredEntry, Ensure, ResourceDescriptor};
use ldapkit::platform::{PackageTable, default_packages};
use ldapkit::{Connection, Scheme};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The slapdconf catalog, loaded from `slapdconf.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SlapdConfig {
    /// How to reach `cn=config`
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// OS family → package names reported by `doctor`
    #[serde(default)]
    pub packages: PackageTable,

    /// Desired database definitions, in apply order
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

/// Connection settings plus the host-specific hashing inputs
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(flatten)]
    pub connection: Connection,

    /// Salt context for `rootpw`; the hostname when unset
    #[serde(default)]
    pub host_id: Option<String>,

    #[serde(default)]
    pub password_scheme: Scheme,
}

/// One `[[databases]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub suffix: String,

    #[serde(default)]
    pub ensure: Ensure,

    /// Every other key: a database property
    #[serde(flatten)]
    pub properties: BTreeMap<String, toml::Value>,
}

impl SlapdConfig {
    /// Load and validate a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read catalog: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid catalog: {}", path.display()))?;
        log::debug!(
            "Loaded {} database(s) from {}",
            config.databases.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate catalog TOML
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the catalog
    ///
    /// Runs before any command touches the server: empty or duplicate
    /// suffixes, unknown properties and non-scalar values are rejected here.
    pub fn validate(&self) -> Result<()> {
        let descriptor = ldapkit::database::descriptor()?;
        let mut seen = HashSet::new();

        for (i, database) in self.databases.iter().enumerate() {
            database
                .validate(&descriptor)
                .with_context(|| format!("Invalid database #{}", i + 1))?;
            if !seen.insert(database.suffix.trim()) {
                bail!("Database '{}' is declared more than once", database.suffix);
            }
        }

        if self.connection.connection.timeout_secs == 0 {
            bail!("connection.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Desired entries in catalog order
    pub fn to_desired_entries(&self) -> Result<Vec<DesiredEntry>> {
        self.databases
            .iter()
            .map(DatabaseConfig::to_desired_entry)
            .collect()
    }

    /// Package table from the catalog, or the built-in one when empty
    pub fn package_table(&self) -> PackageTable {
        if self.packages.is_empty() {
            default_packages()
        } else {
            self.packages.clone()
        }
    }
}

impl DatabaseConfig {
    fn validate(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        if self.suffix.trim().is_empty() {
            bail!("'suffix' must not be empty");
        }
        for (name, value) in &self.properties {
            descriptor.require(name)?;
            scalar(name, value)?;
        }
        Ok(())
    }

    /// Build the desired entry, stringifying scalar values
    pub fn to_desired_entry(&self) -> Result<DesiredEntry> {
        let mut entry = match self.ensure {
            Ensure::Present => DesiredEntry::present(self.suffix.trim()),
            Ensure::Absent => DesiredEntry::absent(self.suffix.trim()),
        };
        for (name, value) in &self.properties {
            entry = entry.with(name, &scalar(name, value)?);
        }
        Ok(entry)
    }
}

fn scalar(name: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(n) => Ok(n.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => bail!(
            "property '{name}' must be a string, integer or boolean, got {}",
            other.type_str()
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE: &str = r#"
[connection]
uri = "ldapi:///"
timeout_secs = 10
host_id = "ldap01.example.com"
password_scheme = "ssha256"

[packages]
debian = ["slapd", "ldap-utils"]

[[databases]]
suffix = "dc=example,dc=com"
backend = "mdb"
directory = "/var/lib/ldap/example"
rootdn = "cn=admin,dc=example,dc=com"
rootpw = "secret"
readonly = false
sizelimit = 500

[[databases]]
suffix = "dc=old,dc=com"
ensure = "absent"
"#;

    #[test]
    fn test_parse_example_config() {
        let config = SlapdConfig::parse(EXAMPLE).expect("Failed to parse config");

        assert_eq!(config.connection.connection.uri, "ldapi:///");
        assert_eq!(config.connection.connection.sasl_mech, "EXTERNAL");
        assert_eq!(config.connection.connection.timeout_secs, 10);
        assert_eq!(
            config.connection.host_id.as_deref(),
            Some("ldap01.example.com")
        );
        assert_eq!(config.connection.password_scheme, Scheme::Ssha256);
        assert_eq!(config.packages["debian"], vec!["slapd", "ldap-utils"]);
        assert_eq!(config.databases.len(), 2);
        assert_eq!(config.databases[1].ensure, Ensure::Absent);
    }

    #[test]
    fn test_desired_entries() {
        let config = SlapdConfig::parse(EXAMPLE).unwrap();
        let entries = config.to_desired_entries().unwrap();

        assert_eq!(entries[0].name, "dc=example,dc=com");
        assert_eq!(entries[0].ensure, Ensure::Present);
        assert_eq!(entries[0].attributes["readonly"], "false");
        assert_eq!(entries[0].attributes["sizelimit"], "500");
        assert_eq!(entries[0].attributes["rootpw"], "secret");
        assert_eq!(entries[1].ensure, Ensure::Absent);
        assert!(entries[1].attributes.is_empty());
    }

    #[test]
    fn test_empty_catalog_defaults() {
        let config = SlapdConfig::parse("").unwrap();
        assert!(config.databases.is_empty());
        assert_eq!(config.connection.connection, Connection::default());
        assert!(config.package_table().contains_key("debian"));
    }

    #[test]
    fn test_duplicate_suffix_rejected() {
        let toml = r#"
[[databases]]
suffix = "dc=a"

[[databases]]
suffix = "dc=a"
"#;
        let err = SlapdConfig::parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("declared more than once"));
    }

    #[test]
    fn test_unknown_property_rejected() {
        let toml = r#"
[[databases]]
suffix = "dc=a"
colour = "blue"
"#;
        let err = SlapdConfig::parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("colour"));
    }

    #[test]
    fn test_empty_suffix_rejected() {
        let err = SlapdConfig::parse("[[databases]]\nsuffix = \"  \"\n").unwrap_err();
        assert!(format!("{err:#}").contains("must not be empty"));
    }

    #[test]
    fn test_non_scalar_value_rejected() {
        let toml = r#"
[[databases]]
suffix = "dc=a"
directory = ["/a", "/b"]
"#;
        let err = SlapdConfig::parse(toml).unwrap_err();
        assert!(format!("{err:#}").contains("must be a string, integer or boolean"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();

        let config = SlapdConfig::load(file.path()).unwrap();
        assert_eq!(config.databases.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SlapdConfig::load(&dir.path().join("slapdconf.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read catalog"));
    }
}
