//! The OpenLDAP database (backend) definition as a managed resource.
//!
//! Each instance is one `olcDatabase` entry under `cn=config`, identified
//! by its `olcSuffix`. Discovery reads all of them with a single
//! `ldapsearch`; writes are LDIF change records piped to `ldapmodify`.

use crate::backend::Connection;
use crate::backend::cli::LdapCli;
use crate::error::Error as LdapError;
use crate::ldif::{self, ChangeRecord};
use crate::password::{self, Scheme};
use declarative::{
    ActualRecord, Attributes, Change, CommandExecutor, CommandOutput, Error, Operation,
    PropertySpec, Provider, ResourceDescriptor, Result, ValueKind, ensure_unique,
};

/// Resource kind name.
pub const KIND: &str = "openldap_database";

/// Identity key: the database suffix DN.
pub const IDENTITY: &str = "suffix";

/// Backend variants the search filter selects.
pub const BACKENDS: &[&str] = &["bdb", "hdb", "mdb", "ldap", "relay", "monitor", "config"];

/// Managed properties and the `cn=config` attributes they map to.
///
/// `backend` is absent: it is carried by `olcDatabase` and the DN.
const ATTRIBUTE_MAP: &[(&str, &str)] = &[
    ("directory", "olcDbDirectory"),
    ("rootdn", "olcRootDN"),
    ("rootpw", "olcRootPW"),
    ("readonly", "olcReadOnly"),
    ("sizelimit", "olcSizeLimit"),
    ("timelimit", "olcTimeLimit"),
    ("dbmaxsize", "olcDbMaxSize"),
];

/// Schema of an OpenLDAP database definition.
pub fn descriptor() -> Result<ResourceDescriptor> {
    ResourceDescriptor::new(
        KIND,
        IDENTITY,
        vec![
            PropertySpec::text("backend")
                .one_of(BACKENDS)
                .with_default("mdb")
                .immutable(),
            PropertySpec::text("directory").with_default("/var/lib/ldap"),
            PropertySpec::text("rootdn"),
            PropertySpec::secret("rootpw"),
            PropertySpec::boolean("readonly").with_default("false"),
            PropertySpec::integer("sizelimit"),
            PropertySpec::integer("timelimit"),
            PropertySpec::integer("dbmaxsize"),
        ],
    )
}

/// The `cn=config` attribute for a property, if it has one.
pub fn ldap_attribute(property: &str) -> Option<&'static str> {
    ATTRIBUTE_MAP
        .iter()
        .find(|(p, _)| *p == property)
        .map(|(_, a)| *a)
}

fn property_for(attribute: &str) -> Option<&'static str> {
    ATTRIBUTE_MAP
        .iter()
        .find(|(_, a)| a.eq_ignore_ascii_case(attribute))
        .map(|(p, _)| *p)
}

/// Search filter selecting every database entry of a known backend.
pub fn search_filter(backends: &[String]) -> String {
    let alternatives: String = backends
        .iter()
        .map(|b| format!("(olcDatabase={b})"))
        .collect();
    format!("(&(objectClass=olcDatabaseConfig)(|{alternatives}))")
}

/// Split an `olcDatabase` value like `{1}mdb` into ordinal and backend.
pub fn parse_handle(value: &str) -> Option<(i32, &str)> {
    let rest = value.strip_prefix('{')?;
    let (ordinal, backend) = rest.split_once('}')?;
    let ordinal = ordinal.parse().ok()?;
    (!backend.is_empty()).then_some((ordinal, backend))
}

/// Parse `ldapsearch` output into records.
///
/// Entries without `olcSuffix` (the frontend, `cn=config` itself, monitor)
/// have no identity and are skipped.
pub fn parse_records(descriptor: &ResourceDescriptor, text: &str) -> Result<Vec<ActualRecord>> {
    let entries = ldif::parse(text)
        .map_err(|e| Error::discovery("unparseable ldapsearch output", e.to_string()))?;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(suffix) = entry.last("olcSuffix") else {
            log::debug!(
                "Skipping {} (no olcSuffix)",
                entry.dn.as_deref().unwrap_or("entry without dn")
            );
            continue;
        };

        let database = entry.last("olcDatabase").ok_or_else(|| {
            Error::discovery(
                format!("database '{suffix}' has no olcDatabase attribute"),
                "",
            )
        })?;
        let (_, backend) = parse_handle(database).ok_or_else(|| {
            Error::discovery(
                format!("malformed olcDatabase value '{database}' for '{suffix}'"),
                "",
            )
        })?;

        let mut record = ActualRecord::present(suffix)
            .with_handle(database)
            .with("backend", backend);

        // Later lines overwrite earlier ones
        for (attribute, value) in &entry.attributes {
            let Some(property) = property_for(attribute) else {
                continue;
            };
            let value = match descriptor.property(property) {
                Some(spec) => spec.normalize_observed(value),
                None => value.clone(),
            };
            record.attributes.insert(property.to_string(), value);
        }

        records.push(record);
    }

    ensure_unique(descriptor.kind(), &records)?;
    Ok(records)
}

/// Value as written to `cn=config` (booleans in LDAP's upper case).
fn ldap_value(descriptor: &ResourceDescriptor, property: &str, value: &str) -> String {
    match descriptor.property(property).map(|s| s.kind) {
        Some(ValueKind::Boolean) => match value {
            "true" => "TRUE".to_string(),
            "false" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => value.to_string(),
    }
}

/// Format a record the way `ldapsearch -LLL` prints it.
pub fn format_record(descriptor: &ResourceDescriptor, record: &ActualRecord) -> String {
    let backend = record.get("backend").unwrap_or("mdb");
    let handle = record
        .handle
        .clone()
        .unwrap_or_else(|| format!("{{0}}{backend}"));

    let mut out = String::new();
    ldif::write_line(&mut out, "dn", &format!("olcDatabase={handle},cn=config"));
    ldif::write_line(&mut out, "objectClass", "olcDatabaseConfig");
    ldif::write_line(&mut out, "objectClass", &object_class(backend));
    ldif::write_line(&mut out, "olcDatabase", &handle);
    ldif::write_line(&mut out, "olcSuffix", &record.name);
    for (property, attribute) in ATTRIBUTE_MAP {
        if let Some(value) = record.get(property) {
            ldif::write_line(&mut out, attribute, &ldap_value(descriptor, property, value));
        }
    }
    out
}

/// Structural object class of a backend, e.g. `olcMdbConfig`.
pub fn object_class(backend: &str) -> String {
    let mut chars = backend.chars();
    match chars.next() {
        Some(first) => format!("olc{}{}Config", first.to_ascii_uppercase(), chars.as_str()),
        None => "olcDatabaseConfig".to_string(),
    }
}

fn existing_dn(current: &ActualRecord) -> Result<String> {
    let handle = current.handle.as_deref().ok_or_else(|| {
        Error::Other(format!(
            "database '{}' has no olcDatabase handle; re-run to rediscover it",
            current.name
        ))
    })?;
    Ok(format!("olcDatabase={handle},cn=config"))
}

/// Change record creating a database.
///
/// The DN carries no ordinal: slapd assigns the next free one.
pub fn add_request(
    descriptor: &ResourceDescriptor,
    name: &str,
    attributes: &Attributes,
) -> ChangeRecord {
    let backend = attributes.get("backend").map_or("mdb", String::as_str);

    let mut lines = vec![
        ("objectClass".to_string(), "olcDatabaseConfig".to_string()),
        ("objectClass".to_string(), object_class(backend)),
        ("olcDatabase".to_string(), backend.to_string()),
        ("olcSuffix".to_string(), name.to_string()),
    ];
    for (property, attribute) in ATTRIBUTE_MAP {
        if let Some(value) = attributes.get(*property) {
            lines.push((
                (*attribute).to_string(),
                ldap_value(descriptor, property, value),
            ));
        }
    }

    ChangeRecord::Add {
        dn: format!("olcDatabase={backend},cn=config"),
        attributes: lines,
    }
}

/// Change record replacing only the changed attributes.
pub fn modify_request(
    descriptor: &ResourceDescriptor,
    current: &ActualRecord,
    changes: &[Change],
) -> Result<ChangeRecord> {
    let mut replace = Vec::with_capacity(changes.len());
    for change in changes {
        let attribute = ldap_attribute(&change.property).ok_or_else(|| {
            Error::validation(format!(
                "property '{}' cannot be modified in place",
                change.property
            ))
        })?;
        replace.push((
            attribute.to_string(),
            ldap_value(descriptor, &change.property, &change.to),
        ));
    }

    Ok(ChangeRecord::Modify {
        dn: existing_dn(current)?,
        replace,
    })
}

/// Change record removing a database.
pub fn delete_request(current: &ActualRecord) -> Result<ChangeRecord> {
    Ok(ChangeRecord::Delete {
        dn: existing_dn(current)?,
    })
}

/// Provider managing OpenLDAP database definitions.
pub struct DatabaseProvider {
    descriptor: ResourceDescriptor,
    connection: Connection,
    executor: Box<dyn CommandExecutor>,
    context: String,
    scheme: Scheme,
}

impl DatabaseProvider {
    /// Create a provider that runs commands through `executor`.
    ///
    /// `context` is the per-host salt material for password hashing.
    pub fn new(
        connection: Connection,
        executor: Box<dyn CommandExecutor>,
        context: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            descriptor: descriptor()?,
            connection,
            executor,
            context: context.into(),
            scheme: Scheme::default(),
        })
    }

    /// Create a provider running the real client tools.
    pub fn system(connection: Connection, context: impl Into<String>) -> Result<Self> {
        let executor = LdapCli::for_connection(&connection);
        Self::new(connection, Box::new(executor), context)
    }

    /// Use a different password scheme for `rootpw`.
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Run the discovery search once and count the databases it returns.
    ///
    /// Unlike [`Provider::discover`], failures keep their [`LdapError`]
    /// category so callers can print advice.
    pub fn probe(&self) -> std::result::Result<usize, LdapError> {
        let output = self.search()?;
        if !output.success {
            return Err(LdapError::from_tool_output(
                &self.connection.ldapsearch,
                output.code,
                &output.stderr_str(),
            ));
        }
        Ok(ldif::parse(&output.stdout_str())?.len())
    }

    fn search(&self) -> std::result::Result<CommandOutput, LdapError> {
        let backends: Vec<String> = self
            .descriptor
            .allowed_values("backend")
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let filter = search_filter(&backends);
        let program = &self.connection.ldapsearch;

        self.executor
            .run(program, &self.connection.search_args(&filter), None)
            .map_err(|e| LdapError::from_spawn(program, self.connection.timeout_secs, e))
    }

    /// Pipe a change record to `ldapmodify`.
    fn write(&self, name: &str, operation: Operation, record: &ChangeRecord) -> Result<()> {
        let payload = record.to_ldif();
        let program = &self.connection.ldapmodify;
        log::debug!("{} {} via {}", operation, record.dn(), program);

        let convergence = |diagnostic: String| Error::Convergence {
            name: name.to_string(),
            operation,
            payload: payload.clone(),
            diagnostic,
        };

        let output = self
            .executor
            .run(program, &self.connection.modify_args(), Some(&payload))
            .map_err(|e| {
                convergence(
                    LdapError::from_spawn(program, self.connection.timeout_secs, e).to_string(),
                )
            })?;

        if !output.success {
            let err = LdapError::from_tool_output(program, output.code, &output.stderr_str());
            log::debug!("{} failed: {}", program, err.category().description());
            return Err(convergence(output.diagnostic()));
        }
        Ok(())
    }
}

impl Provider for DatabaseProvider {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn discover(&self) -> Result<Vec<ActualRecord>> {
        let output = self
            .search()
            .map_err(|e| Error::discovery(e.to_string(), ""))?;

        if !output.success {
            let err = LdapError::from_tool_output(
                &self.connection.ldapsearch,
                output.code,
                &output.stderr_str(),
            );
            return Err(Error::discovery(
                format!("{}: {}", err.category().description(), err),
                output.diagnostic(),
            ));
        }

        let records = parse_records(&self.descriptor, &output.stdout_str())?;
        log::debug!("Found {} database(s) under cn=config", records.len());
        Ok(records)
    }

    fn transform(&self, _property: &PropertySpec, value: &str) -> Result<String> {
        password::transform_with(&[value], &self.context, self.scheme).map_err(Into::into)
    }

    fn create(&self, name: &str, attributes: &Attributes) -> Result<()> {
        let record = add_request(&self.descriptor, name, attributes);
        self.write(name, Operation::Create, &record)
    }

    fn update(&self, current: &ActualRecord, changes: &[Change]) -> Result<()> {
        let record = modify_request(&self.descriptor, current, changes)?;
        self.write(&current.name, Operation::Update, &record)
    }

    fn delete(&self, current: &ActualRecord) -> Result<()> {
        let record = delete_request(current)?;
        self.write(&current.name, Operation::Delete, &record)
    }

    fn describe(&self, name: &str) -> String {
        format!("database {name}")
    }
}
