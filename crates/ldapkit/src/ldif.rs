//! LDIF reading and change-record writing (RFC 2849 subset).
//!
//! Reading covers what `ldapsearch -LLL` prints: blank-line separated
//! entries, folded continuation lines, `#` comments and base64 values.
//! Writing covers the `add`, `modify` (replace only) and `delete` change
//! records sent to `ldapmodify`.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Column at which written lines are folded.
const FOLD_WIDTH: usize = 76;

/// One LDIF entry: attribute lines in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl Entry {
    /// Last value of an attribute, matched case-insensitively.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse LDIF text into entries.
///
/// Empty input yields no entries. A `version:` line before the first entry
/// is accepted and ignored.
pub fn parse(text: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut current = Entry::default();
    let mut in_entry = false;

    for (number, line) in unfold(text) {
        if line.trim().is_empty() {
            if in_entry {
                entries.push(std::mem::take(&mut current));
                in_entry = false;
            }
            continue;
        }

        let (key, value) = parse_line(number, &line)?;
        if !in_entry && entries.is_empty() && key.eq_ignore_ascii_case("version") {
            continue;
        }

        in_entry = true;
        if key.eq_ignore_ascii_case("dn") {
            current.dn = Some(value);
        } else {
            current.attributes.push((key, value));
        }
    }

    if in_entry {
        entries.push(current);
    }
    Ok(entries)
}

/// Join folded lines and drop comments, keeping the first line number of each logical line.
fn unfold(text: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    let mut in_comment = false;

    for (i, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        if let Some(rest) = raw.strip_prefix(' ') {
            // Continuation of a comment stays part of the comment
            if in_comment {
                continue;
            }
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }

        in_comment = raw.starts_with('#');
        if !in_comment {
            lines.push((i + 1, raw.to_string()));
        }
    }

    lines
}

fn parse_line(number: usize, line: &str) -> Result<(String, String)> {
    let Some((key, rest)) = line.split_once(':') else {
        return Err(Error::Ldif {
            line: number,
            message: format!("expected 'attribute: value', got '{line}'"),
        });
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Ldif {
            line: number,
            message: "missing attribute name".to_string(),
        });
    }

    let value = if let Some(encoded) = rest.strip_prefix(':') {
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| Error::Ldif {
            line: number,
            message: format!("invalid base64 value for '{key}': {e}"),
        })?;
        String::from_utf8(bytes).map_err(|_| Error::Ldif {
            line: number,
            message: format!("base64 value for '{key}' is not UTF-8"),
        })?
    } else {
        rest.trim_start_matches(' ').to_string()
    };

    Ok((key.to_string(), value))
}

/// Whether a value can be written as-is after `name: `.
pub fn is_safe(value: &str) -> bool {
    let Some(first) = value.bytes().next() else {
        return true;
    };
    if matches!(first, b' ' | b':' | b'<') || value.ends_with(' ') {
        return false;
    }
    value
        .bytes()
        .all(|b| b.is_ascii() && !matches!(b, b'\0' | b'\n' | b'\r'))
}

/// Append one attribute line, base64-encoding and folding as needed.
pub fn write_line(out: &mut String, name: &str, value: &str) {
    let line = if is_safe(value) {
        format!("{name}: {value}")
    } else {
        format!("{name}:: {}", STANDARD.encode(value.as_bytes()))
    };
    fold_into(out, &line);
}

fn fold_into(out: &mut String, line: &str) {
    // Lines are ASCII at this point, so byte offsets are char boundaries
    let mut rest = line;
    let mut width = FOLD_WIDTH;
    while rest.len() > width {
        let (head, tail) = rest.split_at(width);
        out.push_str(head);
        out.push_str("\n ");
        rest = tail;
        width = FOLD_WIDTH - 1;
    }
    out.push_str(rest);
    out.push('\n');
}

/// A change record for `ldapmodify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    Add {
        dn: String,
        attributes: Vec<(String, String)>,
    },
    /// Replace each listed attribute with a single value
    Modify {
        dn: String,
        replace: Vec<(String, String)>,
    },
    Delete {
        dn: String,
    },
}

impl ChangeRecord {
    pub fn dn(&self) -> &str {
        match self {
            Self::Add { dn, .. } | Self::Modify { dn, .. } | Self::Delete { dn } => dn,
        }
    }

    /// Render the record as LDIF.
    pub fn to_ldif(&self) -> String {
        let mut out = String::new();
        write_line(&mut out, "dn", self.dn());

        match self {
            Self::Add { attributes, .. } => {
                out.push_str("changetype: add\n");
                for (name, value) in attributes {
                    write_line(&mut out, name, value);
                }
            }
            Self::Modify { replace, .. } => {
                out.push_str("changetype: modify\n");
                for (name, value) in replace {
                    out.push_str(&format!("replace: {name}\n"));
                    write_line(&mut out, name, value);
                    out.push_str("-\n");
                }
            }
            Self::Delete { .. } => out.push_str("changetype: delete\n"),
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paragraphs() {
        let text = "dn: olcDatabase={1}mdb,cn=config\nolcSuffix: dc=a\n\ndn: olcDatabase={2}mdb,cn=config\nolcSuffix: dc=b\n";
        let entries = parse(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].dn.as_deref(),
            Some("olcDatabase={1}mdb,cn=config")
        );
        assert_eq!(entries[1].last("olcsuffix"), Some("dc=b"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_unfold_continuation_lines() {
        let text = "dn: olcDatabase={1}mdb,cn=config\nolcDbDirectory: /var/lib/ld\n ap/exam\n ple\n";
        let entries = parse(text).unwrap();
        assert_eq!(
            entries[0].last("olcDbDirectory"),
            Some("/var/lib/ldap/example")
        );
    }

    #[test]
    fn test_base64_value() {
        // "cn=admin,dc=ex" base64
        let text = "olcSuffix: dc=ex\nolcRootDN:: Y249YWRtaW4sZGM9ZXg=\n";
        let entries = parse(text).unwrap();
        assert_eq!(entries[0].last("olcRootDN"), Some("cn=admin,dc=ex"));
    }

    #[test]
    fn test_extra_fill_spaces_are_skipped() {
        let entries = parse("dn: cn=x\nolcSuffix:   dc=a\nolcDbDirectory:/var/lib/ldap\n").unwrap();
        assert_eq!(entries[0].last("olcSuffix"), Some("dc=a"));
        assert_eq!(entries[0].last("olcDbDirectory"), Some("/var/lib/ldap"));
    }

    #[test]
    fn test_invalid_base64_is_error() {
        let err = parse("olcRootDN:: !!!not base64\n").unwrap_err();
        assert!(matches!(err, Error::Ldif { line: 1, .. }));
    }

    #[test]
    fn test_comments_and_version_ignored() {
        let text = "version: 1\n# a comment\n  folded comment\ndn: cn=x\nolcSuffix: dc=x\n";
        let entries = parse(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attributes, vec![("olcSuffix".into(), "dc=x".into())]);
    }

    #[test]
    fn test_line_without_colon_is_error() {
        let err = parse("dn: cn=x\ngarbage\n").unwrap_err();
        assert!(matches!(err, Error::Ldif { line: 2, .. }));
    }

    #[test]
    fn test_unsafe_values_are_base64() {
        assert!(is_safe("dc=example,dc=com"));
        assert!(!is_safe(" leading space"));
        assert!(!is_safe(":colon"));
        assert!(!is_safe("trailing "));
        assert!(!is_safe("ünïcode"));

        let mut out = String::new();
        write_line(&mut out, "olcRootPW", ":x");
        assert_eq!(out, "olcRootPW:: Ong=\n");
    }

    #[test]
    fn test_long_lines_fold_and_parse_back() {
        let long = format!("/var/lib/ldap/{}", "x".repeat(150));
        let mut out = String::new();
        write_line(&mut out, "olcDbDirectory", &long);
        assert!(out.lines().all(|l| l.len() <= FOLD_WIDTH));
        assert!(out.lines().skip(1).all(|l| l.starts_with(' ')));

        let entries = parse(&out).unwrap();
        assert_eq!(entries[0].last("olcDbDirectory"), Some(long.as_str()));
    }

    #[test]
    fn test_modify_record() {
        let record = ChangeRecord::Modify {
            dn: "olcDatabase={1}mdb,cn=config".into(),
            replace: vec![
                ("olcReadOnly".into(), "TRUE".into()),
                ("olcSizeLimit".into(), "500".into()),
            ],
        };
        assert_eq!(
            record.to_ldif(),
            "dn: olcDatabase={1}mdb,cn=config\n\
             changetype: modify\n\
             replace: olcReadOnly\n\
             olcReadOnly: TRUE\n\
             -\n\
             replace: olcSizeLimit\n\
             olcSizeLimit: 500\n\
             -\n"
        );
    }

    #[test]
    fn test_delete_record() {
        let record = ChangeRecord::Delete {
            dn: "olcDatabase={2}hdb,cn=config".into(),
        };
        assert_eq!(
            record.to_ldif(),
            "dn: olcDatabase={2}hdb,cn=config\nchangetype: delete\n"
        );
    }
}
