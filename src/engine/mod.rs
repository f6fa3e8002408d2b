//! Execution engine for slapdconf
//!
//! The engine wraps the reconciliation core with terminal output:
//! 1. Diffing - Show the plan built from one discovery pass
//! 2. Executing - Confirm, apply with progress, summarize

pub mod differ;
pub mod executor;

pub use executor::{ApplyOptions, execute};

/// `cn=config` attributes whose values never reach the terminal
const SECRET_ATTRIBUTES: &[&str] = &["olcRootPW"];

/// Hide secret attribute values in an LDIF payload
///
/// Folded continuation lines of a hidden value are dropped with it.
pub fn redact_payload(payload: &str) -> String {
    let mut lines = Vec::new();
    let mut hiding = false;
    for line in payload.lines() {
        if hiding && line.starts_with(' ') {
            continue;
        }
        let secret = SECRET_ATTRIBUTES.iter().find(|attr| {
            line.get(..attr.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(attr))
                && line[attr.len()..].starts_with(':')
        });
        hiding = secret.is_some();
        match secret {
            Some(attr) => lines.push(format!("{attr}: [redacted]")),
            None => lines.push(line.to_string()),
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_payload() {
        let payload = "dn: olcDatabase={1}mdb,cn=config\n\
                       changetype: modify\n\
                       replace: olcRootPW\n\
                       olcRootPW: {SSHA}abcd\n\
                       -\n";
        let redacted = redact_payload(payload);
        assert!(redacted.contains("replace: olcRootPW"));
        assert!(redacted.contains("olcRootPW: [redacted]"));
        assert!(!redacted.contains("{SSHA}"));
    }

    #[test]
    fn test_redact_base64_value() {
        assert_eq!(redact_payload("olcRootPW:: e1NTSEF9"), "olcRootPW: [redacted]");
        assert_eq!(redact_payload("olcRootDN: cn=a"), "olcRootDN: cn=a");
    }

    #[test]
    fn test_redact_drops_folded_continuation() {
        let value = format!("{{SSHA512}}{}", "A".repeat(96));
        let payload = ldapkit::ldif::ChangeRecord::Modify {
            dn: "olcDatabase={1}mdb,cn=config".into(),
            replace: vec![
                ("olcRootPW".into(), value),
                ("olcReadOnly".into(), "TRUE".into()),
            ],
        }
        .to_ldif();
        assert!(payload.contains("\n A"));

        let redacted = redact_payload(&payload);
        assert!(!redacted.contains("AAAA"));
        assert!(redacted.contains("olcRootPW: [redacted]"));
        assert!(redacted.contains("olcReadOnly: TRUE"));
    }
}
