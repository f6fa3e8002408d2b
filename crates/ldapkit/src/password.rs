//! Salted password hashing in the `{SSHA}` format slapd stores.
//!
//! The salt is derived from a per-host context string instead of being
//! random, so hashing the same password twice on the same host gives the
//! same stored value and an unchanged catalog compares equal.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Supported salted hash schemes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// SHA-1 digest, 4-byte salt
    #[default]
    Ssha,
    /// SHA-256 digest, 8-byte salt
    Ssha256,
}

impl Scheme {
    /// The tag slapd expects in front of the encoded value.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Ssha => "{SSHA}",
            Self::Ssha256 => "{SSHA256}",
        }
    }

    fn salt_len(self) -> usize {
        match self {
            Self::Ssha => 4,
            Self::Ssha256 => 8,
        }
    }

    fn digest_len(self) -> usize {
        match self {
            Self::Ssha => 20,
            Self::Ssha256 => 32,
        }
    }

    fn digest(self, password: &[u8], salt: &[u8]) -> Vec<u8> {
        match self {
            Self::Ssha => {
                let mut hasher = Sha1::new();
                hasher.update(password);
                hasher.update(salt);
                hasher.finalize().to_vec()
            }
            Self::Ssha256 => {
                let mut hasher = Sha256::new();
                hasher.update(password);
                hasher.update(salt);
                hasher.finalize().to_vec()
            }
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "{SSHA}" => Some(Self::Ssha),
            "{SSHA256}" => Some(Self::Ssha256),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssha => write!(f, "ssha"),
            Self::Ssha256 => write!(f, "ssha256"),
        }
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssha" => Ok(Self::Ssha),
            "ssha256" => Ok(Self::Ssha256),
            other => Err(Error::InvalidValue(format!(
                "unknown password scheme '{other}' (expected ssha or ssha256)"
            ))),
        }
    }
}

/// Salt bytes for a context: the leading bytes of its SHA-256 digest.
fn salt_for(context: &str, len: usize) -> Vec<u8> {
    Sha256::digest(context.as_bytes())[..len].to_vec()
}

/// Hash a password with the given scheme and context-derived salt.
pub fn hash(password: &str, context: &str, scheme: Scheme) -> String {
    let salt = salt_for(context, scheme.salt_len());
    let mut bytes = scheme.digest(password.as_bytes(), &salt);
    bytes.extend_from_slice(&salt);
    format!("{}{}", scheme.tag(), STANDARD.encode(bytes))
}

/// Whether a value already carries a `{SCHEME}` prefix.
pub fn is_hashed(value: &str) -> bool {
    value.strip_prefix('{').is_some_and(|rest| {
        rest.split_once('}').is_some_and(|(scheme, _)| {
            !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    })
}

/// Turn exactly one plaintext input into its `{SSHA}` form.
///
/// Pre-hashed inputs are returned unchanged.
pub fn transform(inputs: &[&str], context: &str) -> Result<String> {
    transform_with(inputs, context, Scheme::Ssha)
}

/// [`transform`] with an explicit scheme.
pub fn transform_with(inputs: &[&str], context: &str, scheme: Scheme) -> Result<String> {
    let [input] = inputs else {
        return Err(Error::Arity {
            function: "transform",
            expected: 1,
            received: inputs.len(),
        });
    };

    if is_hashed(input) {
        return Ok((*input).to_string());
    }
    Ok(hash(input, context, scheme))
}

/// Check a plaintext password against a stored `{SSHA}`/`{SSHA256}` value.
pub fn verify(password: &str, stored: &str) -> Result<bool> {
    let (scheme, encoded) = stored
        .find('}')
        .and_then(|end| {
            let (tag, rest) = stored.split_at(end + 1);
            Scheme::from_tag(tag).map(|scheme| (scheme, rest))
        })
        .ok_or_else(|| Error::InvalidValue("stored value is not {SSHA} or {SSHA256}".into()))?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidValue(format!("stored hash is not valid base64: {e}")))?;
    if bytes.len() <= scheme.digest_len() {
        return Err(Error::InvalidValue("stored hash has no salt".into()));
    }

    let (digest, salt) = bytes.split_at(scheme.digest_len());
    Ok(scheme.digest(password.as_bytes(), salt) == digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_context_is_deterministic() {
        let a = transform(&["secret"], "host-A").unwrap();
        let b = transform(&["secret"], "host-A").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("{SSHA}"));
    }

    #[test]
    fn test_different_context_differs() {
        let a = transform(&["secret"], "host-A").unwrap();
        let b = transform(&["secret"], "host-B").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_encoded_length() {
        // 20-byte digest + 4-byte salt = 24 bytes = 32 base64 chars
        let hashed = hash("secret", "host", Scheme::Ssha);
        assert_eq!(hashed.len(), "{SSHA}".len() + 32);

        // 32-byte digest + 8-byte salt = 40 bytes = 56 base64 chars
        let hashed = hash("secret", "host", Scheme::Ssha256);
        assert_eq!(hashed.len(), "{SSHA256}".len() + 56);
    }

    #[test]
    fn test_wrong_arity() {
        let err = transform(&[], "host").unwrap_err();
        assert!(matches!(err, Error::Arity { received: 0, .. }));

        let err = transform(&["a", "b"], "host").unwrap_err();
        assert_eq!(
            err.to_string(),
            "transform expects exactly 1 input(s), received 2"
        );
    }

    #[test]
    fn test_prehashed_passes_through() {
        let stored = "{SSHA}abcdefghijklmnopqrstuvwxyz012345";
        assert!(is_hashed(stored));
        assert_eq!(transform(&[stored], "host").unwrap(), stored);
        assert!(!is_hashed("{not a scheme"));
        assert!(!is_hashed("plain"));
    }

    #[test]
    fn test_verify() {
        for scheme in [Scheme::Ssha, Scheme::Ssha256] {
            let stored = hash("secret", "host", scheme);
            assert!(verify("secret", &stored).unwrap());
            assert!(!verify("other", &stored).unwrap());
        }
        assert!(verify("secret", "{CRYPT}x").is_err());
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("SSHA256".parse::<Scheme>().unwrap(), Scheme::Ssha256);
        assert!("md5".parse::<Scheme>().is_err());
    }
}
