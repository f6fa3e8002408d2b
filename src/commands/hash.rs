//! `hash-password` - print a rootpw value as slapd stores it

use anyhow::Result;
use ldapkit::{Scheme, password};

use crate::Context;
use crate::cli::HashArgs;
use crate::commands::declarative::host_context;
use crate::paths;
use crate::runner;
use crate::schema::SlapdConfig;

pub fn run(ctx: &Context, args: HashArgs) -> Result<()> {
    let context = match args.context {
        Some(context) => context,
        None => default_context(ctx)?,
    };
    log::debug!("Hashing with salt context '{context}'");

    let inputs: Vec<&str> = args.inputs.iter().map(String::as_str).collect();
    println!("{}", hash(&inputs, &context, args.scheme.into())?);
    Ok(())
}

/// The catalog's host context when a catalog exists, else the hostname
fn default_context(ctx: &Context) -> Result<String> {
    let path = paths::catalog_path(ctx.config.as_deref())?;
    if path.exists() {
        return host_context(&SlapdConfig::load(&path)?);
    }
    runner::hostname()
}

fn hash(inputs: &[&str], context: &str, scheme: Scheme) -> Result<String> {
    Ok(password::transform_with(inputs, context, scheme)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_per_context() {
        let a = hash(&["secret"], "ldap01", Scheme::Ssha).unwrap();
        assert_eq!(a, hash(&["secret"], "ldap01", Scheme::Ssha).unwrap());
        assert_ne!(a, hash(&["secret"], "ldap02", Scheme::Ssha).unwrap());
        assert!(password::verify("secret", &a).unwrap());
    }

    #[test]
    fn test_hash_rejects_two_inputs() {
        let err = hash(&["a", "b"], "ldap01", Scheme::Ssha).unwrap_err();
        assert!(err.to_string().contains("exactly 1"));
    }
}
