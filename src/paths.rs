//! Centralized path resolution for slapdconf
//!
//! # Environment Variables
//!
//! - `SLAPDCONF_CONFIG_DIR` - Override config directory (e.g., `/etc/slapdconf`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `SLAPDCONF_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/slapdconf` (if set)
//! 3. `~/.config/slapdconf`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SLAPDCONF_CONFIG_DIR";

/// File name of the catalog inside the config directory
pub const CATALOG_FILE: &str = "slapdconf.toml";

/// Get the slapdconf config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("slapdconf");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("slapdconf");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of the catalog to load: the `--config` override or the default location
pub fn catalog_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(config_dir()?.join(CATALOG_FILE)),
    }
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serializes tests that touch the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `key` set (or removed when `value` is `None`), then restore it
    fn with_env<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let original = env::var(key).ok();
        // SAFETY: all environment mutation in these tests happens under ENV_LOCK
        unsafe {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let result = f();
        // SAFETY: as above
        unsafe {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env(ENV_CONFIG_DIR, Some("/etc/slapdconf"), || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/etc/slapdconf"));
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env(ENV_CONFIG_DIR, Some("~/ldap/catalog"), || {
            assert_eq!(config_dir().unwrap(), home.join("ldap").join("catalog"));
        });
    }

    #[test]
    fn test_catalog_path_prefers_override() {
        let path = catalog_path(Some(Path::new("/srv/ldap.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/srv/ldap.toml"));

        with_env(ENV_CONFIG_DIR, Some("/etc/slapdconf"), || {
            assert_eq!(
                catalog_path(None).unwrap(),
                PathBuf::from("/etc/slapdconf/slapdconf.toml")
            );
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/test/path"), home.join("test").join("path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
