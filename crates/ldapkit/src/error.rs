//! Error types for OpenLDAP operations.
//!
//! The LDAP client tools exit with the LDAP result code of the failed
//! operation, so errors are categorized from the exit code first and the
//! diagnostic text second. The category tells an operator whether the
//! request itself was malformed or the server could not be reached.

use thiserror::Error;

/// Categories of OpenLDAP errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Server unreachable or connection dropped
    Connectivity,
    /// The server rejected the request content (syntax, schema, constraints)
    InvalidInput,
    /// Authentication or authorization failure
    Permission,
    /// The addressed entry does not exist
    NotFound,
    /// The command did not finish in time
    Timeout,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity | Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connectivity => "Cannot reach the directory server",
            Self::InvalidInput => "Request rejected by the directory server",
            Self::Permission => "Access denied",
            Self::NotFound => "Entry not found",
            Self::Timeout => "Command timed out",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connectivity => "Check that slapd is running and the connection URI is correct",
            Self::InvalidInput => {
                "Check the attribute values in the catalog (DN syntax, backend, paths)"
            }
            Self::Permission => {
                "Run as a user mapped to cn=config (e.g. root over ldapi:/// with SASL EXTERNAL)"
            }
            Self::NotFound => "The entry may have been removed outside this tool; re-run to rediscover",
            Self::Timeout => "Increase connection.timeout_secs or check server load",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during OpenLDAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be contacted
    #[error("cannot contact server: {message}")]
    Connectivity {
        /// Diagnostic from the client tool
        message: String,
    },

    /// The server rejected the request content
    #[error("request rejected: {message}")]
    InvalidInput {
        /// Diagnostic from the client tool
        message: String,
    },

    /// Authentication or authorization failure
    #[error("permission denied: {message}")]
    Permission {
        /// Diagnostic from the client tool
        message: String,
    },

    /// The addressed entry does not exist
    #[error("no such object: {message}")]
    NotFound {
        /// Diagnostic from the client tool
        message: String,
    },

    /// A client tool did not finish within the configured timeout
    #[error("{program} timed out after {secs}s")]
    Timeout {
        /// Program that was killed
        program: String,
        /// Timeout that expired
        secs: u64,
    },

    /// A client tool is not installed or not on PATH
    #[error("{program} not found. Install the OpenLDAP client tools")]
    ToolNotFound {
        /// Program that could not be started
        program: String,
    },

    /// Command failed for an unrecognized reason
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Malformed LDIF
    #[error("invalid LDIF at line {line}: {message}")]
    Ldif {
        /// Line number where the parse error occurred (1-indexed, after unfolding)
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A helper received the wrong number of inputs
    #[error("{function} expects exactly {expected} input(s), received {received}")]
    Arity {
        /// Name of the helper
        function: &'static str,
        /// Number of inputs required
        expected: usize,
        /// Number of inputs given
        received: usize,
    },

    /// Invalid value passed to a helper
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connectivity { .. } => ErrorCategory::Connectivity,
            Error::InvalidInput { .. }
            | Error::Ldif { .. }
            | Error::Arity { .. }
            | Error::InvalidValue(_) => ErrorCategory::InvalidInput,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            _ => ErrorCategory::Other,
        }
    }

    /// Create an error from the exit code and stderr of `ldapsearch`/`ldapmodify`.
    ///
    /// The tools exit with the LDAP result code; `-1`/`255` means the
    /// server could not be contacted at all.
    pub fn from_tool_output(program: &str, code: Option<i32>, stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let stderr_lower = message.to_lowercase();

        match code {
            Some(-1 | 255 | 51 | 52) => return Error::Connectivity { message },
            Some(32) => return Error::NotFound { message },
            Some(8 | 13 | 48 | 49 | 50) => return Error::Permission { message },
            Some(16..=21 | 34 | 53 | 64..=69 | 80) => return Error::InvalidInput { message },
            _ => {}
        }

        // Fall back to the diagnostic text
        if stderr_lower.contains("can't contact ldap server")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("server is unavailable")
        {
            return Error::Connectivity { message };
        }

        if stderr_lower.contains("no such object") {
            return Error::NotFound { message };
        }

        if stderr_lower.contains("insufficient access")
            || stderr_lower.contains("invalid credentials")
            || stderr_lower.contains("permission denied")
        {
            return Error::Permission { message };
        }

        if stderr_lower.contains("invalid syntax")
            || stderr_lower.contains("invalid dn syntax")
            || stderr_lower.contains("undefined attribute type")
            || stderr_lower.contains("object class violation")
            || stderr_lower.contains("unwilling to perform")
            || stderr_lower.contains("ldif")
        {
            return Error::InvalidInput { message };
        }

        Error::CommandFailed {
            message: format!(
                "{program} failed{}",
                code.map(|c| format!(" with exit code {c}"))
                    .unwrap_or_default()
            ),
            stderr: message,
        }
    }

    /// Create an error from a failure to run a client tool at all.
    pub fn from_spawn(program: &str, timeout_secs: u64, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::ToolNotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::TimedOut => Error::Timeout {
                program: program.to_string(),
                secs: timeout_secs,
            },
            _ => Error::Io(err),
        }
    }
}

impl From<Error> for declarative::Error {
    fn from(err: Error) -> Self {
        match err.category() {
            ErrorCategory::InvalidInput => declarative::Error::validation(err.to_string()),
            _ => declarative::Error::Other(err.to_string()),
        }
    }
}

/// Result type for OpenLDAP operations.
pub type Result<T> = std::result::Result<T, Error>;
