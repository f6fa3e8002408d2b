//! Error taxonomy for reconciliation runs.
//!
//! Errors are split by when they happen and how far they reach:
//! validation errors are detected before any command is issued and only
//! reject the offending entry, discovery and ambiguity errors abort the whole
//! run, and convergence errors fail a single entry while carrying enough
//! detail to replay the write by hand.

use crate::types::Operation;
use thiserror::Error;

/// Errors that can occur while reconciling declarative resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The read query failed or returned output that could not be parsed.
    #[error("discovery failed: {message}")]
    Discovery {
        /// What went wrong
        message: String,
        /// Diagnostic output of the underlying command, if any
        diagnostic: String,
    },

    /// A create/update/delete write failed.
    #[error("failed to {operation} '{name}': {diagnostic}")]
    Convergence {
        /// Identity of the entry being converged
        name: String,
        /// Which write was attempted
        operation: Operation,
        /// The exact request payload sent to the managed system
        payload: String,
        /// Diagnostic output of the underlying command
        diagnostic: String,
    },

    /// A desired entry (or helper input) is invalid.
    #[error("invalid input: {message}")]
    Validation {
        /// Description of the problem
        message: String,
    },

    /// Discovery returned several records with the same identity key.
    #[error("ambiguous state: {count} {kind} instances share the identity '{name}'")]
    AmbiguousState {
        /// Resource kind
        kind: String,
        /// The duplicated identity key value
        name: String,
        /// How many records carry it
        count: usize,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a discovery error with the command diagnostic attached.
    pub fn discovery(message: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Whether this error aborts the entire run rather than a single entry.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::Discovery { .. } | Self::AmbiguousState { .. } | Self::Other(_)
        )
    }

    /// The request payload, for convergence errors.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Convergence { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// The underlying command diagnostic, if the error carries one.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Discovery { diagnostic, .. } | Self::Convergence { diagnostic, .. }
                if !diagnostic.is_empty() =>
            {
                Some(diagnostic)
            }
            _ => None,
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
