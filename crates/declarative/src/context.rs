//! Collaborator traits
//!
//! These traits let the reconciliation core run without depending on
//! specific implementations of command execution, progress display or
//! user interaction. Providers receive a [`CommandExecutor`] at
//! construction instead of registering commands globally, so tests can
//! substitute a recording double.

use crate::types::{ApplyResult, CommandOutput};
use std::io;

/// Runs external commands against the managed system
///
/// Implementations must be safe to share between worker threads.
pub trait CommandExecutor: Send + Sync {
    /// Run a program to completion, optionally feeding `input` on stdin
    ///
    /// A non-zero exit is not an error at this level: it is reported through
    /// [`CommandOutput::success`]. Errors are reserved for failing to run the
    /// program at all, including hitting the executor's timeout
    /// ([`io::ErrorKind::TimedOut`]).
    fn run(&self, program: &str, args: &[&str], input: Option<&str>) -> io::Result<CommandOutput>;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn run(&self, program: &str, args: &[&str], input: Option<&str>) -> io::Result<CommandOutput> {
        (**self).run(program, args, input)
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called before a batch of writes starts
    fn on_batch_start(&mut self, count: usize, parallel: bool);

    /// Called when starting to converge a single entry
    fn on_entry_start(&mut self, name: &str, description: &str);

    /// Called when an entry's convergence completes
    fn on_entry_complete(&mut self, name: &str, result: &ApplyResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize, _parallel: bool) {}
    fn on_entry_start(&mut self, _name: &str, _description: &str) {}
    fn on_entry_complete(&mut self, _name: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> io::Result<bool> {
        Ok(false)
    }
}
