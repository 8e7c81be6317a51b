use crate::env::Environment;
use crate::error::BindError;
use crate::parsed::ParsedCommand;
use crate::schema::CommandSchema;
use anyhow::Result;
use std::io::{Read, Write};

/// Outcome of running one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Success,
    Failure,
}

impl ExecutionResult {
    pub fn from_success(success: bool) -> Self {
        if success {
            ExecutionResult::Success
        } else {
            ExecutionResult::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == ExecutionResult::Success
    }

    /// Conventional process exit code: 0 for success, 1 otherwise.
    pub fn exit_code(self) -> u8 {
        match self {
            ExecutionResult::Success => 0,
            ExecutionResult::Failure => 1,
        }
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// `stdin` is the terminal, a redirected file or the buffered output of the
/// previous command in a pipe; `stdout` likewise. An `Err` is reported by the
/// runner and counts as [`ExecutionResult::Failure`].
pub trait ExecutableCommand {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult>;
}

/// Builds a typed command value from matched options and arguments.
pub trait Binder: Sized {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError>;
}

/// A registered command: its schema plus a way to instantiate it.
pub trait CommandFactory {
    fn schema(&self) -> &CommandSchema;

    /// Called only with a [`ParsedCommand`] that has no parser errors.
    /// For group commands, [`ParsedCommand::path`] names the selected child.
    fn create(&self, parsed: &ParsedCommand) -> Result<Box<dyn ExecutableCommand>, BindError>;
}

/// Name lookup over registered commands.
pub trait CommandRegistry {
    fn resolve(&self, name: &str) -> Option<&dyn CommandFactory>;
}

/// Later registrations shadow earlier ones with the same name or alias.
impl CommandRegistry for Vec<Box<dyn CommandFactory>> {
    fn resolve(&self, name: &str) -> Option<&dyn CommandFactory> {
        self.iter()
            .rev()
            .find(|factory| factory.schema().matches_name(name))
            .map(|factory| factory.as_ref())
    }
}
