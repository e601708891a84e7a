//! Infrastructure for shell built-in commands.

mod alias;
mod bg;
mod cd;
mod exit;
mod export;
mod fg;
mod history;
mod jobs;
mod pwd;
mod setopt;
mod unalias;
mod unset;

use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::error;
use crate::shell::Shell;

/// Exit status of a built-in command.
pub enum BuiltinExitCode {
    /// The command was successful.
    Success,
    /// The inputs to the command were invalid.
    InvalidUsage,
    /// The command yielded a specific exit code.
    Custom(u8),
    /// The command requests that the shell exit with the given code.
    ExitShell(u8),
}

impl From<BuiltinExitCode> for u8 {
    fn from(code: BuiltinExitCode) -> Self {
        match code {
            BuiltinExitCode::Success => 0,
            BuiltinExitCode::InvalidUsage => 2,
            BuiltinExitCode::Custom(code) | BuiltinExitCode::ExitShell(code) => code,
        }
    }
}

/// Trait implemented by built-in shell commands.
#[async_trait::async_trait]
pub trait BuiltinCommand: clap::Parser + Send + Sync {
    /// Executes the parsed command against the given shell.
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error>;
}

type ExecuteFn =
    for<'a> fn(&'a mut Shell, Vec<String>) -> BoxFuture<'a, Result<BuiltinExitCode, error::Error>>;

/// Registration record for a built-in command.
pub struct Registration {
    pub(crate) execute: ExecuteFn,
}

fn execute_builtin<T: BuiltinCommand>(
    shell: &mut Shell,
    args: Vec<String>,
) -> BoxFuture<'_, Result<BuiltinExitCode, error::Error>> {
    Box::pin(async move {
        match T::try_parse_from(args) {
            Ok(command) => command.execute(shell).await,
            Err(err) => {
                let _ = err.print();
                Ok(BuiltinExitCode::InvalidUsage)
            }
        }
    })
}

fn builtin<T: BuiltinCommand>() -> Registration {
    Registration {
        execute: execute_builtin::<T>,
    }
}

pub(crate) fn default_builtins() -> HashMap<&'static str, Registration> {
    HashMap::from([
        ("alias", builtin::<alias::AliasCommand>()),
        ("bg", builtin::<bg::BgCommand>()),
        ("cd", builtin::<cd::CdCommand>()),
        ("exit", builtin::<exit::ExitCommand>()),
        ("export", builtin::<export::ExportCommand>()),
        ("fg", builtin::<fg::FgCommand>()),
        ("history", builtin::<history::HistoryCommand>()),
        ("jobs", builtin::<jobs::JobsCommand>()),
        ("pwd", builtin::<pwd::PwdCommand>()),
        ("setopt", builtin::<setopt::SetoptCommand>()),
        ("unalias", builtin::<unalias::UnaliasCommand>()),
        ("unset", builtin::<unset::UnsetCommand>()),
    ])
}

/// Names of the built-in commands the shell registers.
pub fn builtin_names() -> &'static [&'static str] {
    &[
        "alias", "bg", "cd", "exit", "export", "fg", "history", "jobs", "pwd", "setopt",
        "unalias", "unset",
    ]
}
