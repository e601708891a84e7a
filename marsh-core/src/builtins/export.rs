use std::io::Write;

use clap::Parser;
use itertools::Itertools;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Set environment variables for child processes.
#[derive(Parser)]
pub(crate) struct ExportCommand {
    /// Variables to export, as `name=value` or as the name of a local variable.
    entries: Vec<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for ExportCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        if self.entries.is_empty() {
            let mut stdout = std::io::stdout();
            for (name, value) in std::env::vars().sorted() {
                writeln!(stdout, "{name}={value}")?;
            }
            return Ok(BuiltinExitCode::Success);
        }

        for entry in &self.entries {
            if let Some((name, value)) = entry.split_once('=') {
                std::env::set_var(name, value);
            } else {
                // A bare name exports the local variable's current value.
                let value = shell.local_variable_or(entry, "");
                std::env::set_var(entry, value);
            }
        }

        Ok(BuiltinExitCode::Success)
    }
}
