use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Print the current working directory.
#[derive(Parser)]
pub(crate) struct PwdCommand {}

#[async_trait::async_trait]
impl BuiltinCommand for PwdCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        writeln!(std::io::stdout(), "{}", shell.cwd.display())?;
        Ok(BuiltinExitCode::Success)
    }
}
