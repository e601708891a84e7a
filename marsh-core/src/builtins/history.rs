use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Display the command history.
#[derive(Parser)]
pub(crate) struct HistoryCommand {}

#[async_trait::async_trait]
impl BuiltinCommand for HistoryCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let mut stdout = std::io::stdout();
        for (index, entry) in shell.history.iter().enumerate() {
            writeln!(stdout, "{:5}  {entry}", index + 1)?;
        }

        Ok(BuiltinExitCode::Success)
    }
}
