use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Remove aliases.
#[derive(Parser)]
pub(crate) struct UnaliasCommand {
    /// The aliases to remove.
    #[arg(required = true)]
    names: Vec<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for UnaliasCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let mut exit_code = BuiltinExitCode::Success;

        for name in &self.names {
            if shell.aliases.remove(name).is_none() {
                writeln!(std::io::stderr(), "unalias: {name}: not found")?;
                exit_code = BuiltinExitCode::Custom(1);
            }
        }

        Ok(exit_code)
    }
}
