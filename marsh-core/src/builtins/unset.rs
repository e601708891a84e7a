use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Remove local variables.
#[derive(Parser)]
pub(crate) struct UnsetCommand {
    /// The variables to remove.
    #[arg(required = true)]
    names: Vec<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for UnsetCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        for name in &self.names {
            shell.unset_local_variable(name);
        }

        Ok(BuiltinExitCode::Success)
    }
}
