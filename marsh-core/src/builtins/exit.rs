use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Exit the shell.
#[derive(Parser)]
pub(crate) struct ExitCommand {
    /// The exit code; defaults to the last command's exit code.
    code: Option<i32>,
}

#[async_trait::async_trait]
impl BuiltinCommand for ExitCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        #[allow(clippy::cast_sign_loss)]
        let code = match self.code {
            Some(code) => (code & 0xFF) as u8,
            None => shell.last_return_code,
        };

        Ok(BuiltinExitCode::ExitShell(code))
    }
}
