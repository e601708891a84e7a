use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Display or change runtime shell options.
#[derive(Parser)]
pub(crate) struct SetoptCommand {
    /// The option to change; with no name, all options are listed.
    name: Option<String>,
    /// The new state, `on` or `off`.
    state: Option<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for SetoptCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let Some(name) = &self.name else {
            let mut stdout = std::io::stdout();
            for (name, value) in shell.options.entries() {
                writeln!(stdout, "{name} {}", if value { "on" } else { "off" })?;
            }
            return Ok(BuiltinExitCode::Success);
        };

        let value = match self.state.as_deref() {
            None | Some("on") => true,
            Some("off") => false,
            Some(other) => {
                writeln!(std::io::stderr(), "setopt: invalid state: {other}")?;
                return Ok(BuiltinExitCode::InvalidUsage);
            }
        };

        if let Err(err) = shell.options.set(name, value) {
            writeln!(std::io::stderr(), "setopt: {err}")?;
            return Ok(BuiltinExitCode::Custom(1));
        }

        Ok(BuiltinExitCode::Success)
    }
}
