use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Define or display aliases.
#[derive(Parser)]
pub(crate) struct AliasCommand {
    /// Aliases to define (`name=text`) or display (`name`).
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    entries: Vec<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for AliasCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let mut stdout = std::io::stdout();

        if self.entries.is_empty() {
            let mut names: Vec<_> = shell.aliases.keys().cloned().collect();
            names.sort();
            for name in names {
                writeln!(stdout, "{name}={}", shell.aliases[&name])?;
            }
            return Ok(BuiltinExitCode::Success);
        }

        let mut exit_code = BuiltinExitCode::Success;
        for entry in &self.entries {
            if let Some((name, text)) = entry.split_once('=') {
                shell.aliases.insert(name.to_owned(), text.to_owned());
            } else if let Some(text) = shell.aliases.get(entry) {
                writeln!(stdout, "{entry}={text}")?;
            } else {
                writeln!(std::io::stderr(), "alias: {entry}: not found")?;
                exit_code = BuiltinExitCode::Custom(1);
            }
        }

        Ok(exit_code)
    }
}
