use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// Change the current working directory.
#[derive(Parser)]
pub(crate) struct CdCommand {
    /// The directory to change to; defaults to the home directory. `-` changes
    /// back to the previous directory.
    target: Option<PathBuf>,
}

#[async_trait::async_trait]
impl BuiltinCommand for CdCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let target = match &self.target {
            Some(target) if target.as_os_str() == "-" => match std::env::var("OLDPWD") {
                Ok(oldpwd) => PathBuf::from(oldpwd),
                Err(_) => {
                    writeln!(std::io::stderr(), "cd: OLDPWD not set")?;
                    return Ok(BuiltinExitCode::Custom(1));
                }
            },
            Some(target) => target.clone(),
            None => shell.home.clone(),
        };

        let target = if target.is_absolute() {
            target
        } else {
            shell.cwd.join(target)
        };

        let target = match target.canonicalize() {
            Ok(target) => target,
            Err(err) => {
                writeln!(std::io::stderr(), "cd: {}: {err}", target.display())?;
                return Ok(BuiltinExitCode::Custom(1));
            }
        };

        if let Err(err) = std::env::set_current_dir(&target) {
            writeln!(std::io::stderr(), "cd: {}: {err}", target.display())?;
            return Ok(BuiltinExitCode::Custom(1));
        }

        std::env::set_var("OLDPWD", &shell.cwd);
        shell.cwd = target;
        std::env::set_var("PWD", &shell.cwd);

        Ok(BuiltinExitCode::Success)
    }
}
