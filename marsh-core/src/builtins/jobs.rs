use std::io::Write;

use clap::Parser;
use itertools::Itertools;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::error;
use crate::shell::Shell;

/// List the jobs the shell is tracking.
#[derive(Parser)]
pub(crate) struct JobsCommand {}

#[async_trait::async_trait]
impl BuiltinCommand for JobsCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let mut stdout = std::io::stdout();

        let lines: Vec<_> = shell
            .jobs
            .iter()
            .map(|job| {
                let job = job.lock().unwrap();
                (job.id(), job.to_string())
            })
            .sorted()
            .collect();

        for (_, line) in lines {
            writeln!(stdout, "{line}")?;
        }

        Ok(BuiltinExitCode::Success)
    }
}
