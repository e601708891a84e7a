use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::jobs::JobState;
use crate::shell::Shell;
use crate::{error, sys};

/// Bring a job to the foreground and wait for it.
#[derive(Parser)]
pub(crate) struct FgCommand {
    /// The job to continue (`%N`); defaults to the most recent job.
    job_spec: Option<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for FgCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let spec = self.job_spec.as_deref().unwrap_or("%%");
        let Some(job) = shell.jobs.resolve_job_spec(spec) else {
            writeln!(std::io::stderr(), "fg: {spec}: no such job")?;
            return Ok(BuiltinExitCode::Custom(1));
        };

        {
            let mut job = job.lock().unwrap();
            writeln!(std::io::stdout(), "{}", job.command_line())?;

            job.set_running_in_background(false);
            sys::terminal::move_to_foreground(job.pgid())?;
            sys::signal::continue_process_group(job.pgid())?;
            job.set_state(JobState::Running);
        }

        shell.block_on_job(&job).await?;

        let exit_code = job.lock().unwrap().exit_code().unwrap_or(0);
        Ok(BuiltinExitCode::Custom(exit_code))
    }
}
