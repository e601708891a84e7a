use std::io::Write;

use clap::Parser;

use crate::builtins::{BuiltinCommand, BuiltinExitCode};
use crate::jobs::JobState;
use crate::shell::Shell;
use crate::{error, sys};

/// Resume a suspended job in the background.
#[derive(Parser)]
pub(crate) struct BgCommand {
    /// The job to resume (`%N`); defaults to the most recent job.
    job_spec: Option<String>,
}

#[async_trait::async_trait]
impl BuiltinCommand for BgCommand {
    async fn execute(&self, shell: &mut Shell) -> Result<BuiltinExitCode, error::Error> {
        let spec = self.job_spec.as_deref().unwrap_or("%%");
        let Some(job) = shell.jobs.resolve_job_spec(spec) else {
            writeln!(std::io::stderr(), "bg: {spec}: no such job")?;
            return Ok(BuiltinExitCode::Custom(1));
        };

        let mut job = job.lock().unwrap();
        sys::signal::continue_process_group(job.pgid())?;
        job.set_state(JobState::Running);
        job.set_running_in_background(true);

        writeln!(std::io::stdout(), "[{}] {} &", job.id(), job.command_line())?;

        Ok(BuiltinExitCode::Success)
    }
}
