//! Tracking of child processes as jobs.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::error;

/// Shell-internal identifier for a job.
pub type JobId = u64;

/// Shared handle to a tracked job. Multiple evaluation steps may inspect the same
/// job, so handles are reference-counted.
pub type JobRef = Arc<Mutex<Job>>;

/// The current execution state of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// The job is running.
    Running,
    /// The job was stopped by a signal.
    Suspended,
    /// The job has exited with the given code.
    Exited(u8),
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Suspended => write!(f, "Suspended"),
            Self::Exited(code) => write!(f, "Exited({code})"),
        }
    }
}

/// A launched child process tracked by the shell.
#[derive(Debug)]
pub struct Job {
    pid: i32,
    pgid: i32,
    command_line: String,
    id: JobId,
    state: JobState,
    running_in_background: bool,
}

impl Job {
    pub(crate) fn new(pid: i32, pgid: i32, command_line: String, id: JobId) -> Self {
        Self {
            pid,
            pgid,
            command_line,
            id,
            state: JobState::Running,
            running_in_background: false,
        }
    }

    /// Returns the job's process id.
    pub const fn pid(&self) -> i32 {
        self.pid
    }

    /// Returns the job's process group id.
    pub const fn pgid(&self) -> i32 {
        self.pgid
    }

    /// Returns the job's shell-internal id.
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the command line the job was launched from.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Returns the job's current state.
    pub const fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    /// Checks whether the job has exited.
    pub const fn exited(&self) -> bool {
        matches!(self.state, JobState::Exited(_))
    }

    /// Returns the job's exit code, if it has exited.
    pub const fn exit_code(&self) -> Option<u8> {
        match self.state {
            JobState::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Checks whether the job was stopped by a signal.
    pub const fn is_suspended(&self) -> bool {
        matches!(self.state, JobState::Suspended)
    }

    /// Checks whether the job runs in the background.
    pub const fn is_running_in_background(&self) -> bool {
        self.running_in_background
    }

    pub(crate) fn set_running_in_background(&mut self, value: bool) {
        self.running_in_background = value;
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} {}", self.id, self.state, self.command_line)
    }
}

/// Manages the jobs currently tracked by a shell instance, keyed by pid.
#[derive(Default)]
pub struct JobManager {
    jobs: HashMap<i32, JobRef>,
}

impl JobManager {
    /// Tracks a new job for the given child, assigning it the next job id.
    pub(crate) fn add(&mut self, pid: i32, pgid: i32, command_line: String) -> JobRef {
        let id = self.last_job_id() + 1;
        let job = Arc::new(Mutex::new(Job::new(pid, pgid, command_line, id)));
        self.jobs.insert(pid, job.clone());
        job
    }

    /// Returns the highest id among tracked jobs, or zero when there are none.
    pub fn last_job_id(&self) -> JobId {
        self.jobs
            .values()
            .map(|job| job.lock().unwrap().id())
            .max()
            .unwrap_or(0)
    }

    /// Looks up a job by its shell-internal id.
    pub fn find_by_id(&self, id: JobId) -> Option<JobRef> {
        self.jobs
            .values()
            .find(|job| job.lock().unwrap().id() == id)
            .cloned()
    }

    /// Tries to resolve a `%`-style job specification to a job.
    pub fn resolve_job_spec(&self, job_spec: &str) -> Option<JobRef> {
        let spec = job_spec.strip_prefix('%').unwrap_or(job_spec);
        match spec {
            "%" | "+" => self.find_by_id(self.last_job_id()),
            s if s.chars().all(|c| c.is_ascii_digit()) => {
                self.find_by_id(s.parse::<JobId>().ok()?)
            }
            _ => {
                tracing::warn!("unsupported job spec: '{job_spec}'");
                None
            }
        }
    }

    pub(crate) fn remove(&mut self, pid: i32) -> Option<JobRef> {
        self.jobs.remove(&pid)
    }

    /// Checks whether no jobs are tracked.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Iterates over the tracked jobs.
    pub fn iter(&self) -> impl Iterator<Item = &JobRef> {
        self.jobs.values()
    }

    /// Returns the tracked jobs, drained from the manager.
    pub(crate) fn drain(&mut self) -> Vec<JobRef> {
        self.jobs.drain().map(|(_, job)| job).collect()
    }
}

/// Returns a handle for a launch that never produced a child: the job reports
/// itself already exited with the exec-failure code.
pub(crate) fn failed_job(command_line: String) -> JobRef {
    let mut job = Job::new(-1, -1, command_line, 0);
    job.set_state(JobState::Exited(126));
    Arc::new(Mutex::new(job))
}

/// Reaps state changes the OS reports for child processes, updating tracked jobs.
/// Exited jobs are removed; backgrounded ones print a completion notice first.
pub(crate) fn poll_child_state_changes(
    manager: &mut JobManager,
    stderr: &mut impl Write,
) -> Result<(), error::Error> {
    loop {
        let flags = nix::sys::wait::WaitPidFlag::WNOHANG
            | nix::sys::wait::WaitPidFlag::WUNTRACED
            | nix::sys::wait::WaitPidFlag::WCONTINUED;

        match nix::sys::wait::waitpid(nix::unistd::Pid::from_raw(-1), Some(flags)) {
            Ok(nix::sys::wait::WaitStatus::Exited(pid, code)) => {
                #[allow(clippy::cast_sign_loss)]
                mark_exited(manager, stderr, pid.as_raw(), (code & 0xFF) as u8)?;
            }
            Ok(nix::sys::wait::WaitStatus::Signaled(pid, signal, _)) => {
                #[allow(clippy::cast_sign_loss)]
                mark_exited(manager, stderr, pid.as_raw(), 128 + signal as u8)?;
            }
            Ok(nix::sys::wait::WaitStatus::Stopped(pid, _)) => {
                if let Some(job) = manager.jobs.get(&pid.as_raw()) {
                    job.lock().unwrap().set_state(JobState::Suspended);
                }
            }
            Ok(nix::sys::wait::WaitStatus::Continued(pid)) => {
                if let Some(job) = manager.jobs.get(&pid.as_raw()) {
                    job.lock().unwrap().set_state(JobState::Running);
                }
            }
            Ok(nix::sys::wait::WaitStatus::StillAlive) | Err(nix::errno::Errno::ECHILD) => break,
            Ok(other) => {
                tracing::debug!("unhandled wait status: {other:?}");
            }
            Err(errno) => return Err(errno.into()),
        }
    }

    Ok(())
}

fn mark_exited(
    manager: &mut JobManager,
    stderr: &mut impl Write,
    pid: i32,
    code: u8,
) -> Result<(), error::Error> {
    if let Some(job) = manager.remove(pid) {
        let mut job = job.lock().unwrap();
        job.set_state(JobState::Exited(code));
        if job.is_running_in_background() {
            writeln!(stderr, "marsh: Job {}({}) exited", job.pid(), job.command_line())?;
        }
    }

    Ok(())
}
