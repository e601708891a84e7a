//! Error facilities

use crate::jobs;

/// Monolithic error type for the shell.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error occurred while creating a child process.
    #[error("failed to create child process")]
    ChildCreationFailure,

    /// The shell failed to send a signal to a process.
    #[error("failed to send signal to process")]
    FailedToSendSignal,

    /// The requested input or output redirection is invalid.
    #[error("invalid redirection")]
    InvalidRedirection,

    /// An error occurred while redirecting input or output with the given file.
    #[error("failed to redirect to {0}: {1}")]
    RedirectionFailure(String, #[source] std::io::Error),

    /// A pipe could not be allocated for a pipeline or capture expression.
    #[error("failed to allocate pipe: {0}")]
    PipeCreationFailure(#[source] nix::errno::Errno),

    /// The current user could not be determined.
    #[error("no current user")]
    NoCurrentUser,

    /// No job matched the given job specification.
    #[error("no such job: {0}")]
    NoSuchJob(String),

    /// The job is not in a state the requested operation applies to.
    #[error("job {0} is not suspended")]
    JobNotSuspended(jobs::JobId),

    /// An unknown shell option was named.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// The indicated pattern is invalid.
    #[error("invalid pattern: '{0}'")]
    InvalidPattern(String),

    /// A regular expression error occurred.
    #[error("regex error: {0}")]
    RegexError(#[from] fancy_regex::Error),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A system call failed.
    #[error("system error: {0}")]
    SysError(#[from] nix::errno::Errno),

    /// A byte sequence could not be decoded as a valid UTF-8 string.
    #[error("failed to decode utf-8")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),

    /// A threading error occurred.
    #[error("threading error")]
    ThreadingError(#[from] tokio::task::JoinError),
}
