//! Descriptor rewiring: abstract redirection requests attached to commands, and
//! their resolution into concrete instructions the launcher can apply.

use std::fs::OpenOptions;
use std::os::fd::{IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::sync::{Arc, Mutex};

use crate::error;

/// File descriptor used for standard input.
pub const STDIN_FD: RawFd = 0;
/// File descriptor used for standard output.
pub const STDOUT_FD: RawFd = 1;
/// File descriptor used for standard error.
pub const STDERR_FD: RawFd = 2;

/// How a path redirection opens its file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRedirectionMode {
    /// Open for reading.
    Read,
    /// Open for writing, truncating any existing contents.
    Write,
    /// Open for reading and writing.
    ReadWrite,
    /// Open for writing, appending to any existing contents.
    WriteAppend,
}

/// Which end of a shared pipe an endpoint rewires to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeEnd {
    /// The endpoint writes into the pipe; resolving it allocates the pipe.
    Writer,
    /// The endpoint reads from the pipe its partner allocated.
    Reader,
}

/// The slot a pipe writer endpoint uses to hand the read end to its partner.
#[derive(Clone, Debug, Default)]
pub struct PipeLink(Arc<Mutex<Option<RawFd>>>);

impl PipeLink {
    fn put(&self, fd: RawFd) {
        *self.0.lock().unwrap() = Some(fd);
    }

    fn take(&self) -> Option<RawFd> {
        self.0.lock().unwrap().take()
    }
}

/// An abstract descriptor-rewiring request attached to a command.
#[derive(Clone, Debug)]
pub enum Redirection {
    /// Open `path` and rewire `fd` onto the opened descriptor.
    Path {
        /// The descriptor being rewired.
        fd: RawFd,
        /// The path to open.
        path: String,
        /// How the path should be opened.
        mode: PathRedirectionMode,
    },
    /// Make `source_fd` a copy of `dest_fd` in the child.
    Fd2Fd {
        /// The descriptor being rewired.
        source_fd: RawFd,
        /// The descriptor it becomes a copy of.
        dest_fd: RawFd,
    },
    /// Close `fd` in the child.
    Close {
        /// The descriptor to close.
        fd: RawFd,
    },
    /// Rewire `fd` onto one end of a pipe shared with a partner endpoint. The pipe
    /// is allocated when the writer endpoint resolves.
    PipeEndpoint {
        /// The descriptor being rewired.
        fd: RawFd,
        /// Which end of the pipe this endpoint takes.
        end: PipeEnd,
        /// The slot shared with the partner endpoint.
        link: PipeLink,
    },
    /// Rewire `fd` onto a descriptor the caller has already opened. The launcher
    /// takes ownership of `dest_fd` and closes it after the child is spawned.
    TransferredFd {
        /// The descriptor being rewired.
        fd: RawFd,
        /// The already-open descriptor to rewire onto.
        dest_fd: RawFd,
    },
}

/// What should be closed once a rewiring has been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseAction {
    /// Nothing to close.
    None,
    /// Close the source descriptor.
    CloseSource,
    /// Close the destination descriptor in the parent after the child is spawned.
    CloseDestination,
    /// The destination was freshly allocated during resolution; close it in the
    /// parent after the child is spawned.
    RefreshDestination,
    /// Close the destination in the child as soon as rewirings are applied.
    ImmediatelyCloseDestination,
}

/// A concrete descriptor-manipulation instruction: make `source_fd` refer to
/// whatever `dest_fd` refers to, then honor the close action.
#[derive(Clone, Copy, Debug)]
pub struct Rewiring {
    /// The descriptor being rewired.
    pub source_fd: RawFd,
    /// The descriptor it becomes a copy of.
    pub dest_fd: RawFd,
    /// What to close once the rewiring is applied.
    pub close_action: CloseAction,
}

/// Scoped owner of raw descriptors created during redirection resolution; every
/// registered descriptor is closed when the collector is collected or dropped, so
/// no descriptor outlives the launch that created it.
#[derive(Debug, Default)]
pub struct FdCollector {
    fds: Vec<RawFd>,
}

impl FdCollector {
    /// Registers a descriptor for later closure.
    pub fn add(&mut self, fd: RawFd) {
        self.fds.push(fd);
    }

    /// Closes all registered descriptors.
    pub fn collect(&mut self) {
        for fd in self.fds.drain(..) {
            if let Err(errno) = nix::unistd::close(fd) {
                tracing::debug!("close({fd}) failed: {errno}");
            }
        }
    }

    /// Returns the registered descriptors without closing them.
    pub(crate) fn fds(&self) -> &[RawFd] {
        &self.fds
    }
}

impl Drop for FdCollector {
    fn drop(&mut self) {
        self.collect();
    }
}

/// Returns a pair of redirections connecting one command's standard output to
/// another's standard input through a pipe allocated at rewiring time.
pub(crate) fn pipe_pair() -> (Redirection, Redirection) {
    let link = PipeLink::default();
    (
        Redirection::PipeEndpoint {
            fd: STDOUT_FD,
            end: PipeEnd::Writer,
            link: link.clone(),
        },
        Redirection::PipeEndpoint {
            fd: STDIN_FD,
            end: PipeEnd::Reader,
            link,
        },
    )
}

/// Allocates a pipe for a capture expression, returning the read end and a
/// redirection that sends a command's standard output into the write end.
pub(crate) fn capture_pipe() -> Result<(OwnedFd, Redirection), error::Error> {
    let (read_end, write_end) = nix::unistd::pipe().map_err(error::Error::PipeCreationFailure)?;
    Ok((
        read_end,
        Redirection::TransferredFd {
            fd: STDOUT_FD,
            dest_fd: write_end.into_raw_fd(),
        },
    ))
}

impl Redirection {
    /// Resolves this request into a concrete rewiring, registering any descriptor
    /// the parent must close with the given collector.
    pub(crate) fn resolve(&self, fds: &mut FdCollector) -> Result<Rewiring, error::Error> {
        match self {
            Self::Path { fd, path, mode } => {
                let mut options = OpenOptions::new();
                match mode {
                    PathRedirectionMode::Read => {
                        options.read(true);
                    }
                    PathRedirectionMode::Write => {
                        options.write(true).create(true).truncate(true).mode(0o666);
                    }
                    PathRedirectionMode::ReadWrite => {
                        options.read(true).write(true).create(true).mode(0o666);
                    }
                    PathRedirectionMode::WriteAppend => {
                        options.append(true).create(true).mode(0o666);
                    }
                }

                let file = options.open(path).map_err(|err| {
                    error::Error::RedirectionFailure(path.clone(), err)
                })?;

                let dest_fd = file.into_raw_fd();
                fds.add(dest_fd);

                Ok(Rewiring {
                    source_fd: *fd,
                    dest_fd,
                    close_action: CloseAction::CloseDestination,
                })
            }

            Self::Fd2Fd { source_fd, dest_fd } => Ok(Rewiring {
                source_fd: *source_fd,
                dest_fd: *dest_fd,
                close_action: CloseAction::None,
            }),

            Self::Close { fd } => Ok(Rewiring {
                source_fd: *fd,
                dest_fd: *fd,
                close_action: CloseAction::ImmediatelyCloseDestination,
            }),

            Self::PipeEndpoint {
                fd,
                end: PipeEnd::Writer,
                link,
            } => {
                let (read_end, write_end) =
                    nix::unistd::pipe().map_err(error::Error::PipeCreationFailure)?;
                link.put(read_end.into_raw_fd());

                let dest_fd = write_end.into_raw_fd();
                fds.add(dest_fd);

                Ok(Rewiring {
                    source_fd: *fd,
                    dest_fd,
                    close_action: CloseAction::RefreshDestination,
                })
            }

            Self::PipeEndpoint {
                fd,
                end: PipeEnd::Reader,
                link,
            } => {
                let dest_fd = link.take().ok_or(error::Error::InvalidRedirection)?;
                fds.add(dest_fd);

                Ok(Rewiring {
                    source_fd: *fd,
                    dest_fd,
                    close_action: CloseAction::CloseDestination,
                })
            }

            Self::TransferredFd { fd, dest_fd } => {
                fds.add(*dest_fd);

                Ok(Rewiring {
                    source_fd: *fd,
                    dest_fd: *dest_fd,
                    close_action: CloseAction::CloseDestination,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_path_redirection_opens_and_collects() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        let path = dir.path().join("out.txt");

        let redirection = Redirection::Path {
            fd: STDOUT_FD,
            path: path.to_string_lossy().to_string(),
            mode: PathRedirectionMode::Write,
        };

        let mut fds = FdCollector::default();
        let rewiring = redirection.resolve(&mut fds)?;

        assert_eq!(rewiring.source_fd, STDOUT_FD);
        assert_eq!(rewiring.close_action, CloseAction::CloseDestination);
        assert!(path.exists());
        assert_eq!(fds.fds(), &[rewiring.dest_fd]);

        fds.collect();
        assert!(fds.fds().is_empty());

        Ok(())
    }

    #[test]
    fn test_missing_file_read_redirection_fails() {
        let redirection = Redirection::Path {
            fd: STDIN_FD,
            path: "/definitely/not/a/real/path".into(),
            mode: PathRedirectionMode::Read,
        };

        let mut fds = FdCollector::default();
        assert!(matches!(
            redirection.resolve(&mut fds),
            Err(error::Error::RedirectionFailure(..))
        ));
        assert!(fds.fds().is_empty());
    }

    #[test]
    fn test_pipe_pair_allocates_exactly_once() -> Result<()> {
        let (writer, reader) = pipe_pair();

        let mut fds = FdCollector::default();
        let write_rewiring = writer.resolve(&mut fds)?;
        let read_rewiring = reader.resolve(&mut fds)?;

        assert_eq!(write_rewiring.source_fd, STDOUT_FD);
        assert_eq!(write_rewiring.close_action, CloseAction::RefreshDestination);
        assert_eq!(read_rewiring.source_fd, STDIN_FD);
        assert_ne!(write_rewiring.dest_fd, read_rewiring.dest_fd);

        // A second resolution of the reader must not see a stale fd.
        assert!(reader.resolve(&mut fds).is_err());

        Ok(())
    }

    #[test]
    fn test_close_redirection_closes_in_child_only() -> Result<()> {
        let redirection = Redirection::Close { fd: 7 };
        let mut fds = FdCollector::default();
        let rewiring = redirection.resolve(&mut fds)?;

        assert_eq!(rewiring.source_fd, 7);
        assert_eq!(
            rewiring.close_action,
            CloseAction::ImmediatelyCloseDestination
        );
        assert!(fds.fds().is_empty());

        Ok(())
    }
}
