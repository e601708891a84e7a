//! The pipeline launcher: resolves each command's redirections into rewirings,
//! then runs the command as a built-in, as a manipulation of the shell's own
//! descriptors, or as a spawned child process.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;

use command_fds::{CommandFdExt, FdMapping};
use itertools::Itertools;

use crate::commands::Command;
use crate::error;
use crate::jobs::JobRef;
use crate::redirect::{CloseAction, FdCollector, Rewiring, STDERR_FD, STDIN_FD, STDOUT_FD};
use crate::shell::Shell;
use crate::sys;

/// Runs a list of resolved commands in order, blocking on each foreground command.
/// Returns the jobs a caller may still need to wait on: foreground jobs that have
/// completed (for their exit codes) and pipe sources that have not been waited on.
pub(crate) async fn run_commands(
    shell: &mut Shell,
    commands: &[Command],
) -> Result<Vec<JobRef>, error::Error> {
    let mut jobs_to_wait_for = vec![];

    for command in commands {
        let Some(job) = run_command(shell, command).await? else {
            continue;
        };

        if command.should_wait {
            shell.block_on_job(&job).await?;
            if !job.lock().unwrap().is_suspended() {
                jobs_to_wait_for.push(job);
            }
        } else if command.is_pipe_source {
            jobs_to_wait_for.push(job);
        } else if command.should_notify_if_in_background {
            job.lock().unwrap().set_running_in_background(true);
            shell.restore_stdin()?;
        }
    }

    Ok(jobs_to_wait_for)
}

/// Runs a single resolved command. Returns the launched job, or `None` when the
/// command completed inside the shell or could not be started.
pub(crate) async fn run_command(
    shell: &mut Shell,
    command: &Command,
) -> Result<Option<JobRef>, error::Error> {
    let mut fds = FdCollector::default();

    if shell.options.verbose {
        let mut stderr = std::io::stderr();
        writeln!(
            stderr,
            "+ {}",
            command.argv.iter().map(|arg| escape_token(arg)).join(" ")
        )?;
        stderr.flush()?;
    }

    // Resolve redirections. A failed open skips just that redirection; a failed
    // pipe allocation abandons the whole launch.
    let mut rewirings = vec![];
    for redirection in &command.redirections {
        match redirection.resolve(&mut fds) {
            Ok(rewiring) => rewirings.push(rewiring),
            Err(err @ error::Error::PipeCreationFailure(_)) => {
                writeln!(std::io::stderr(), "marsh: {err}")?;
                return Ok(None);
            }
            Err(err) => {
                writeln!(std::io::stderr(), "marsh: {err}")?;
            }
        }
    }

    // An empty command applies its rewirings to the shell itself.
    if command.argv.is_empty() {
        apply_rewirings_in_shell(&rewirings);
        fds.collect();
        return Ok(None);
    }

    if let Some(registration) = shell.builtin(command.argv[0].as_str()) {
        let execute = registration.execute;
        let exit_code = execute(shell, command.argv.clone()).await?;
        shell.apply_builtin_exit(exit_code);
        fds.collect();
        return Ok(None);
    }

    match spawn_child(shell, command, &rewirings, &fds) {
        Ok(pid) => {
            let job = shell.jobs.add(pid, pid, command.to_string());
            fds.collect();
            Ok(Some(job))
        }
        Err(error::Error::ChildCreationFailure) => {
            writeln!(std::io::stderr(), "marsh: failed to create child process")?;
            Ok(None)
        }
        Err(error::Error::IoError(err)) => {
            report_spawn_failure(&command.argv[0], &err);
            // No child exists, but the failure still carries the exec-failure
            // exit code for whoever inspects the job.
            Ok(Some(crate::jobs::failed_job(command.to_string())))
        }
        Err(err) => Err(err),
    }
}

fn apply_rewirings_in_shell(rewirings: &[Rewiring]) {
    for rewiring in rewirings {
        if rewiring.close_action == CloseAction::ImmediatelyCloseDestination {
            let _ = nix::unistd::close(rewiring.source_fd);
            continue;
        }

        if let Err(errno) = nix::unistd::dup2(rewiring.dest_fd, rewiring.source_fd) {
            let _ = writeln!(std::io::stderr(), "marsh: dup2 failed: {errno}");
        }
    }
}

fn spawn_child(
    shell: &Shell,
    command: &Command,
    rewirings: &[Rewiring],
    fds: &FdCollector,
) -> Result<i32, error::Error> {
    // Later rewirings of the same descriptor win.
    let mut fd_map: HashMap<RawFd, RawFd> = HashMap::new();
    let mut close_in_child: Vec<RawFd> = vec![];
    for rewiring in rewirings {
        if rewiring.close_action == CloseAction::ImmediatelyCloseDestination {
            close_in_child.push(rewiring.source_fd);
        } else {
            fd_map.insert(rewiring.source_fd, rewiring.dest_fd);
        }
    }

    let mut cmd = std::process::Command::new(&command.argv[0]);
    cmd.args(&command.argv[1..]);
    cmd.current_dir(&shell.cwd);
    cmd.process_group(0);

    if let Some(dest_fd) = fd_map.remove(&STDIN_FD) {
        cmd.stdin(Stdio::from(dup_owned(dest_fd)?));
    }
    if let Some(dest_fd) = fd_map.remove(&STDOUT_FD) {
        cmd.stdout(Stdio::from(dup_owned(dest_fd)?));
    }
    if let Some(dest_fd) = fd_map.remove(&STDERR_FD) {
        cmd.stderr(Stdio::from(dup_owned(dest_fd)?));
    }

    let fd_mappings = fd_map
        .into_iter()
        .map(|(child_fd, dest_fd)| {
            Ok(FdMapping {
                child_fd,
                parent_fd: dup_owned(dest_fd)?,
            })
        })
        .collect::<Result<Vec<_>, error::Error>>()?;
    cmd.fd_mappings(fd_mappings)
        .map_err(|_e| error::Error::ChildCreationFailure)?;

    let default_termios = shell.default_termios().map(|settings| settings.to_raw());
    let take_foreground = command.should_wait && shell.options.interactive;

    // Pipe fds tracked by the collector must not leak into the child past exec.
    // A collector fd whose number coincides with a rewired child descriptor has
    // just been remapped and must stay open.
    let rewired_fds: Vec<RawFd> = rewirings
        .iter()
        .filter(|rewiring| rewiring.close_action != CloseAction::ImmediatelyCloseDestination)
        .map(|rewiring| rewiring.source_fd)
        .collect();
    close_in_child.extend(
        fds.fds()
            .iter()
            .copied()
            .filter(|fd| !rewired_fds.contains(fd)),
    );

    // SAFETY: the closure runs between fork and exec; it only performs
    // async-signal-safe descriptor and terminal operations.
    unsafe {
        cmd.pre_exec(move || {
            if let Some(raw) = default_termios {
                let settings = sys::terminal::TerminalSettings::from_raw(raw);
                let _ = sys::terminal::set_term_attr_now(std::io::stdin(), &settings);
            }

            if take_foreground {
                let _ = sys::terminal::move_self_to_foreground();
            }

            for fd in &close_in_child {
                let _ = nix::unistd::close(*fd);
            }

            Ok(())
        });
    }

    let child = cmd.spawn()?;

    #[allow(clippy::cast_possible_wrap)]
    let pid = child.id() as i32;

    // The child handle is dropped without waiting; the job controller reaps the
    // process through waitpid.
    drop(child);

    Ok(pid)
}

fn dup_owned(fd: RawFd) -> Result<OwnedFd, error::Error> {
    let duplicate = nix::unistd::dup(fd)?;
    // SAFETY: dup just returned this descriptor, so we hold its only owner.
    Ok(unsafe { OwnedFd::from_raw_fd(duplicate) })
}

fn report_spawn_failure(program: &str, err: &std::io::Error) {
    let mut stderr = std::io::stderr();

    if err.kind() == std::io::ErrorKind::NotFound {
        // A present file whose interpreter line points nowhere also surfaces as
        // "not found"; tell those cases apart.
        if let Some(interpreter) = read_shebang(program) {
            let _ = writeln!(
                stderr,
                "{program}: Invalid interpreter \"{interpreter}\": No such file or directory"
            );
        } else {
            let _ = writeln!(stderr, "{program}: Command not found.");
        }
        return;
    }

    if Path::new(program).is_dir() {
        let _ = writeln!(stderr, "marsh: {program}: Is a directory");
        return;
    }

    let _ = writeln!(stderr, "execvp({program}): {err}");
}

fn read_shebang(program: &str) -> Option<String> {
    let mut file = std::fs::File::open(program).ok()?;
    let mut buffer = [0u8; 256];
    let count = file.read(&mut buffer).ok()?;

    let contents = &buffer[..count];
    if !contents.starts_with(b"#!") {
        return None;
    }

    let line = contents[2..]
        .split(|b| *b == b'\n' || *b == b'\r')
        .next()
        .unwrap_or_default();
    Some(String::from_utf8_lossy(line).trim().to_string())
}

fn escape_token(token: &str) -> String {
    if !token.is_empty()
        && !token.contains(|c: char| c.is_ascii_whitespace() || "'\"\\$|&;<>*?#()".contains(c))
    {
        return token.to_owned();
    }

    let mut escaped = String::with_capacity(token.len() + 2);
    escaped.push('\'');
    for c in token.chars() {
        if c == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(c);
        }
    }
    escaped.push('\'');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_token() {
        assert_eq!(escape_token("plain"), "plain");
        assert_eq!(escape_token("has space"), "'has space'");
        assert_eq!(escape_token(""), "''");
        assert_eq!(escape_token("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_read_shebang() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("script");
        std::fs::write(&path, "#!/no/such/interp -x\necho hi\n").unwrap();

        assert_eq!(
            read_shebang(path.to_str().unwrap()),
            Some("/no/such/interp -x".to_owned())
        );

        let plain = dir.path().join("plain");
        std::fs::write(&plain, "echo hi\n").unwrap();
        assert_eq!(read_shebang(plain.to_str().unwrap()), None);
    }
}
