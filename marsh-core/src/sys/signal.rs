use crate::error;

pub(crate) fn continue_process_group(pgid: i32) -> Result<(), error::Error> {
    signal_process_group(pgid, nix::sys::signal::SIGCONT)
}

pub(crate) fn hangup_process_group(pgid: i32) -> Result<(), error::Error> {
    signal_process_group(pgid, nix::sys::signal::SIGHUP)
}

pub(crate) fn kill_process_group(pgid: i32) -> Result<(), error::Error> {
    signal_process_group(pgid, nix::sys::signal::SIGKILL)
}

pub(crate) fn signal_process_group(
    pgid: i32,
    signal: nix::sys::signal::Signal,
) -> Result<(), error::Error> {
    match nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pgid), signal) {
        Ok(()) => Ok(()),
        // The whole group exited on its own.
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(_) => Err(error::Error::FailedToSendSignal),
    }
}

pub(crate) fn chld_signal_listener() -> Result<tokio::signal::unix::Signal, error::Error> {
    let signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::child())?;
    Ok(signal)
}

pub(crate) use tokio::signal::ctrl_c as await_ctrl_c;

pub(crate) fn mask_sigttou() -> Result<(), error::Error> {
    let ignore = nix::sys::signal::SigAction::new(
        nix::sys::signal::SigHandler::SigIgn,
        nix::sys::signal::SaFlags::empty(),
        nix::sys::signal::SigSet::empty(),
    );
    unsafe { nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGTTOU, &ignore) }?;
    Ok(())
}
