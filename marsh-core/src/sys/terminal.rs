use std::io::IsTerminal;
use std::os::fd::AsFd;

use crate::error;

/// A snapshot of the controlling terminal's settings.
#[derive(Clone)]
pub struct TerminalSettings {
    termios: nix::sys::termios::Termios,
}

impl TerminalSettings {
    /// Returns the raw representation of the settings, suitable for carrying into a
    /// forked child before exec.
    pub(crate) fn to_raw(&self) -> nix::libc::termios {
        self.termios.clone().into()
    }

    pub(crate) fn from_raw(raw: nix::libc::termios) -> Self {
        Self {
            termios: raw.into(),
        }
    }
}

pub(crate) fn get_term_attr<Fd: AsFd>(fd: Fd) -> Result<TerminalSettings, error::Error> {
    Ok(TerminalSettings {
        termios: nix::sys::termios::tcgetattr(fd)?,
    })
}

pub(crate) fn set_term_attr_now<Fd: AsFd>(
    fd: Fd,
    settings: &TerminalSettings,
) -> Result<(), error::Error> {
    nix::sys::termios::tcsetattr(fd, nix::sys::termios::SetArg::TCSANOW, &settings.termios)?;
    Ok(())
}

pub(crate) fn move_to_foreground(pgid: i32) -> Result<(), error::Error> {
    if std::io::stdin().is_terminal() {
        let _ = nix::unistd::tcsetpgrp(std::io::stdin(), nix::unistd::Pid::from_raw(pgid));
    }
    Ok(())
}

pub(crate) fn move_self_to_foreground() -> Result<(), error::Error> {
    if std::io::stdin().is_terminal() {
        let pgid = nix::unistd::getpgid(None)?;
        let _ = nix::unistd::tcsetpgrp(std::io::stdin(), pgid);
    }
    Ok(())
}
