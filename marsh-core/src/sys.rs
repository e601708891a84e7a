//! Abstractions over the system interfaces the shell depends on.

pub(crate) mod network;
pub(crate) mod signal;
pub(crate) mod terminal;
pub(crate) mod users;
