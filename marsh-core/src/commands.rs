//! Fully-resolved units of work, ready for the pipeline launcher.

use std::fmt::Display;

use itertools::Itertools;

use crate::redirect::Redirection;

/// A single resolved command: its argv, its descriptor rewirings, and how the
/// launcher should schedule it.
#[derive(Clone, Debug)]
pub struct Command {
    /// The command's arguments, starting with the program name. May be empty, in
    /// which case the redirections apply to the shell itself.
    pub argv: Vec<String>,
    /// Descriptor-rewiring requests, in the order they were written.
    pub redirections: Vec<Redirection>,
    /// Whether the shell blocks on the command; false for non-terminal pipeline
    /// stages and backgrounded commands.
    pub should_wait: bool,
    /// Whether the command writes into a pipe read by a later command in the same
    /// pipeline.
    pub is_pipe_source: bool,
    /// Whether a completion notice is printed when the command runs in the
    /// background.
    pub should_notify_if_in_background: bool,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            argv: vec![],
            redirections: vec![],
            should_wait: true,
            is_pipe_source: false,
            should_notify_if_in_background: true,
        }
    }
}

impl Command {
    /// Returns a command with the given argv and default scheduling.
    pub fn from_argv(argv: Vec<String>) -> Self {
        Self {
            argv,
            ..Self::default()
        }
    }

    /// Returns a command with no argv and a single redirection.
    pub fn from_redirection(redirection: Redirection) -> Self {
        Self {
            redirections: vec![redirection],
            ..Self::default()
        }
    }

    /// Checks whether the command has neither arguments nor redirections.
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty() && self.redirections.is_empty()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.argv.iter().join(" "))
    }
}

/// Combines two command sequences by fusing the last command of `left` with the
/// first command of `right`; the surrounding commands pass through untouched.
pub fn join_commands(mut left: Vec<Command>, mut right: Vec<Command>) -> Vec<Command> {
    let last_in_left = left.pop().unwrap_or_default();
    let first_in_right = if right.is_empty() {
        Command::default()
    } else {
        right.remove(0)
    };

    let mut fused = Command {
        argv: last_in_left.argv,
        redirections: last_in_left.redirections,
        should_wait: first_in_right.should_wait && last_in_left.should_wait,
        is_pipe_source: first_in_right.is_pipe_source,
        should_notify_if_in_background: first_in_right.should_wait
            && last_in_left.should_notify_if_in_background,
    };
    fused.argv.extend(first_in_right.argv);
    fused.redirections.extend(first_in_right.redirections);

    let mut commands = left;
    commands.push(fused);
    commands.extend(right);

    commands
}
