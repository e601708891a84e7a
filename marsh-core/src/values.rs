//! The value model: every AST node evaluates to one of these tagged variants, and
//! every variant can be projected to a list of strings or a sequence of commands.

use crate::commands::Command;
use crate::jobs::JobRef;
use crate::shell::Shell;

/// The result of evaluating an AST node.
#[derive(Clone, Debug)]
pub enum Value {
    /// A scalar. When `split_separator` is set, the list projection splits the text
    /// on the separator's characters under the recorded empty-segment policy.
    String {
        /// The scalar's text.
        text: String,
        /// Characters to split on when projecting to a list.
        split_separator: Option<String>,
        /// Whether empty segments survive splitting.
        keep_empty: bool,
    },
    /// An ordered collection of values; projection flattens one level.
    List(Vec<Value>),
    /// A glob pattern, expanded against the working directory on projection.
    Glob(String),
    /// A `~` or `~user` expression; the string holds the (possibly empty) user name.
    Tilde(String),
    /// A variable reference, resolved against locals first and then the environment.
    SimpleVariable(String),
    /// A single-character special variable (`?`, `$`).
    SpecialVariable(char),
    /// A single resolved unit of work.
    Command(Command),
    /// An ordered pipeline or list of units.
    CommandSequence(Vec<Command>),
    /// A reference to a launched child process; `None` when the launch failed.
    Job(Option<JobRef>),
}

impl Value {
    /// Returns a plain string value.
    pub fn string(text: impl Into<String>) -> Self {
        Self::String {
            text: text.into(),
            split_separator: None,
            keep_empty: false,
        }
    }

    /// Returns a string value that splits on the given separator when projected.
    pub fn split_string(
        text: impl Into<String>,
        separator: impl Into<String>,
        keep_empty: bool,
    ) -> Self {
        Self::String {
            text: text.into(),
            split_separator: Some(separator.into()),
            keep_empty,
        }
    }

    /// Returns an empty list value.
    pub const fn empty_list() -> Self {
        Self::List(Vec::new())
    }

    /// Checks whether this value is a string.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String { .. })
    }

    /// Checks whether this value is a command or command sequence.
    pub const fn is_command(&self) -> bool {
        matches!(self, Self::Command(_) | Self::CommandSequence(_))
    }

    /// Checks whether this value is a job reference.
    pub const fn is_job(&self) -> bool {
        matches!(self, Self::Job(_))
    }

    /// Resolves a variable reference to the value it names, leaving every other
    /// value untouched. Used where the shape of the underlying value matters
    /// (string vs. list vs. command) before projection flattens it.
    pub fn resolve_without_cast(&self, shell: &Shell) -> Self {
        if let Self::SimpleVariable(name) = self {
            if let Some(value) = shell.lookup_local_variable(name) {
                return value.clone();
            }
        }

        self.clone()
    }

    /// Projects this value to an ordered list of strings.
    pub fn resolve_as_list(&self, shell: &Shell) -> Vec<String> {
        match self {
            Self::String {
                text,
                split_separator: Some(separator),
                keep_empty,
            } => split_on_separator_set(text, separator, *keep_empty),

            Self::String { text, .. } => vec![text.clone()],

            Self::List(values) => values
                .iter()
                .flat_map(|value| value.resolve_as_list(shell))
                .collect(),

            Self::Glob(pattern) => shell.expand_globs(pattern),

            Self::Tilde(username) => vec![shell.expand_tilde(&format!("~{username}"))],

            Self::SimpleVariable(name) => {
                let resolved = self.resolve_without_cast(shell);
                if !matches!(&resolved, Self::SimpleVariable(_)) {
                    return resolved.resolve_as_list(shell);
                }

                match std::env::var(name) {
                    Ok(value) => value.split(' ').filter(|s| !s.is_empty()).map(ToOwned::to_owned).collect(),
                    Err(_) => vec![String::new()],
                }
            }

            Self::SpecialVariable('?') => vec![shell.last_return_code.to_string()],
            Self::SpecialVariable('$') => vec![shell.pid.to_string()],
            Self::SpecialVariable(_) => vec![String::new()],

            // Commands and jobs are opaque to list projection.
            Self::Command(_) | Self::CommandSequence(_) | Self::Job(_) => vec![],
        }
    }

    /// Projects this value to a sequence of commands. Non-command values become the
    /// argv of a single fresh command.
    pub fn resolve_as_commands(&self, shell: &Shell) -> Vec<Command> {
        match self {
            Self::Command(command) => vec![command.clone()],
            Self::CommandSequence(commands) => commands.clone(),
            _ => vec![Command::from_argv(self.resolve_as_list(shell))],
        }
    }
}

/// Splits `text` on occurrences of any character in `separator`, mirroring how the
/// `IFS` local variable is interpreted.
fn split_on_separator_set(text: &str, separator: &str, keep_empty: bool) -> Vec<String> {
    if separator.is_empty() {
        return vec![text.to_owned()];
    }

    text.split(|c| separator.contains(c))
        .filter(|segment| keep_empty || !segment.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
