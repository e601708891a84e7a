//! Runtime changeable options for a shell instance.

use crate::error;

/// Named boolean options, toggled with the `setopt` built-in.
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    /// Echo each launched command to stderr.
    pub verbose: bool,
    /// Keep empty segments when splitting captured command output.
    pub inline_exec_keep_empty_segments: bool,
    /// Whether the shell is attached to an interactive terminal.
    pub interactive: bool,
}

impl RuntimeOptions {
    /// Sets the option with the given name.
    pub fn set(&mut self, name: &str, value: bool) -> Result<(), error::Error> {
        match name {
            "verbose" => self.verbose = value,
            "inline_exec_keep_empty_segments" => self.inline_exec_keep_empty_segments = value,
            _ => return Err(error::Error::UnknownOption(name.to_owned())),
        }

        Ok(())
    }

    /// Returns the user-settable options and their current values.
    pub fn entries(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("verbose", self.verbose),
            (
                "inline_exec_keep_empty_segments",
                self.inline_exec_keep_empty_segments,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_by_name() {
        let mut options = RuntimeOptions::default();
        options.set("verbose", true).unwrap();
        assert!(options.verbose);

        options.set("verbose", false).unwrap();
        assert!(!options.verbose);

        assert!(matches!(
            options.set("no_such_option", true),
            Err(error::Error::UnknownOption(_))
        ));
    }
}
