//! Shell state and the top-level command loop entry points.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use marsh_parser::ast;

use crate::builtins::{self, BuiltinExitCode};
use crate::error;
use crate::interp::Evaluate;
use crate::jobs::{self, JobRef};
use crate::options::RuntimeOptions;
use crate::sys::terminal::TerminalSettings;
use crate::values::Value;
use crate::{expansion, history, patterns, sys};

/// An instance of the shell: process-wide state plus the evaluator entry points.
pub struct Shell {
    /// The current working directory.
    pub cwd: PathBuf,
    /// The machine's host name.
    pub hostname: String,
    /// The invoking user's name.
    pub username: String,
    /// The invoking user's home directory.
    pub home: PathBuf,
    /// The invoking user's id.
    pub uid: u32,
    /// The shell's own process id.
    pub pid: i32,
    /// Shell aliases.
    pub aliases: HashMap<String, String>,
    /// State of managed jobs.
    pub jobs: jobs::JobManager,
    /// The exit code of the last completed job.
    pub last_return_code: u8,
    /// Runtime shell options.
    pub options: RuntimeOptions,
    /// Commands accepted this session, oldest first.
    pub history: Vec<String>,
    /// Set when a built-in has requested that the shell exit.
    pub should_exit: bool,

    local_variables: HashMap<String, Value>,
    builtins: HashMap<&'static str, builtins::Registration>,
    default_termios: Option<TerminalSettings>,
    saved_termios: Option<TerminalSettings>,
}

impl Shell {
    /// Returns a new shell, capturing process-wide state from the environment.
    pub fn new() -> Result<Self, error::Error> {
        sys::signal::mask_sigttou()?;

        let cwd = std::env::current_dir()?;
        std::env::set_var("PWD", &cwd);

        let home = match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => {
                let home = sys::users::get_current_user_home_dir().unwrap_or_default();
                std::env::set_var("HOME", &home);
                home
            }
        };

        #[allow(clippy::cast_possible_wrap)]
        let shell = Self {
            cwd,
            hostname: sys::network::get_hostname().unwrap_or_default(),
            username: sys::users::get_current_username().unwrap_or_default(),
            home: home.clone(),
            uid: sys::users::get_current_uid(),
            pid: std::process::id() as i32,
            aliases: HashMap::new(),
            jobs: jobs::JobManager::default(),
            last_return_code: 0,
            options: RuntimeOptions::default(),
            history: history::load(&home),
            should_exit: false,
            local_variables: HashMap::new(),
            builtins: builtins::default_builtins(),
            default_termios: sys::terminal::get_term_attr(std::io::stdin()).ok(),
            saved_termios: None,
        };

        Ok(shell)
    }

    /// Parses and evaluates one command line, returning its exit code. Parse
    /// errors are reported with a short context window and yield exit code 1.
    pub async fn run_command_text(&mut self, input: &str) -> Result<u8, error::Error> {
        let Some(node) = marsh_parser::parse(input) else {
            return Ok(0);
        };

        if let Some(error_node) = node.syntax_error_node() {
            let ast::NodeKind::SyntaxError(message) = error_node.kind() else {
                unreachable!();
            };
            let position = error_node.position();
            let window_len = (position.end_offset - position.start_offset).min(10);
            let context = input
                .get(position.start_offset..position.start_offset + window_len)
                .unwrap_or("");

            let mut stderr = std::io::stderr();
            writeln!(stderr, "marsh: Syntax error in command: {message}")?;
            writeln!(stderr, "Around '{context}'")?;
            return Ok(1);
        }

        self.saved_termios = sys::terminal::get_term_attr(std::io::stdin()).ok();

        let result = node.eval(self).await?;
        if let Value::Job(job) = result {
            match job {
                // An exiting shell keeps the code the exit built-in chose.
                None if !self.should_exit => self.last_return_code = 0,
                None => {}
                Some(job) => {
                    let job = job.lock().unwrap();
                    if let Some(code) = job.exit_code() {
                        self.last_return_code = code;
                    }
                }
            }
        }

        Ok(self.last_return_code)
    }

    /// Reads and runs the given script file. Returns false when the file could
    /// not be read.
    pub async fn run_file(&mut self, path: &Path) -> Result<bool, error::Error> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                writeln!(std::io::stderr(), "Failed to open {}: {err}", path.display())?;
                return Ok(false);
            }
        };

        self.run_command_text(&contents).await?;
        Ok(true)
    }

    /// Blocks until the given job exits or is suspended, then restores the
    /// shell's terminal state.
    pub async fn block_on_job(&mut self, job: &JobRef) -> Result<(), error::Error> {
        let mut sigchld = sys::signal::chld_signal_listener()?;

        loop {
            jobs::poll_child_state_changes(&mut self.jobs, &mut std::io::stderr())?;

            if !matches!(job.lock().unwrap().state(), jobs::JobState::Running) {
                break;
            }

            tokio::select! {
                _ = sigchld.recv() => {},
                _ = sys::signal::await_ctrl_c() => {
                    // The foreground job received the interrupt as well; keep
                    // waiting for it to act on it.
                },
            }
        }

        self.restore_stdin()?;
        if self.options.interactive {
            sys::terminal::move_self_to_foreground()?;
        }

        Ok(())
    }

    /// Restores the terminal settings saved before the current command line ran.
    pub fn restore_stdin(&self) -> Result<(), error::Error> {
        if let Some(saved) = &self.saved_termios {
            sys::terminal::set_term_attr_now(std::io::stdin(), saved)?;
        }

        Ok(())
    }

    /// Looks up a local variable by name.
    pub fn lookup_local_variable(&self, name: &str) -> Option<&Value> {
        self.local_variables.get(name)
    }

    /// Sets a local variable.
    pub fn set_local_variable(&mut self, name: impl Into<String>, value: Value) {
        self.local_variables.insert(name.into(), value);
    }

    /// Removes a local variable.
    pub fn unset_local_variable(&mut self, name: &str) {
        self.local_variables.remove(name);
    }

    /// Returns a local variable's list projection joined by spaces, or the given
    /// replacement when the variable is unset.
    pub fn local_variable_or(&self, name: &str, replacement: &str) -> String {
        match self.local_variables.get(name) {
            Some(value) => value.resolve_as_list(self).join(" "),
            None => replacement.to_owned(),
        }
    }

    /// Looks up the alias text registered under the given name.
    pub fn resolve_alias(&self, name: &str) -> Option<String> {
        self.aliases.get(name).cloned()
    }

    /// Expands a `~` or `~user` expression.
    pub fn expand_tilde(&self, expression: &str) -> String {
        expansion::expand_tilde(expression)
    }

    /// Expands a glob pattern against the working directory.
    pub fn expand_globs(&self, pattern: &str) -> Vec<String> {
        patterns::expand_glob(pattern, &self.cwd)
    }

    /// Resolves a possibly-relative path against the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        };

        joined.canonicalize().unwrap_or(joined)
    }

    /// Appends a line to the in-memory history.
    pub fn add_history_entry(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !line.trim().is_empty() {
            self.history.push(line);
        }
    }

    /// Persists the in-memory history to disk.
    pub fn save_history(&self) {
        if let Err(err) = history::save(&self.home, self.history.iter().map(String::as_str)) {
            tracing::warn!("failed to save history: {err}");
        }
    }

    /// Signals all remaining jobs on shell teardown: jobs not in the background
    /// are continued, every job is hung up, and whatever survives a short grace
    /// period is killed.
    pub fn stop_all_jobs(&mut self) {
        if self.jobs.is_empty() {
            return;
        }

        println!("Killing active jobs");
        for job in self.jobs.iter() {
            let job = job.lock().unwrap();
            if !job.is_running_in_background() {
                let _ = sys::signal::continue_process_group(job.pgid());
            }
            let _ = sys::signal::hangup_process_group(job.pgid());
        }

        std::thread::sleep(std::time::Duration::from_millis(10));

        for job in self.jobs.drain() {
            let job = job.lock().unwrap();
            let _ = sys::signal::kill_process_group(job.pgid());
        }
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<&builtins::Registration> {
        self.builtins.get(name)
    }

    pub(crate) fn apply_builtin_exit(&mut self, exit_code: BuiltinExitCode) {
        if let BuiltinExitCode::ExitShell(_) = &exit_code {
            self.should_exit = true;
        }

        self.last_return_code = exit_code.into();
    }

    pub(crate) fn default_termios(&self) -> Option<&TerminalSettings> {
        self.default_termios.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() -> Result<()> {
        let mut shell = Shell::new()?;
        assert_eq!(shell.run_command_text("   ").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_syntax_errors_yield_exit_code_one() -> Result<()> {
        let mut shell = Shell::new()?;
        assert_eq!(shell.run_command_text("echo 'unterminated").await?, 1);
        Ok(())
    }

    #[test]
    fn test_local_variable_accessors() -> Result<()> {
        let mut shell = Shell::new()?;

        shell.set_local_variable("IFS", Value::string(","));
        assert_eq!(shell.local_variable_or("IFS", "\n"), ",");

        shell.unset_local_variable("IFS");
        assert_eq!(shell.local_variable_or("IFS", "\n"), "\n");

        Ok(())
    }

    #[test]
    fn test_history_entries_skip_blanks() -> Result<()> {
        let mut shell = Shell::new()?;
        let baseline = shell.history.len();

        shell.add_history_entry("echo hi");
        shell.add_history_entry("   ");

        assert_eq!(shell.history.len(), baseline + 1);
        Ok(())
    }
}
