//! Reduces AST nodes to values: the composition rules for pipes, sequences,
//! logical operators, background markers, capture expressions, variable
//! declarations, and dynamic evaluation.

use std::io::Read;
use std::os::fd::{AsRawFd, OwnedFd};

use marsh_parser::ast::{self, NodeKind};

use crate::commands::{Command, join_commands};
use crate::error;
use crate::redirect::{self, PathRedirectionMode, Redirection};
use crate::shell::Shell;
use crate::values::Value;
use crate::{aliases, spawn};

/// Evaluation of an AST node within a shell.
#[async_trait::async_trait]
pub trait Evaluate {
    /// Reduces this node to a value, launching processes where the node calls
    /// for it.
    async fn eval(&self, shell: &mut Shell) -> Result<Value, error::Error>;
}

#[async_trait::async_trait]
impl Evaluate for ast::Node {
    async fn eval(&self, shell: &mut Shell) -> Result<Value, error::Error> {
        match self.kind() {
            NodeKind::Bareword(text) | NodeKind::StringLiteral(text) => {
                Ok(Value::string(text.clone()))
            }

            NodeKind::DoubleQuotedString(None) => Ok(Value::string("")),
            NodeKind::DoubleQuotedString(Some(inner)) => {
                let value = inner.eval(shell).await?;
                Ok(Value::string(value.resolve_as_list(shell).concat()))
            }

            NodeKind::Glob(pattern) => Ok(Value::Glob(pattern.clone())),
            NodeKind::Tilde(username) => Ok(Value::Tilde(username.clone())),
            NodeKind::SimpleVariable(name) => Ok(Value::SimpleVariable(name.clone())),
            NodeKind::SpecialVariable(name) => Ok(Value::SpecialVariable(*name)),

            NodeKind::Juxtaposition(left, right) => {
                let left_value = left.eval(shell).await?.resolve_without_cast(shell);
                let right_value = right.eval(shell).await?.resolve_without_cast(shell);

                let left_list = left_value.resolve_as_list(shell);
                let right_list = right_value.resolve_as_list(shell);

                if left_value.is_string()
                    && right_value.is_string()
                    && left_list.len() == 1
                    && right_list.len() == 1
                {
                    let mut text = left_list.into_iter().next().unwrap();
                    text.push_str(&right_list[0]);
                    return Ok(Value::string(text));
                }

                if left_list.is_empty() || right_list.is_empty() {
                    return Ok(Value::empty_list());
                }

                let mut product = Vec::with_capacity(left_list.len() * right_list.len());
                for left_element in &left_list {
                    for right_element in &right_list {
                        product.push(Value::string(format!("{left_element}{right_element}")));
                    }
                }

                Ok(Value::List(product))
            }

            NodeKind::StringPartCompose(left, right) => {
                let left_list = left.eval(shell).await?.resolve_as_list(shell);
                let right_list = right.eval(shell).await?.resolve_as_list(shell);

                let mut text = left_list.join(" ");
                text.push_str(&right_list.join(" "));

                Ok(Value::string(text))
            }

            NodeKind::ListConcatenate(element, list) => {
                let list_value = list.eval(shell).await?.resolve_without_cast(shell);
                let element_value = element.eval(shell).await?.resolve_without_cast(shell);

                if list_value.is_command() || element_value.is_command() {
                    let joined = join_commands(
                        element_value.resolve_as_commands(shell),
                        list_value.resolve_as_commands(shell),
                    );

                    if joined.len() == 1 {
                        return Ok(Value::Command(joined.into_iter().next().unwrap()));
                    }
                    return Ok(Value::CommandSequence(joined));
                }

                Ok(Value::List(vec![element_value, list_value]))
            }

            NodeKind::CastToCommand(inner) => {
                if inner.is_command() {
                    return inner.eval(shell).await;
                }

                let value = inner.eval(shell).await?.resolve_without_cast(shell);
                if value.is_command() {
                    return Ok(value);
                }

                let argv = value.resolve_as_list(shell);
                Ok(Value::Command(Command::from_argv(argv)))
            }

            NodeKind::CastToList(None) => Ok(Value::empty_list()),
            NodeKind::CastToList(Some(inner)) => {
                let inner_value = inner.eval(shell).await?;
                if inner_value.is_command() {
                    return Ok(inner_value);
                }

                let values = inner_value
                    .resolve_as_list(shell)
                    .into_iter()
                    .map(Value::string)
                    .collect();
                Ok(Value::List(values))
            }

            NodeKind::Sequence(left, right) => {
                // A sequence that spawns processes blocks on its left side before
                // the right side runs.
                if self.would_execute() {
                    let left_value = eval_execute(shell, left, false).await?;
                    if let Value::Job(Some(job)) = &left_value {
                        let job = job.clone();
                        shell.block_on_job(&job).await?;
                    }

                    if right.would_execute() {
                        return right.eval(shell).await;
                    }
                    return eval_execute(shell, right, false).await;
                }

                let left_commands = left.eval(shell).await?.resolve_as_commands(shell);

                // A comment next to a command leaves a fully empty left side.
                if left_commands.len() == 1 && left_commands[0].is_empty() {
                    return right.eval(shell).await;
                }

                let right_commands = right.eval(shell).await?.resolve_as_commands(shell);

                let mut commands = left_commands;
                commands.extend(right_commands);
                Ok(Value::CommandSequence(commands))
            }

            NodeKind::And(left, right) => {
                let left_value = left.eval(shell).await?;
                let job = match &left_value {
                    Value::Job(Some(job)) => job.clone(),
                    // The launch went wrong; treat it as a failure.
                    Value::Job(None) => return Ok(left_value),
                    _ => {
                        tracing::warn!("left side of '&&' did not yield a job");
                        return Ok(left_value);
                    }
                };

                shell.block_on_job(&job).await?;

                if job.lock().unwrap().exit_code() == Some(0) {
                    return right.eval(shell).await;
                }

                Ok(left_value)
            }

            NodeKind::Or(left, right) => {
                let left_value = left.eval(shell).await?;
                let job = match &left_value {
                    Value::Job(Some(job)) => job.clone(),
                    Value::Job(None) => return right.eval(shell).await,
                    _ => {
                        tracing::warn!("left side of '||' did not yield a job");
                        return right.eval(shell).await;
                    }
                };

                shell.block_on_job(&job).await?;

                if job.lock().unwrap().exit_code() == Some(0) {
                    return Ok(left_value);
                }

                right.eval(shell).await
            }

            NodeKind::Pipe(left, right) => {
                let mut left_commands = left.eval(shell).await?.resolve_as_commands(shell);
                let mut right_commands = right.eval(shell).await?.resolve_as_commands(shell);

                let (write_endpoint, read_endpoint) = redirect::pipe_pair();

                let mut last_in_left = left_commands.pop().unwrap_or_default();
                last_in_left.redirections.push(write_endpoint);
                last_in_left.should_wait = false;
                last_in_left.is_pipe_source = true;

                let mut first_in_right = if right_commands.is_empty() {
                    Command::default()
                } else {
                    right_commands.remove(0)
                };
                first_in_right.redirections.push(read_endpoint);

                let mut commands = left_commands;
                commands.push(last_in_left);
                commands.push(first_in_right);
                commands.extend(right_commands);

                Ok(Value::CommandSequence(commands))
            }

            NodeKind::Background(inner) => {
                let mut commands = inner.eval(shell).await?.resolve_as_commands(shell);
                if let Some(last) = commands.last_mut() {
                    last.should_wait = false;
                }

                Ok(Value::CommandSequence(commands))
            }

            NodeKind::Execute {
                command,
                capture_stdout,
            } => eval_execute(shell, command, *capture_stdout).await,

            NodeKind::VariableDeclarations(decls) => {
                for decl in decls {
                    let names = decl.name.eval(shell).await?.resolve_as_list(shell);
                    let Some(name) = names.into_iter().next() else {
                        continue;
                    };

                    let value = decl.value.eval(shell).await?;
                    let stored = if value.is_command() {
                        // Stored as-is; re-resolved when read.
                        value
                    } else if is_list_shaped(&value) {
                        let parts = value.resolve_as_list(shell);
                        Value::List(parts.into_iter().map(Value::string).collect())
                    } else {
                        let parts = value.resolve_as_list(shell);
                        Value::string(parts.into_iter().next().unwrap_or_default())
                    };

                    shell.set_local_variable(name, stored);
                }

                Ok(Value::empty_list())
            }

            NodeKind::DynamicEvaluate(inner) => {
                let value = inner.eval(shell).await?.resolve_without_cast(shell);

                // Strings are treated as variable names; everything else is
                // treated as the argv of a command.
                if value.is_string() {
                    let name = value
                        .resolve_as_list(shell)
                        .into_iter()
                        .next()
                        .unwrap_or_default();
                    return Ok(Value::SimpleVariable(name));
                }

                let argv = value.resolve_as_list(shell);
                Ok(Value::Command(Command::from_argv(argv)))
            }

            NodeKind::PathRedirection { fd, mode, path } => {
                let segments = path.eval(shell).await?.resolve_as_list(shell);
                let mode = match mode {
                    ast::RedirectionMode::Read => PathRedirectionMode::Read,
                    ast::RedirectionMode::Write => PathRedirectionMode::Write,
                    ast::RedirectionMode::ReadWrite => PathRedirectionMode::ReadWrite,
                    ast::RedirectionMode::WriteAppend => PathRedirectionMode::WriteAppend,
                };

                Ok(Value::Command(Command::from_redirection(
                    Redirection::Path {
                        fd: *fd,
                        path: segments.join(" "),
                        mode,
                    },
                )))
            }

            NodeKind::CloseFdRedirection(fd) => Ok(Value::Command(Command::from_redirection(
                Redirection::Close { fd: *fd },
            ))),

            NodeKind::Fd2FdRedirection { source_fd, dest_fd } => {
                Ok(Value::Command(Command::from_redirection(
                    Redirection::Fd2Fd {
                        source_fd: *source_fd,
                        dest_fd: *dest_fd,
                    },
                )))
            }

            NodeKind::Comment(_) | NodeKind::SyntaxError(_) => Ok(Value::empty_list()),
        }
    }
}

/// Checks whether a value projects to a list of its own accord: real lists, and
/// strings carrying a split separator.
fn is_list_shaped(value: &Value) -> bool {
    matches!(
        value,
        Value::List(_)
            | Value::String {
                split_separator: Some(_),
                ..
            }
    )
}

/// The gateway to process creation: evaluates a node to commands, expands
/// aliases, and launches the result, optionally capturing its standard output.
pub(crate) async fn eval_execute(
    shell: &mut Shell,
    node: &ast::Node,
    capture_stdout: bool,
) -> Result<Value, error::Error> {
    // Nodes that execute on their own (sequences of executes, logical operators)
    // construct their own launches recursively.
    if node.would_execute() {
        return node.eval(shell).await;
    }

    let value = node.eval(shell).await?;
    let commands = aliases::expand_aliases(shell, value.resolve_as_commands(shell)).await?;

    if capture_stdout {
        return run_capturing(shell, commands).await;
    }

    let mut last_job = None;
    for job in spawn::run_commands(shell, &commands).await? {
        shell.block_on_job(&job).await?;
        last_job = Some(job);
    }

    Ok(Value::Job(last_job))
}

async fn run_capturing(
    shell: &mut Shell,
    mut commands: Vec<Command>,
) -> Result<Value, error::Error> {
    if commands.is_empty() {
        return Ok(Value::string(""));
    }

    let (read_end, write_redirection) = match redirect::capture_pipe() {
        Ok(allocated) => allocated,
        Err(err) => {
            tracing::error!("cannot allocate capture pipe: {err}");
            return Ok(Value::string(""));
        }
    };

    {
        let last_in_commands = commands.last_mut().unwrap();
        last_in_commands.redirections.insert(0, write_redirection);
        last_in_commands.should_wait = true;
        last_in_commands.should_notify_if_in_background = false;
        last_in_commands.is_pipe_source = false;
    }

    // Drain concurrently with the foreground wait, so a child writing more than a
    // pipe buffer cannot deadlock against the shell.
    set_nonblocking(&read_end)?;
    let drain = tokio::spawn(drain_pipe(read_end));

    for job in spawn::run_commands(shell, &commands).await? {
        shell.block_on_job(&job).await?;
    }

    let output = drain.await??;
    let text = String::from_utf8_lossy(&output).to_string();

    Ok(Value::split_string(
        text,
        shell.local_variable_or("IFS", "\n"),
        shell.options.inline_exec_keep_empty_segments,
    ))
}

fn set_nonblocking(fd: &OwnedFd) -> Result<(), error::Error> {
    nix::fcntl::fcntl(
        fd.as_raw_fd(),
        nix::fcntl::FcntlArg::F_SETFL(nix::fcntl::OFlag::O_NONBLOCK),
    )?;
    Ok(())
}

async fn drain_pipe(fd: OwnedFd) -> Result<Vec<u8>, error::Error> {
    let file = std::fs::File::from(fd);
    let async_fd = tokio::io::unix::AsyncFd::new(file)?;

    let mut output = vec![];
    let mut buffer = [0u8; 4096];

    loop {
        let mut guard = async_fd.readable().await?;
        match guard.try_io(|inner| (&*inner.get_ref()).read(&mut buffer)) {
            Ok(Ok(0)) => break,
            Ok(Ok(count)) => output.extend_from_slice(&buffer[..count]),
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Ok(Err(err)) => return Err(err.into()),
            // Spurious readiness; wait for the next edge.
            Err(_would_block) => {}
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    async fn eval_str(shell: &mut Shell, input: &str) -> Result<Value> {
        let node = marsh_parser::parse(input).expect("input parses");
        Ok(node.eval(shell).await?)
    }

    async fn eval_unexecuted(shell: &mut Shell, input: &str) -> Result<Value> {
        // Evaluate the expression underneath the parser's execution wrapper, so
        // composition can be observed without launching anything.
        let node = marsh_parser::parse(input).expect("input parses");
        let (_, kind) = node.into_parts();
        let NodeKind::Execute { command, .. } = kind else {
            panic!("expected an execute wrapper");
        };
        Ok(command.eval(shell).await?)
    }

    async fn eval_word(shell: &mut Shell, input: &str) -> Result<Value> {
        // Reach through the execution and command-coercion wrappers to the word
        // expression itself.
        let node = marsh_parser::parse(input).expect("input parses");
        let (_, kind) = node.into_parts();
        let NodeKind::Execute { command, .. } = kind else {
            panic!("expected an execute wrapper");
        };
        let (_, kind) = command.into_parts();
        let NodeKind::CastToCommand(word) = kind else {
            panic!("expected a command cast");
        };
        Ok(word.eval(shell).await?)
    }

    #[tokio::test]
    async fn test_double_quoted_string_round_trips() -> Result<()> {
        let mut shell = Shell::new()?;
        let value = eval_word(&mut shell, "\"hello world\"").await?;
        assert_eq!(value.resolve_as_list(&shell), vec!["hello world"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_juxtaposition_of_strings_concatenates() -> Result<()> {
        let mut shell = Shell::new()?;
        let value = eval_word(&mut shell, "foo'bar'").await?;
        assert_eq!(value.resolve_as_list(&shell), vec!["foobar"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_juxtaposition_of_lists_is_a_cartesian_product() -> Result<()> {
        let mut shell = Shell::new()?;
        shell.set_local_variable(
            "LEFT",
            Value::List(vec![Value::string("a"), Value::string("b")]),
        );
        shell.set_local_variable(
            "RIGHT",
            Value::List(vec![Value::string("x"), Value::string("y")]),
        );

        let value = eval_word(&mut shell, "$LEFT$RIGHT").await?;
        assert_eq!(value.resolve_as_list(&shell), vec!["ax", "ay", "bx", "by"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_variable_declaration_round_trips() -> Result<()> {
        let mut shell = Shell::new()?;
        eval_str(&mut shell, "FOO=bar").await?;

        let stored = shell.lookup_local_variable("FOO").cloned().unwrap();
        assert_eq!(stored.resolve_as_list(&shell), vec!["bar"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_command_composition_without_execution() -> Result<()> {
        let mut shell = Shell::new()?;

        let value = eval_unexecuted(&mut shell, "echo a b | wc -l").await?;
        let commands = value.resolve_as_commands(&shell);

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].argv, vec!["echo", "a", "b"]);
        assert!(!commands[0].should_wait);
        assert!(commands[0].is_pipe_source);
        assert_eq!(commands[0].redirections.len(), 1);

        assert_eq!(commands[1].argv, vec!["wc", "-l"]);
        assert!(commands[1].should_wait);
        assert!(!commands[1].is_pipe_source);
        Ok(())
    }

    #[tokio::test]
    async fn test_background_marks_last_command() -> Result<()> {
        let mut shell = Shell::new()?;

        let value = eval_unexecuted(&mut shell, "sleep 5 &").await?;
        let commands = value.resolve_as_commands(&shell);

        assert_eq!(commands.len(), 1);
        assert!(!commands[0].should_wait);
        Ok(())
    }

    #[tokio::test]
    async fn test_redirection_composes_onto_command() -> Result<()> {
        let mut shell = Shell::new()?;

        let value = eval_unexecuted(&mut shell, "echo hi > /tmp/marsh-test-out").await?;
        let commands = value.resolve_as_commands(&shell);

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["echo", "hi"]);
        assert!(matches!(
            &commands[0].redirections[..],
            [Redirection::Path { fd: 1, .. }]
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_sequence_composes_command_sequences() -> Result<()> {
        let mut shell = Shell::new()?;

        let value = eval_unexecuted(&mut shell, "echo a; echo b").await?;
        let commands = value.resolve_as_commands(&shell);

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].argv, vec!["echo", "a"]);
        assert_eq!(commands[1].argv, vec!["echo", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_comment_evaluates_to_empty() -> Result<()> {
        let mut shell = Shell::new()?;
        let value = eval_str(&mut shell, "# nothing here").await?;
        assert!(matches!(value, Value::Job(None)));
        Ok(())
    }

    #[tokio::test]
    async fn test_dynamic_evaluate_of_string_names_a_variable() -> Result<()> {
        let mut shell = Shell::new()?;
        shell.set_local_variable("INner", Value::string("resolved"));
        shell.set_local_variable("OUTER", Value::string("INner"));

        let value = eval_word(&mut shell, "$$OUTER").await?;
        assert_eq!(value.resolve_as_list(&shell), vec!["resolved"]);
        Ok(())
    }
}
