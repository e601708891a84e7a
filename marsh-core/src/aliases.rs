//! Alias expansion over resolved commands.
//!
//! Each command whose first argv token names an alias is replaced by the result of
//! parsing and evaluating the alias text, with the remainder of the original
//! command fused onto it. A substitution whose first token equals the alias name
//! is kept verbatim, which breaks direct self-reference; a per-command visited set
//! bounds multi-step cycles.

use std::collections::HashSet;

use crate::commands::{Command, join_commands};
use crate::error;
use crate::interp::Evaluate;
use crate::shell::Shell;

/// Expands aliases in the given commands, returning the substituted list.
pub(crate) async fn expand_aliases(
    shell: &mut Shell,
    initial_commands: Vec<Command>,
) -> Result<Vec<Command>, error::Error> {
    let mut commands = vec![];
    let mut visited = HashSet::new();

    for command in initial_commands {
        visited.clear();
        resolve_aliases_and_append(shell, command, &mut visited, &mut commands).await?;
    }

    Ok(commands)
}

#[async_recursion::async_recursion]
async fn resolve_aliases_and_append(
    shell: &mut Shell,
    command: Command,
    visited: &mut HashSet<String>,
    output: &mut Vec<Command>,
) -> Result<(), error::Error> {
    let Some(first_token) = command.argv.first().cloned() else {
        output.push(command);
        return Ok(());
    };

    let Some(alias_text) = shell.resolve_alias(&first_token) else {
        output.push(command);
        return Ok(());
    };

    if !visited.insert(first_token.clone()) {
        output.push(command);
        return Ok(());
    }

    let Some(alias_ast) = marsh_parser::parse(&alias_text) else {
        output.push(command);
        return Ok(());
    };

    // The parser wraps its result for execution; the alias body is composed into
    // the original command rather than run on its own.
    let alias_ast = unwrap_execute_nodes(alias_ast);
    let alias_value = alias_ast.eval(shell).await?;

    let mut remainder = command;
    remainder.argv.remove(0);

    let substituted = join_commands(alias_value.resolve_as_commands(shell), vec![remainder]);
    for command in substituted {
        if command.argv.first() == Some(&first_token) {
            // Disallow an alias resolving to itself.
            output.push(command);
        } else {
            resolve_aliases_and_append(shell, command, visited, output).await?;
        }
    }

    Ok(())
}

fn unwrap_execute_nodes(mut node: marsh_parser::ast::Node) -> marsh_parser::ast::Node {
    while matches!(node.kind(), marsh_parser::ast::NodeKind::Execute { .. }) {
        let (_, kind) = node.into_parts();
        let marsh_parser::ast::NodeKind::Execute { command, .. } = kind else {
            unreachable!();
        };
        node = *command;
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn test_simple_alias_substitution() -> Result<()> {
        let mut shell = Shell::new()?;
        shell.aliases.insert("ll".into(), "ls -l".into());

        let commands = expand_aliases(
            &mut shell,
            vec![Command::from_argv(vec!["ll".into(), "/tmp".into()])],
        )
        .await?;

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["ls", "-l", "/tmp"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_direct_self_reference_does_not_recurse() -> Result<()> {
        let mut shell = Shell::new()?;
        shell.aliases.insert("ls".into(), "ls --color".into());

        let commands = expand_aliases(
            &mut shell,
            vec![Command::from_argv(vec!["ls".into(), "/tmp".into()])],
        )
        .await?;

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["ls", "--color", "/tmp"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_chained_aliases_expand_through() -> Result<()> {
        let mut shell = Shell::new()?;
        shell.aliases.insert("ll".into(), "ls -l".into());
        shell.aliases.insert("ls".into(), "ls --color".into());

        let commands = expand_aliases(
            &mut shell,
            vec![Command::from_argv(vec!["ll".into(), "/tmp".into()])],
        )
        .await?;

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["ls", "--color", "-l", "/tmp"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_mutual_cycle_terminates() -> Result<()> {
        let mut shell = Shell::new()?;
        shell.aliases.insert("a".into(), "b".into());
        shell.aliases.insert("b".into(), "a".into());

        let commands =
            expand_aliases(&mut shell, vec![Command::from_argv(vec!["a".into()])]).await?;

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["a"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_alias_commands_pass_through() -> Result<()> {
        let mut shell = Shell::new()?;

        let original = Command::from_argv(vec!["cat".into(), "file".into()]);
        let commands = expand_aliases(&mut shell, vec![original.clone()]).await?;

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, original.argv);
        Ok(())
    }
}
