//! End-to-end tests that parse, evaluate, and actually launch child processes.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use assert_fs::prelude::*;
use marsh_core::{Shell, Value};

// Job reaping uses waitpid(-1), so tests that spawn children cannot overlap
// within the test process.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[tokio::test]
async fn test_exit_codes_propagate() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    assert_eq!(shell.run_command_text("true").await?, 0);
    assert_eq!(shell.run_command_text("false").await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_pipeline_runs_and_reports_last_stage() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    let code = shell.run_command_text("echo a b | wc -l").await?;
    assert_eq!(code, 0);

    // Both stages have been reaped by the time the pipeline returns.
    assert!(shell.jobs.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_write_redirection_and_conjunction() -> Result<()> {
    let _guard = serial();
    let dir = assert_fs::TempDir::new()?;
    let path = dir.path().join("t");

    let mut shell = Shell::new()?;
    let code = shell
        .run_command_text(&format!(
            "echo hi > {path} && cat {path}",
            path = path.display()
        ))
        .await?;

    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&path)?, "hi\n");

    Ok(())
}

#[tokio::test]
async fn test_or_recovers_from_failure() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    let code = shell.run_command_text("false || echo recovered").await?;
    assert_eq!(code, 0);

    Ok(())
}

#[tokio::test]
async fn test_and_short_circuits_on_failure() -> Result<()> {
    let _guard = serial();
    let dir = assert_fs::TempDir::new()?;
    let path = dir.path().join("not-created");

    let mut shell = Shell::new()?;
    let code = shell
        .run_command_text(&format!("false && touch {}", path.display()))
        .await?;

    assert_ne!(code, 0);
    assert!(!path.exists());

    Ok(())
}

#[tokio::test]
async fn test_variable_declaration_persists_across_sequence() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    let code = shell.run_command_text("FOO=bar; echo $FOO").await?;
    assert_eq!(code, 0);

    let value = shell.lookup_local_variable("FOO").cloned().unwrap();
    assert_eq!(value.resolve_as_list(&shell), vec!["bar"]);

    Ok(())
}

#[tokio::test]
async fn test_capture_expression_splits_on_newlines() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    shell.run_command_text("OUT=$(echo hello world)").await?;

    let value = shell.lookup_local_variable("OUT").cloned().unwrap();
    assert_eq!(value.resolve_as_list(&shell), vec!["hello world"]);

    Ok(())
}

#[tokio::test]
async fn test_capture_expression_drains_more_than_one_buffer() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    shell.run_command_text("OUT=$(seq 1 2000)").await?;

    let value = shell.lookup_local_variable("OUT").cloned().unwrap();
    let lines = value.resolve_as_list(&shell);
    assert_eq!(lines.len(), 2000);
    assert_eq!(lines[0], "1");
    assert_eq!(lines[1999], "2000");

    Ok(())
}

#[tokio::test]
async fn test_read_and_write_redirections() -> Result<()> {
    let _guard = serial();
    let dir = assert_fs::TempDir::new()?;
    let input = dir.child("in");
    input.write_str("copy me\n")?;
    let output = dir.path().join("out");

    let mut shell = Shell::new()?;
    let code = shell
        .run_command_text(&format!(
            "cat < {} > {}",
            input.path().display(),
            output.display()
        ))
        .await?;

    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&output)?, "copy me\n");

    Ok(())
}

#[tokio::test]
async fn test_stderr_redirection() -> Result<()> {
    let _guard = serial();
    let dir = assert_fs::TempDir::new()?;
    let path = dir.path().join("err");

    let mut shell = Shell::new()?;
    let code = shell
        .run_command_text(&format!("ls /marsh/definitely/missing 2> {}", path.display()))
        .await?;

    assert_ne!(code, 0);
    assert!(!std::fs::read_to_string(&path)?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_missing_command_reports_exec_failure_code() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    let code = shell
        .run_command_text("definitely-not-a-real-command-xyz")
        .await?;
    assert_eq!(code, 126);

    Ok(())
}

#[tokio::test]
async fn test_background_commands_do_not_block() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    let code = shell.run_command_text("sleep 0.2 &").await?;
    assert_eq!(code, 0);
    assert!(!shell.jobs.is_empty());

    // Wait the job out so it does not leak into other tests.
    let job = shell.jobs.iter().next().cloned().unwrap();
    shell.block_on_job(&job).await?;
    assert!(job.lock().unwrap().exited());
    assert!(shell.jobs.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_alias_expansion_end_to_end() -> Result<()> {
    let _guard = serial();
    let dir = assert_fs::TempDir::new()?;
    dir.child("present").touch()?;

    let mut shell = Shell::new()?;
    shell
        .aliases
        .insert("l1".into(), "ls -1".into());

    shell
        .run_command_text(&format!("OUT=$(l1 {})", dir.path().display()))
        .await?;

    let value = shell.lookup_local_variable("OUT").cloned().unwrap();
    assert_eq!(value.resolve_as_list(&shell), vec!["present"]);

    Ok(())
}

#[tokio::test]
async fn test_glob_arguments_expand_in_commands() -> Result<()> {
    let _guard = serial();
    let dir = assert_fs::TempDir::new()?;
    dir.child("a.log").write_str("x")?;
    dir.child("b.log").write_str("y")?;
    dir.child("c.txt").write_str("z")?;

    let mut shell = Shell::new()?;
    shell
        .run_command_text(&format!("OUT=$(ls -1 {}/*.log)", dir.path().display()))
        .await?;

    let value = shell.lookup_local_variable("OUT").cloned().unwrap();
    let listed = value.resolve_as_list(&shell);
    assert_eq!(listed.len(), 2);
    assert!(listed[0].ends_with("a.log"));
    assert!(listed[1].ends_with("b.log"));

    Ok(())
}

#[tokio::test]
async fn test_builtin_commands_run_in_shell() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    shell.run_command_text("setopt verbose on").await?;
    assert!(shell.options.verbose);

    shell.run_command_text("setopt verbose off").await?;
    assert!(!shell.options.verbose);

    shell.run_command_text("exit 3").await?;
    assert!(shell.should_exit);

    Ok(())
}

#[tokio::test]
async fn test_special_variable_reflects_last_exit_code() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    shell.run_command_text("false").await?;
    shell.run_command_text("STATUS=$?").await?;

    let value = shell.lookup_local_variable("STATUS").cloned().unwrap();
    assert_eq!(value.resolve_as_list(&shell), vec!["1"]);

    Ok(())
}

#[tokio::test]
async fn test_command_values_stored_in_variables() -> Result<()> {
    let _guard = serial();
    let mut shell = Shell::new()?;

    shell.set_local_variable(
        "CMD",
        Value::Command(marsh_core::Command::from_argv(vec![
            "echo".into(),
            "stored".into(),
        ])),
    );

    // Stored as-is: commands stay opaque to list projection.
    let value = shell.lookup_local_variable("CMD").cloned().unwrap();
    assert!(value.resolve_as_list(&shell).is_empty());
    let commands = value.resolve_as_commands(&shell);
    assert_eq!(commands[0].argv, vec!["echo", "stored"]);

    Ok(())
}
