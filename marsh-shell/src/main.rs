//! Command-line interface for the marsh shell.

mod helper;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;

use crate::helper::MarshHelper;

/// An interactive POSIX-style command shell.
#[derive(Parser)]
#[command(name = "marsh", version, about)]
struct CommandLineArgs {
    /// Run the given command text instead of reading commands interactively.
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// A script file to run.
    script: Option<PathBuf>,

    /// Echo each launched command to stderr.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = CommandLineArgs::parse();

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("marsh: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CommandLineArgs) -> Result<u8, marsh_core::Error> {
    let mut shell = marsh_core::Shell::new()?;
    shell.options.verbose = args.verbose;

    if let Some(text) = &args.command {
        return shell.run_command_text(text).await;
    }

    if let Some(script) = &args.script {
        if !shell.run_file(script).await? {
            return Ok(1);
        }
        return Ok(shell.last_return_code);
    }

    run_interactive(&mut shell).await
}

async fn run_interactive(shell: &mut marsh_core::Shell) -> Result<u8, marsh_core::Error> {
    shell.options.interactive = std::io::stdin().is_terminal();

    let mut editor: Editor<MarshHelper, DefaultHistory> =
        Editor::new().map_err(|err| std::io::Error::other(err.to_string()))?;
    editor.set_helper(Some(MarshHelper {
        hostname: shell.hostname.clone(),
    }));

    for entry in &shell.history {
        let _ = editor.add_history_entry(entry);
    }

    loop {
        let prompt = marsh_core::prompt::render(shell);

        match editor.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let _ = editor.add_history_entry(line.as_str());
                shell.add_history_entry(line.as_str());

                if let Err(err) = shell.run_command_text(&line).await {
                    eprintln!("marsh: {err}");
                }

                if shell.should_exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {}
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("marsh: {err}");
                break;
            }
        }
    }

    shell.save_history();
    shell.stop_all_jobs();

    Ok(shell.last_return_code)
}
