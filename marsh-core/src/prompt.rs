//! Prompt rendering.

use crate::shell::Shell;

/// Renders the shell's prompt. With `PROMPT` set in the environment, its escape
/// sequences are expanded; otherwise a default prompt is produced.
pub fn render(shell: &Shell) -> String {
    match std::env::var("PROMPT") {
        Ok(spec) => expand_spec(&spec, shell),
        Err(_) => default_prompt(shell),
    }
}

fn default_prompt(shell: &Shell) -> String {
    if shell.uid == 0 {
        return "# ".to_owned();
    }

    let cwd = shell.cwd.to_string_lossy();
    format!(
        "\x1b]0;{user}@{host}:{cwd}\x07\x1b[31;1m{user}\x1b[0m@\x1b[37;1m{host}\x1b[0m:\x1b[32;1m{cwd}\x1b[0m$> ",
        user = shell.username,
        host = shell.hostname,
    )
}

fn expand_spec(spec: &str, shell: &Shell) -> String {
    let mut result = String::with_capacity(spec.len());
    let mut chars = spec.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }

        let Some(escape) = chars.next() else {
            break;
        };

        match escape {
            'X' => result.push_str("\x1b]0;"),
            'a' => result.push('\x07'),
            'e' => result.push('\x1b'),
            'u' => result.push_str(&shell.username),
            'h' => result.push_str(&shell.hostname),
            'w' => result.push_str(&tilde_contracted_cwd(shell)),
            'p' => result.push(if shell.uid == 0 { '#' } else { '$' }),
            _ => {}
        }
    }

    result
}

fn tilde_contracted_cwd(shell: &Shell) -> String {
    let cwd = shell.cwd.to_string_lossy();
    let home = shell.home.to_string_lossy();

    if !home.is_empty() {
        if let Some(rest) = cwd.strip_prefix(home.as_ref()) {
            return format!("~{rest}");
        }
    }

    cwd.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn test_shell() -> Result<Shell> {
        let mut shell = Shell::new()?;
        shell.username = "alice".into();
        shell.hostname = "box".into();
        shell.home = "/home/alice".into();
        shell.cwd = "/home/alice/src".into();
        shell.uid = 1000;
        Ok(shell)
    }

    #[test]
    fn test_user_host_and_marker_escapes() -> Result<()> {
        let shell = test_shell()?;
        assert_eq!(expand_spec(r"\u@\h\p ", &shell), "alice@box$ ");
        Ok(())
    }

    #[test]
    fn test_working_directory_contracts_home() -> Result<()> {
        let mut shell = test_shell()?;
        assert_eq!(expand_spec(r"\w", &shell), "~/src");

        shell.cwd = "/etc".into();
        assert_eq!(expand_spec(r"\w", &shell), "/etc");
        Ok(())
    }

    #[test]
    fn test_control_escapes() -> Result<()> {
        let shell = test_shell()?;
        assert_eq!(expand_spec(r"\a\e", &shell), "\x07\x1b");
        assert_eq!(expand_spec(r"\X", &shell), "\x1b]0;");
        Ok(())
    }

    #[test]
    fn test_root_marker() -> Result<()> {
        let mut shell = test_shell()?;
        shell.uid = 0;
        assert_eq!(expand_spec(r"\p", &shell), "#");
        assert_eq!(default_prompt(&shell), "# ");
        Ok(())
    }
}
