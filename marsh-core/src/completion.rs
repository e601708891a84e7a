//! Completion suggestions for the line editor.

use std::path::Path;

use marsh_parser::ast::NodeKind;

use crate::builtins;

/// Completes the token at the given byte offset. Returns the offset where the
/// completed token starts and the candidate replacements for it.
pub fn complete_line(line: &str, pos: usize) -> (usize, Vec<String>) {
    let Some(node) = marsh_parser::parse(line) else {
        return (pos, vec![]);
    };

    let hit = node.hit_test_position(pos);
    let Some(matching) = hit.matching_node else {
        return (pos, vec![]);
    };

    let NodeKind::Bareword(text) = matching.kind() else {
        return (pos, vec![]);
    };

    let start = matching.position().start_offset;
    if pos < start {
        return (pos, vec![]);
    }

    let corrected_offset = pos - start;
    if corrected_offset > text.len() {
        return (pos, vec![]);
    }
    let prefix = &text[..corrected_offset];

    // The first word of a command completes program names; everything after it
    // completes paths.
    let completes_program = hit
        .closest_command_node
        .and_then(|command| command.leftmost_trivial_literal())
        .is_some_and(|literal| std::ptr::eq(literal, matching));

    let candidates = if completes_program {
        complete_program(prefix)
    } else {
        complete_path(prefix)
    };

    (start, candidates)
}

/// Completes a program name from the built-in table and the directories in
/// `PATH`. A prefix containing a slash completes as a path instead.
pub fn complete_program(prefix: &str) -> Vec<String> {
    if prefix.contains('/') {
        return complete_path(prefix);
    }

    let mut results: Vec<String> = builtins::builtin_names()
        .iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| (*name).to_owned())
        .collect();

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in path_var.split(':').filter(|dir| !dir.is_empty()) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };

            for entry in entries.filter_map(Result::ok) {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with(prefix) && is_executable_file(&entry.path()) {
                    results.push(name);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    results
}

/// Completes a filesystem path by listing the containing directory and keeping
/// entries matching the typed prefix. Directories gain a trailing slash.
pub fn complete_path(prefix: &str) -> Vec<String> {
    let (listed_dir, typed_dir, file_prefix) = match prefix.rsplit_once('/') {
        Some(("", file)) => ("/".to_owned(), "/".to_owned(), file),
        Some((dir, file)) => (dir.to_owned(), format!("{dir}/"), file),
        None => (".".to_owned(), String::new(), prefix),
    };

    let Ok(entries) = std::fs::read_dir(&listed_dir) else {
        return vec![];
    };

    let mut results: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(file_prefix) {
                return None;
            }
            if name.starts_with('.') && !file_prefix.starts_with('.') {
                return None;
            }

            let mut candidate = format!("{typed_dir}{name}");
            if entry.file_type().is_ok_and(|file_type| file_type.is_dir()) {
                candidate.push('/');
            }
            Some(candidate)
        })
        .collect();

    results.sort();
    results
}

fn is_executable_file(path: &Path) -> bool {
    use faccess::PathExt;

    path.is_file() && path.executable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_fs::prelude::*;

    #[test]
    fn test_path_completion_lists_matching_entries() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("apple").touch()?;
        dir.child("apricot").touch()?;
        dir.child("banana").touch()?;
        dir.child("applications").create_dir_all()?;

        let prefix = format!("{}/ap", dir.path().display());
        let results = complete_path(&prefix);

        assert_eq!(
            results,
            vec![
                format!("{}/apple", dir.path().display()),
                format!("{}/applications/", dir.path().display()),
                format!("{}/apricot", dir.path().display()),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_path_completion_hides_dotfiles_unless_requested() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child(".config").touch()?;
        dir.child("visible").touch()?;

        let all = complete_path(&format!("{}/", dir.path().display()));
        assert_eq!(all, vec![format!("{}/visible", dir.path().display())]);

        let dotted = complete_path(&format!("{}/.c", dir.path().display()));
        assert_eq!(dotted, vec![format!("{}/.config", dir.path().display())]);

        Ok(())
    }

    #[test]
    fn test_program_completion_includes_builtins() {
        let results = complete_program("pw");
        assert!(results.contains(&"pwd".to_owned()));

        let results = complete_program("setop");
        assert!(results.contains(&"setopt".to_owned()));
    }

    #[test]
    fn test_complete_line_completes_the_first_word_as_a_program() {
        let (start, candidates) = complete_line("setop", 5);
        assert_eq!(start, 0);
        assert!(candidates.contains(&"setopt".to_owned()));
    }

    #[test]
    fn test_complete_line_completes_later_words_as_paths() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("notes.txt").touch()?;

        let line = format!("cat {}/no", dir.path().display());
        let (start, candidates) = complete_line(&line, line.len());

        assert_eq!(start, 4);
        assert_eq!(
            candidates,
            vec![format!("{}/notes.txt", dir.path().display())]
        );

        Ok(())
    }
}
