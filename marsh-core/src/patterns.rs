//! Filename patterns: translation of POSIX wildcards to regular expressions, and
//! expansion against the filesystem.

use std::path::{Path, PathBuf};

use crate::error;

/// Checks whether the given text contains glob metacharacters.
pub(crate) fn is_glob(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// Translates a single pattern segment into an anchored regular expression string.
/// Only the POSIX wildcards `*` and `?` are special; everything else matches
/// literally.
pub(crate) fn pattern_to_regex_str(pattern: &str) -> String {
    let mut regex_str = String::with_capacity(pattern.len() + 2);
    regex_str.push('^');

    for c in pattern.chars() {
        match c {
            '*' => regex_str.push_str(".*"),
            '?' => regex_str.push('.'),
            c if "\\.+()|[]{}^$#&-~".contains(c) => {
                regex_str.push('\\');
                regex_str.push(c);
            }
            c => regex_str.push(c),
        }
    }

    regex_str.push('$');
    regex_str
}

fn to_regex(pattern: &str) -> Result<fancy_regex::Regex, error::Error> {
    let regex_str = pattern_to_regex_str(pattern);
    let regex = fancy_regex::Regex::new(&regex_str)
        .map_err(|_| error::Error::InvalidPattern(pattern.to_owned()))?;
    Ok(regex)
}

/// Expands a glob pattern against the filesystem, starting from the root for
/// absolute patterns and from `working_dir` otherwise. Results are relative when
/// the pattern was, sorted lexicographically, and duplicate-free. A pattern with
/// no matches yields an empty list.
pub(crate) fn expand_glob(pattern: &str, working_dir: &Path) -> Vec<String> {
    let is_absolute = pattern.starts_with('/');
    let base = if is_absolute {
        PathBuf::from("/")
    } else {
        working_dir.to_path_buf()
    };

    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();

    let mut matches = vec![];
    expand_segments(&segments, base.clone(), &mut matches);

    tracing::debug!("glob '{pattern}' matched {} path(s)", matches.len());

    let mut prefix = base.to_string_lossy().to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }

    let mut results: Vec<String> = matches
        .into_iter()
        .map(|path| {
            let path_str = path.to_string_lossy().to_string();
            if is_absolute {
                return path_str;
            }

            let relative = path_str.strip_prefix(&prefix).unwrap_or(&path_str);
            if relative.is_empty() {
                ".".to_owned()
            } else {
                relative.to_owned()
            }
        })
        .collect();

    results.sort();
    results.dedup();

    results
}

fn expand_segments(segments: &[&str], base: PathBuf, matches: &mut Vec<PathBuf>) {
    let Some((first, rest)) = segments.split_first() else {
        if base.exists() {
            matches.push(base);
        }
        return;
    };

    if !is_glob(first) {
        // Literal segments are appended without enumerating the directory.
        expand_segments(rest, base.join(first), matches);
        return;
    }

    let Ok(regex) = to_regex(first) else {
        return;
    };

    let Ok(entries) = base.read_dir() else {
        return;
    };

    // Dotfiles have to be explicitly requested.
    let allow_dot_files = first.starts_with('.');

    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') && !allow_dot_files {
            continue;
        }

        if regex.is_match(&name).unwrap_or(false) {
            expand_segments(rest, base.join(&name), matches);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_fs::prelude::*;

    #[test]
    fn test_pattern_translation() {
        assert_eq!(pattern_to_regex_str("a"), "^a$");
        assert_eq!(pattern_to_regex_str("a*"), "^a.*$");
        assert_eq!(pattern_to_regex_str("a?"), "^a.$");
        assert_eq!(pattern_to_regex_str("*.txt"), "^.*\\.txt$");
        assert_eq!(pattern_to_regex_str("a+b"), "^a\\+b$");
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("*.rs"));
        assert!(is_glob("file?"));
        assert!(!is_glob("plain/path"));
    }

    #[test]
    fn test_expansion_is_sorted_and_relative() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("b.txt").touch()?;
        dir.child("a.txt").touch()?;
        dir.child("c.log").touch()?;

        let results = expand_glob("*.txt", dir.path());
        assert_eq!(results, vec!["a.txt", "b.txt"]);

        Ok(())
    }

    #[test]
    fn test_dotfiles_require_explicit_dot() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child(".hidden").touch()?;
        dir.child("visible").touch()?;

        assert_eq!(expand_glob("*", dir.path()), vec!["visible"]);
        assert_eq!(expand_glob(".h*", dir.path()), vec![".hidden"]);

        Ok(())
    }

    #[test]
    fn test_multi_segment_patterns() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("src").create_dir_all()?;
        dir.child("docs").create_dir_all()?;
        dir.child("src/main.rs").touch()?;
        dir.child("src/lib.rs").touch()?;
        dir.child("docs/readme.md").touch()?;

        let results = expand_glob("src/*.rs", dir.path());
        assert_eq!(results, vec!["src/lib.rs", "src/main.rs"]);

        let results = expand_glob("*/*.rs", dir.path());
        assert_eq!(results, vec!["src/lib.rs", "src/main.rs"]);

        Ok(())
    }

    #[test]
    fn test_no_matches_yields_empty_list() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("file").touch()?;

        assert!(expand_glob("*.nope", dir.path()).is_empty());

        Ok(())
    }

    #[test]
    fn test_question_mark_matches_single_character() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("ab").touch()?;
        dir.child("abc").touch()?;

        assert_eq!(expand_glob("a?", dir.path()), vec!["ab"]);

        Ok(())
    }
}
