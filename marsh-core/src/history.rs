//! Command history persistence.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error;

/// Returns the path of the history file under the given home directory.
pub fn history_path(home: &Path) -> PathBuf {
    home.join(".history")
}

/// Loads history entries, one per line. A missing or unreadable file yields no
/// entries.
pub fn load(home: &Path) -> Vec<String> {
    let Ok(file) = std::fs::File::open(history_path(home)) else {
        return vec![];
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Rewrites the history file with the given entries, one per line, readable only
/// by the owning user.
pub fn save<'a>(
    home: &Path,
    entries: impl Iterator<Item = &'a str>,
) -> Result<(), error::Error> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(history_path(home))?;

    for entry in entries {
        writeln!(file, "{entry}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_round_trip() -> Result<()> {
        let home = assert_fs::TempDir::new()?;

        let entries = ["echo hi", "ls -l /tmp"];
        save(home.path(), entries.iter().copied())?;

        assert_eq!(load(home.path()), entries);

        Ok(())
    }

    #[test]
    fn test_history_file_is_private() -> Result<()> {
        let home = assert_fs::TempDir::new()?;
        save(home.path(), ["secret command"].into_iter())?;

        let mode = std::fs::metadata(history_path(home.path()))?
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        Ok(())
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let home = assert_fs::TempDir::new().unwrap();
        assert!(load(home.path()).is_empty());
    }
}
