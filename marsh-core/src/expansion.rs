//! Tilde expansion.

use std::path::PathBuf;

use crate::sys;

/// Expands a `~` or `~user` prefix to the named home directory. `~` alone resolves
/// to `$HOME` (or the passwd entry for the current user when unset); `~user/rest`
/// resolves through the passwd database. When no such user exists, the original
/// expression is returned unchanged.
pub(crate) fn expand_tilde(expression: &str) -> String {
    let Some(after_tilde) = expression.strip_prefix('~') else {
        return expression.to_owned();
    };

    let (login_name, path) = match after_tilde.find('/') {
        Some(index) => after_tilde.split_at(index),
        None => (after_tilde, ""),
    };

    let home = if login_name.is_empty() {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => match sys::users::get_current_user_home_dir() {
                Some(home) => home,
                None => return expression.to_owned(),
            },
        }
    } else {
        match sys::users::get_user_home_dir(login_name) {
            Some(home) => home,
            None => return expression.to_owned(),
        }
    };

    let mut result = home.to_string_lossy().to_string();
    result.push_str(path);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_tilde_resolves_to_home() {
        let Ok(home) = std::env::var("HOME") else {
            return;
        };

        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/docs"), format!("{home}/docs"));
    }

    #[test]
    fn test_unknown_user_is_left_unchanged() {
        assert_eq!(
            expand_tilde("~no_such_user_here/x"),
            "~no_such_user_here/x"
        );
    }

    #[test]
    fn test_non_tilde_text_is_left_unchanged() {
        assert_eq!(expand_tilde("plain"), "plain");
    }
}
