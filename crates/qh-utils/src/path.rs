use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use crate::error::{PathError, PathResult};

/// Expands `$VAR` and `${VAR}` references in `input` using `lookup`.
///
/// A `$` that is not followed by a variable name is kept literally. When `lookup` returns
/// `None` the expansion fails with [`PathError::MissingVar`]; callers that want unknown
/// variables to expand to nothing should return `Some(String::new())` instead.
///
/// # Example
///
/// ```
/// use qh_utils::path::expand_with;
///
/// let expanded = expand_with("${NAME}/bin:$$", |var| (var == "NAME").then(|| "jdk".into()));
/// assert_eq!(expanded.unwrap(), "jdk/bin:$$");
/// ```
pub fn expand_with<F>(input: &str, mut lookup: F) -> PathResult<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.peek() == Some(&'{') {
            chars.next();
            consume_until(&mut chars, '}')?
        } else {
            consume_var_name(&mut chars)
        };

        if var_name.is_empty() {
            result.push('$');
            continue;
        }

        let value = lookup(&var_name).ok_or_else(|| PathError::MissingVar {
            var: var_name.clone(),
            input: input.into(),
        })?;
        result.push_str(&value);
    }

    Ok(result)
}

fn consume_until(chars: &mut Peekable<Chars>, delimiter: char) -> PathResult<String> {
    let mut var_name = String::new();

    for c in chars.by_ref() {
        if c == delimiter {
            return Ok(var_name);
        }
        var_name.push(c);
    }

    Err(PathError::UnclosedVariable {
        input: format!("${{{var_name}"),
    })
}

fn consume_var_name(chars: &mut Peekable<Chars>) -> String {
    let mut var_name = String::new();

    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            var_name.push(c);
            chars.next();
        } else {
            break;
        }
    }

    var_name
}

/// Resolves a path string that may contain environment variables.
///
/// Expands `$VAR`/`${VAR}` from the process environment, resolves a leading `~` to the home
/// directory, and makes relative paths absolute against the current working directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is empty
/// * [`PathError::CurrentDir`] if the current directory cannot be determined
/// * [`PathError::MissingVar`] if a referenced environment variable is undefined
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();

    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let path = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{rest}", home_dir().display())
        }
        _ => path.to_string(),
    };

    let expanded = expand_with(&path, |var| match var {
        "HOME" => Some(home_dir().to_string_lossy().into_owned()),
        "XDG_CONFIG_HOME" => Some(xdg_config_home().to_string_lossy().into_owned()),
        _ => env::var(var).ok(),
    })?;
    let path_buf = PathBuf::from(expanded);

    if path_buf.is_absolute() {
        Ok(path_buf)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path_buf))
            .map_err(|err| PathError::CurrentDir { source: err })
    }
}

/// Returns the user's home directory.
///
/// Checks `HOME` first and falls back to the passwd entry of the current user.
pub fn home_dir() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| {
        nix::unistd::User::from_uid(nix::unistd::getuid())
            .ok()
            .flatten()
            .map(|user| user.dir)
            .unwrap_or_else(|| PathBuf::from("/"))
    })
}

/// Returns the user's config directory (`$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`).
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Mutex};

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_with_simple_and_braced() {
        let vars = vars(&[("ROOT", "/opt"), ("NAME", "jdk")]);
        let result = expand_with("$ROOT/${NAME}-21/bin", |v| vars.get(v).cloned()).unwrap();
        assert_eq!(result, "/opt/jdk-21/bin");
    }

    #[test]
    fn test_expand_with_literal_dollar() {
        let result = expand_with("cost: $ 5 $", |_| None).unwrap();
        assert_eq!(result, "cost: $ 5 $");
    }

    #[test]
    fn test_expand_with_missing() {
        let err = expand_with("$NOPE/x", |_| None).unwrap_err();
        assert!(matches!(err, PathError::MissingVar { ref var, .. } if var == "NOPE"));
    }

    #[test]
    fn test_expand_with_unknown_as_empty() {
        let result = expand_with("a${NOPE}b", |_| Some(String::new())).unwrap();
        assert_eq!(result, "ab");
    }

    #[test]
    fn test_expand_with_unclosed() {
        let err = expand_with("${ROOT", |_| Some(String::new())).unwrap_err();
        assert!(matches!(err, PathError::UnclosedVariable { .. }));
    }

    #[test]
    fn test_resolve_path_empty() {
        assert!(matches!(resolve_path("  "), Err(PathError::Empty)));
    }

    #[test]
    fn test_resolve_path_env_and_tilde() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("QH_TEST_DIR", "/srv/qh");
        env::set_var("HOME", "/home/qh");

        assert_eq!(
            resolve_path("$QH_TEST_DIR/apps").unwrap(),
            PathBuf::from("/srv/qh/apps")
        );
        assert_eq!(
            resolve_path("~/tools").unwrap(),
            PathBuf::from("/home/qh/tools")
        );

        env::remove_var("QH_TEST_DIR");
    }

    #[test]
    fn test_resolve_path_relative() {
        let cwd = env::current_dir().unwrap();
        assert_eq!(resolve_path("some/dir").unwrap(), cwd.join("some/dir"));
    }
}
