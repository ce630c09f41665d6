use std::path::PathBuf;

use miette::Diagnostic;
use qh_utils::error::{FileSystemError, PathError, UtilsError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("JSON deserialization error: {0}")]
    #[diagnostic(
        code(qh_config::json),
        help("Check your config.json syntax and structure")
    )]
    Json(#[from] serde_json::Error),

    #[error("Failed to read config file `{}`", path.display())]
    #[diagnostic(
        code(qh_config::read),
        help("Create the file or point QH_CONFIG / --config at an existing one")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown app `{name}`{}", required_by(chain))]
    #[diagnostic(
        code(qh_config::unknown_app),
        help("Add the app to `apps` in your config file or fix the name")
    )]
    UnknownApp { name: String, chain: Vec<String> },

    #[error("Path to app `{app}` does not exist ({})", path.display())]
    #[diagnostic(code(qh_config::missing_app_path))]
    MissingAppPath { app: String, path: PathBuf },

    #[error("Path to app `{app}` must point to a directory ({})", path.display())]
    #[diagnostic(code(qh_config::app_path_not_dir))]
    AppPathNotDirectory { app: String, path: PathBuf },

    #[error("Cannot access path to app `{app}` ({})", path.display())]
    #[diagnostic(code(qh_config::app_path))]
    AppPathInaccessible {
        app: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(qh_config::utils))]
    Utils(#[from] UtilsError),
}

fn required_by(chain: &[String]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (required by {})", chain.join(" -> "))
    }
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_app_message() {
        let top = ConfigError::UnknownApp {
            name: "java".into(),
            chain: vec![],
        };
        assert_eq!(top.to_string(), "Unknown app `java`");

        let nested = ConfigError::UnknownApp {
            name: "zlib".into(),
            chain: vec!["python".into(), "openssl".into()],
        };
        assert_eq!(
            nested.to_string(),
            "Unknown app `zlib` (required by python -> openssl)"
        );
    }

    #[test]
    fn test_from_path_error() {
        let err: ConfigError = PathError::Empty.into();
        assert!(matches!(err, ConfigError::Utils(UtilsError::Path(PathError::Empty))));
    }
}
