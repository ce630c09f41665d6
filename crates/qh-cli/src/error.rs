use miette::Diagnostic;
use qh_config::error::ConfigError;
use qh_pack::InstallError;
use qh_utils::error::{FileSystemError, PathError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error("Invalid proxy `{proxy}`")]
    #[diagnostic(
        code(qh::proxy),
        help("Use a proxy URL such as http://host:port or socks5://host:port")
    )]
    Proxy {
        proxy: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Invalid header `{0}`")]
    #[diagnostic(code(qh::header), help("Headers are given as `Name: value`"))]
    Header(String),

    #[error("Error while {action}")]
    #[diagnostic(code(qh::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(qh::logging))]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            CliError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
