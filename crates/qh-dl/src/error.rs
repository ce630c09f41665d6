use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(qh_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL does not name a local file: {url}")]
    #[diagnostic(
        code(qh_dl::invalid_file_url),
        help("Use an absolute path without a host, e.g. file:///srv/pkg.tar.gz")
    )]
    InvalidFileUrl { url: String },

    #[error("Unsupported URL scheme `{scheme}`: {url}")]
    #[diagnostic(
        code(qh_dl::unsupported_scheme),
        help("Use an http://, https:// or file:// URL")
    )]
    UnsupportedScheme { scheme: String, url: String },

    #[error(transparent)]
    #[diagnostic(
        code(qh_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(qh_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("Failed to create temporary file in `{}`", dir.display())]
    #[diagnostic(
        code(qh_dl::temp_file),
        help("Make sure the working directory exists and is writable")
    )]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystem(#[from] qh_utils::error::FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(qh_dl::io))]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for DownloadError {
    /// Converts a `ureq::Error` into a `DownloadError::Network` variant.
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}
