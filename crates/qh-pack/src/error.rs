//! Error types for qh-pack.

use std::path::PathBuf;

use miette::Diagnostic;
use qh_dl::error::DownloadError;
use qh_utils::error::FileSystemError;
use thiserror::Error;

/// Failure while classifying, decompressing or extracting a package.
#[derive(Error, Diagnostic, Debug)]
pub enum PackError {
    #[error("Could not determine the format of {origin}")]
    #[diagnostic(
        code(qh_pack::unknown_format),
        help("The content does not start with a recognised gzip or tar signature")
    )]
    UnknownFormat { origin: String },

    #[error("Unsupported archive type `{mime}`")]
    #[diagnostic(
        code(qh_pack::unsupported_format),
        help("Only gzip-compressed and plain tar archives can be installed")
    )]
    UnsupportedFormat { mime: String },

    #[error("Archive nesting exceeds {max_depth} layers")]
    #[diagnostic(
        code(qh_pack::nesting_too_deep),
        help("The payload keeps decompressing into another compressed stream")
    )]
    NestingTooDeep { max_depth: usize },

    #[error("Archive entry `{}` escapes the destination directory", entry.display())]
    #[diagnostic(
        code(qh_pack::path_traversal),
        help("The archive is malformed or malicious; nothing outside the destination was written")
    )]
    PathTraversal { entry: PathBuf },

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(qh_pack::io), help("The archive may be truncated or corrupted"))]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PackResult<T> = std::result::Result<T, PackError>;

/// Failure of a complete download-and-unpack installation.
#[derive(Error, Diagnostic, Debug)]
pub enum InstallError {
    #[error("Failed downloading {url}")]
    #[diagnostic(code(qh_pack::download))]
    Download {
        url: String,
        #[source]
        #[diagnostic_source]
        source: DownloadError,
    },

    #[error("Failed unpacking {url} into `{}`", dest.display())]
    #[diagnostic(
        code(qh_pack::unpack),
        help("The destination may be partially populated; remove it before retrying")
    )]
    Unpack {
        url: String,
        dest: PathBuf,
        #[source]
        #[diagnostic_source]
        source: PackError,
    },
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> PackResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> PackResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackError::Io {
                action: context(),
                source: err,
            }
        })
    }
}
