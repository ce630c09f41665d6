use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use qh_dl::{download::Download, types::Progress};
use tracing::{debug, info};

use crate::{
    error::InstallError,
    media::{InferSniffer, Sniffer},
    unpack::{UnpackOutcome, Unpacker},
};

type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Downloads packages and unpacks them into place.
pub struct Installer<S = InferSniffer> {
    work_dir: Option<PathBuf>,
    unpacker: Unpacker<S>,
    on_progress: Option<ProgressCallback>,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new()
    }
}

impl Installer {
    pub fn new() -> Self {
        Self::with_unpacker(Unpacker::new())
    }
}

impl<S: Sniffer> Installer<S> {
    pub fn with_unpacker(unpacker: Unpacker<S>) -> Self {
        Self {
            work_dir: None,
            unpacker,
            on_progress: None,
        }
    }

    /// Directory for temporary downloads. Defaults to the system temporary directory.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    /// Downloads `url` and unpacks it into `dest`.
    ///
    /// The download goes to a temporary file that is removed before this returns, whether
    /// the install succeeded or not. A failed download leaves `dest` untouched; a failed
    /// unpack may leave it partially populated.
    pub fn install(&self, url: &str, dest: &Path) -> Result<UnpackOutcome, InstallError> {
        let mut download = Download::new(url);
        if let Some(dir) = &self.work_dir {
            download = download.work_dir(dir);
        }
        if let Some(cb) = &self.on_progress {
            let cb = Arc::clone(cb);
            download = download.progress(move |event| cb(event));
        }

        let archive = download.execute().map_err(|source| {
            InstallError::Download {
                url: url.to_string(),
                source,
            }
        })?;
        debug!("Downloaded {} to {}", url, archive.path().display());

        let outcome = self
            .unpacker
            .unpack_file(archive.path(), dest)
            .map_err(|source| {
                InstallError::Unpack {
                    url: url.to_string(),
                    dest: dest.to_path_buf(),
                    source,
                }
            })?;

        info!("Installed {} into {}", url, dest.display());
        Ok(outcome)
    }
}
