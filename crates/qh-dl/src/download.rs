use std::{
    fs::File,
    io::{Read, Write as _},
    path::PathBuf,
};

use qh_utils::fs::ensure_dir_exists;
use tempfile::NamedTempFile;
use tracing::debug;
use ureq::http::header::CONTENT_LENGTH;
use url::Url;

use crate::{error::DownloadError, http::Http, types::Progress, utils::extension_from_url};

const TEMP_PREFIX: &str = "download-";

pub struct Download {
    pub url: String,
    pub work_dir: Option<PathBuf>,
    pub on_progress: Option<Box<dyn Fn(Progress) + Send + Sync>>,
}

impl Download {
    /// Creates a new `Download` for the given URL.
    ///
    /// Downloads land in the system temporary directory unless [`Download::work_dir`] is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use qh_dl::download::Download;
    ///
    /// let dl = Download::new("https://example.com/archive.tar.gz").work_dir("/tmp");
    /// // `dl` is ready to call `execute()`
    /// ```
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            work_dir: None,
            on_progress: None,
        }
    }

    /// Sets the directory the temporary download file is created in.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Registers a progress callback invoked with `Progress` events during the download.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use qh_dl::download::Download;
    /// use qh_dl::types::Progress;
    ///
    /// let _dl = Download::new("https://example.com/file")
    ///     .progress(|event: Progress| match event {
    ///         Progress::Starting { total } => eprintln!("starting, total={}", total),
    ///         Progress::Chunk { current, .. } => eprintln!("downloaded {}", current),
    ///         Progress::Complete { total } => eprintln!("complete, total={}", total),
    ///     });
    /// ```
    pub fn progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Downloads the resource into a uniquely named temporary file.
    ///
    /// `http://` and `https://` URLs are fetched with the shared agent; `file://` URLs are read
    /// from the local filesystem. The returned [`NamedTempFile`] deletes the file when dropped,
    /// so the download never outlives its owner, whichever way the owner returns.
    ///
    /// # Errors
    ///
    /// Fails with [`DownloadError`] when the URL is invalid or uses an unsupported scheme, the
    /// server answers with a non-success status, the transfer breaks off, or the temporary
    /// file cannot be written. No partial file is left behind in any of these cases.
    pub fn execute(self) -> Result<NamedTempFile, DownloadError> {
        let url = Url::parse(&self.url).map_err(|source| {
            DownloadError::InvalidUrl {
                url: self.url.clone(),
                source,
            }
        })?;

        let (mut reader, total) = self.open(&url)?;

        let work_dir = self.work_dir.clone().unwrap_or_else(std::env::temp_dir);
        ensure_dir_exists(&work_dir)?;

        let suffix = extension_from_url(&self.url).unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&work_dir)
            .map_err(|source| {
                DownloadError::TempFile {
                    dir: work_dir.clone(),
                    source,
                }
            })?;

        debug!(
            "downloading {} to {} ({} bytes expected)",
            self.url,
            file.path().display(),
            total
        );

        self.emit(Progress::Starting {
            total,
        });

        let mut buffer = [0u8; 8192];
        let mut downloaded = 0u64;

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }

            file.write_all(&buffer[..n])?;
            downloaded += n as u64;

            self.emit(Progress::Chunk {
                current: downloaded,
                total,
            });
        }

        file.flush()?;

        self.emit(Progress::Complete {
            total: downloaded,
        });

        Ok(file)
    }

    fn open(&self, url: &Url) -> Result<(Box<dyn Read>, u64), DownloadError> {
        match url.scheme() {
            "http" | "https" => {
                let resp = Http::fetch(url.as_str())?;
                let total = resp
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|len| len.parse::<u64>().ok())
                    .unwrap_or(0);

                Ok((Box::new(resp.into_body().into_reader()), total))
            }
            "file" => {
                let path = url.to_file_path().map_err(|_| {
                    DownloadError::InvalidFileUrl {
                        url: self.url.clone(),
                    }
                })?;
                let file = File::open(&path)?;
                let total = file.metadata().map(|m| m.len()).unwrap_or(0);

                Ok((Box::new(file), total))
            }
            scheme => {
                Err(DownloadError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    url: self.url.clone(),
                })
            }
        }
    }

    fn emit(&self, event: Progress) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }
}
