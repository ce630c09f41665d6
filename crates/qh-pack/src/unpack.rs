//! Content-driven dispatch over nested compression and archive layers.

use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use flate2::read::MultiGzDecoder;
use qh_utils::{
    error::FileSystemError,
    fs::{ensure_dir_exists, set_mode},
};
use tracing::{debug, trace};

use crate::{
    error::{ErrorContext, PackError, PackResult},
    extract::{extract_tar, ExtractReport},
    media::{InferSniffer, MediaKind, MediaType, Sniffer},
    stream::SniffReader,
};

/// Knobs for a single unpack run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpackOptions {
    /// Maximum number of decompression layers before giving up.
    pub max_depth: usize,
    /// Collapse single-directory wrappers after tar extraction.
    pub flatten: bool,
    /// Apply permission bits recorded in tar entries.
    pub preserve_permissions: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            max_depth: 8,
            flatten: true,
            preserve_permissions: true,
        }
    }
}

/// What ended up at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// A tar archive was extracted into the destination directory.
    Extracted(ExtractReport),
    /// A decompressed payload that is not an archive was written to the destination path.
    BareFile { path: PathBuf, executable: bool },
}

/// Unpacks streams by content, never by file name.
#[derive(Debug, Clone, Default)]
pub struct Unpacker<S = InferSniffer> {
    sniffer: S,
    options: UnpackOptions,
}

impl Unpacker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Sniffer> Unpacker<S> {
    pub fn with_sniffer(sniffer: S) -> Self {
        Self {
            sniffer,
            options: UnpackOptions::default(),
        }
    }

    pub fn options(mut self, options: UnpackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn unpack_options(&self) -> &UnpackOptions {
        &self.options
    }

    /// Unpacks an arbitrary byte stream into `dest`.
    pub fn unpack<R: Read>(&self, dest: &Path, reader: R) -> PackResult<UnpackOutcome> {
        let mut stream = SniffReader::new(reader);
        let media = self.classify_stream(&mut stream, "reading input")?;
        self.dispatch(dest, &mut stream, media, 0, "input stream")
    }

    /// Unpacks the file at `archive` into `dest`.
    ///
    /// The file is classified from its first bytes and then reopened from the start, so no
    /// replay buffer is needed at the top level.
    pub fn unpack_file(&self, archive: &Path, dest: &Path) -> PackResult<UnpackOutcome> {
        let media = self
            .sniffer
            .classify_file(archive)
            .with_context(|| format!("reading {}", archive.display()))?;

        let mut file = File::open(archive).map_err(|err| {
            FileSystemError::File {
                path: archive.to_path_buf(),
                action: "open",
                source: err,
            }
        })?;

        self.dispatch(
            dest,
            &mut file,
            media,
            0,
            &archive.display().to_string(),
        )
    }

    fn classify_stream<R: Read>(
        &self,
        stream: &mut SniffReader<R>,
        action: &str,
    ) -> PackResult<Option<MediaType>> {
        let prefix = stream
            .sniff(self.sniffer.sniff_len())
            .with_context(|| action.to_string())?;
        let media = self.sniffer.classify(prefix);
        stream.replay();

        trace!(
            "Classified {} sniffed bytes as {}",
            stream.recorded().len(),
            media.as_ref().map_or("unknown", MediaType::mime)
        );

        Ok(media)
    }

    fn dispatch(
        &self,
        dest: &Path,
        reader: &mut dyn Read,
        media: Option<MediaType>,
        depth: usize,
        origin: &str,
    ) -> PackResult<UnpackOutcome> {
        if depth > self.options.max_depth {
            return Err(PackError::NestingTooDeep {
                max_depth: self.options.max_depth,
            });
        }

        match media.as_ref().map(MediaType::kind) {
            Some(MediaKind::Gzip) => {
                debug!("Decompressing gzip layer {} of {}", depth + 1, origin);
                let mut inner = SniffReader::new(MultiGzDecoder::new(reader));
                let media = self.classify_stream(&mut inner, "decompressing gzip stream")?;
                self.dispatch(dest, &mut inner, media, depth + 1, origin)
            }
            Some(MediaKind::Tar) => {
                debug!("Extracting tar archive from {} into {}", origin, dest.display());
                extract_tar(dest, reader, &self.options).map(UnpackOutcome::Extracted)
            }
            _ if depth > 0 => write_bare_file(dest, reader, media.as_ref()),
            Some(MediaKind::Other) => {
                Err(PackError::UnsupportedFormat {
                    mime: media.map(|m| m.mime().to_string()).unwrap_or_default(),
                })
            }
            None => {
                Err(PackError::UnknownFormat {
                    origin: origin.to_string(),
                })
            }
        }
    }
}

fn write_bare_file(
    dest: &Path,
    reader: &mut dyn Read,
    media: Option<&MediaType>,
) -> PackResult<UnpackOutcome> {
    if let Some(parent) = dest.parent() {
        ensure_dir_exists(parent)?;
    }

    let mut file = File::create(dest).map_err(|err| {
        FileSystemError::File {
            path: dest.to_path_buf(),
            action: "create",
            source: err,
        }
    })?;
    io::copy(reader, &mut file).with_context(|| format!("writing {}", dest.display()))?;
    drop(file);

    let executable = media.is_some_and(MediaType::is_executable);
    if executable {
        set_mode(dest, 0o755)?;
    }

    debug!("Wrote decompressed payload to {}", dest.display());

    Ok(UnpackOutcome::BareFile {
        path: dest.to_path_buf(),
        executable,
    })
}
