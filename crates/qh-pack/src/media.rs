use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
};

pub const GZIP: &str = "application/gzip";
pub const TAR: &str = "application/x-tar";

const GZIP_ALIASES: [&str; 2] = ["application/x-gzip", "application/gzip-compressed"];
const EXECUTABLES: [&str; 3] = [
    "application/x-executable",
    "application/x-mach-binary",
    "application/vnd.microsoft.portable-executable",
];

/// Number of leading bytes handed to the sniffer.
pub const SNIFF_LEN: usize = 8192;

const TAR_BLOCK_LEN: usize = 512;

/// The handlers the unpacker knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Gzip,
    Tar,
    Other,
}

/// A content-derived media type such as `application/gzip`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaType {
    mime: Cow<'static, str>,
}

impl MediaType {
    pub fn new(mime: impl Into<Cow<'static, str>>) -> Self {
        Self {
            mime: mime.into(),
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Whether this type is `mime` or one of its known aliases.
    pub fn is(&self, mime: &str) -> bool {
        let canonical = |m: &str| -> String {
            let m = m.trim().to_ascii_lowercase();
            if GZIP_ALIASES.contains(&m.as_str()) {
                GZIP.to_string()
            } else {
                m
            }
        };

        canonical(&self.mime) == canonical(mime)
    }

    pub fn kind(&self) -> MediaKind {
        if self.is(GZIP) {
            MediaKind::Gzip
        } else if self.is(TAR) {
            MediaKind::Tar
        } else {
            MediaKind::Other
        }
    }

    pub fn is_executable(&self) -> bool {
        EXECUTABLES.iter().any(|mime| self.is(mime))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime)
    }
}

/// Content-based format detection.
///
/// Implementations are authoritative: the unpacker never second-guesses a classification by
/// looking at file names or transport headers.
pub trait Sniffer {
    /// Classifies a content prefix. `None` means the content is not recognised.
    fn classify(&self, bytes: &[u8]) -> Option<MediaType>;

    /// How many leading bytes [`Sniffer::classify`] wants to see.
    fn sniff_len(&self) -> usize {
        SNIFF_LEN
    }

    /// Classifies a file by reading its first [`Sniffer::sniff_len`] bytes.
    fn classify_file(&self, path: &Path) -> io::Result<Option<MediaType>> {
        let mut prefix = Vec::with_capacity(self.sniff_len());
        File::open(path)?
            .take(self.sniff_len() as u64)
            .read_to_end(&mut prefix)?;

        Ok(self.classify(&prefix))
    }
}

/// Whether `bytes` starts with a tar header whose checksum is valid.
///
/// Covers old-style headers without the `ustar` magic. A header's first field is the entry
/// name, so short magic numbers of other formats can appear there; the checksum cannot.
pub fn is_tar_header(bytes: &[u8]) -> bool {
    let Some(block) = bytes.get(..TAR_BLOCK_LEN) else {
        return false;
    };

    let header = tar::Header::from_byte_slice(block);
    let Ok(recorded) = header.cksum() else {
        return false;
    };

    let mut computed = header.clone();
    computed.set_cksum();
    computed.cksum().is_ok_and(|sum| sum == recorded)
}

/// [`Sniffer`] backed by the magic-number tables of the `infer` crate.
///
/// Tar headers are checked first: `infer` would match a 2 byte signature such as `BM` or
/// `MZ` at the start of an entry name before it gets to its tar matcher.
#[derive(Clone, Copy, Debug, Default)]
pub struct InferSniffer;

impl Sniffer for InferSniffer {
    fn classify(&self, bytes: &[u8]) -> Option<MediaType> {
        if is_tar_header(bytes) {
            return Some(MediaType::new(TAR));
        }

        infer::get(bytes).map(|kind| MediaType::new(kind.mime_type()))
    }
}

impl<S: Sniffer + ?Sized> Sniffer for &S {
    fn classify(&self, bytes: &[u8]) -> Option<MediaType> {
        (**self).classify(bytes)
    }

    fn sniff_len(&self) -> usize {
        (**self).sniff_len()
    }

    fn classify_file(&self, path: &Path) -> io::Result<Option<MediaType>> {
        (**self).classify_file(path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use flate2::{write::GzEncoder, Compression};
    use tempfile::NamedTempFile;

    use super::*;

    fn tar_with(mut header: tar::Header, path: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        header.set_size(2);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, &b"hi"[..]).unwrap();
        builder.into_inner().unwrap()
    }

    fn tar_bytes() -> Vec<u8> {
        tar_with(tar::Header::new_ustar(), "hello.txt")
    }

    #[test]
    fn test_media_type_aliases() {
        let gzip = MediaType::new("application/x-gzip");
        assert!(gzip.is(GZIP));
        assert_eq!(gzip.kind(), MediaKind::Gzip);
        assert_eq!(MediaType::new("Application/X-Tar").kind(), MediaKind::Tar);
        assert_eq!(MediaType::new("application/zip").kind(), MediaKind::Other);
    }

    #[test]
    fn test_infer_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"anything").unwrap();
        let gz = encoder.finish().unwrap();

        let media = InferSniffer.classify(&gz).unwrap();
        assert_eq!(media.kind(), MediaKind::Gzip);
    }

    #[test]
    fn test_infer_tar() {
        let media = InferSniffer.classify(&tar_bytes()).unwrap();
        assert_eq!(media.kind(), MediaKind::Tar);
    }

    #[test]
    fn test_tar_names_that_look_like_other_magic() {
        for name in ["BMtool-1.0/readme", "MZ-utils/readme", "ID3tag/readme"] {
            for header in [tar::Header::new_gnu(), tar::Header::new_ustar()] {
                let media = InferSniffer.classify(&tar_with(header, name));
                assert_eq!(media.map(|m| m.kind()), Some(MediaKind::Tar), "{name}");
            }
        }
    }

    #[test]
    fn test_old_style_tar() {
        let tar = tar_with(tar::Header::new_old(), "hello.txt");
        assert_eq!(&tar[257..262], &[0u8; 5]);

        let media = InferSniffer.classify(&tar).unwrap();
        assert!(media.is(TAR));
    }

    #[test]
    fn test_tar_header_checksum_required() {
        let mut tar = tar_bytes();
        assert!(is_tar_header(&tar));
        assert!(!is_tar_header(&tar[..511]));

        tar[0] ^= 0x20;
        assert!(!is_tar_header(&tar));
        assert!(!is_tar_header(&[0u8; 1024]));
    }

    #[test]
    fn test_infer_unknown() {
        assert_eq!(InferSniffer.classify(b"hi"), None);
        assert_eq!(InferSniffer.classify(b""), None);
    }

    #[test]
    fn test_infer_elf_is_executable() {
        let mut elf = vec![0x7F, b'E', b'L', b'F', 2, 1, 1, 0];
        elf.resize(64, 0);
        elf[16] = 2;

        let media = InferSniffer.classify(&elf).unwrap();
        assert!(media.is_executable());
        assert_eq!(media.kind(), MediaKind::Other);
    }

    #[test]
    fn test_classify_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&tar_bytes()).unwrap();

        let media = InferSniffer.classify_file(file.path()).unwrap().unwrap();
        assert!(media.is(TAR));
    }
}
