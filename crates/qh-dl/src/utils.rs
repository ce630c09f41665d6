use std::path::Path;

use percent_encoding::percent_decode_str;
use url::Url;

const COMPOUND_EXTENSIONS: [&str; 5] = [".tar.gz", ".tar.xz", ".tar.bz2", ".tar.zst", ".tar.lz"];

/// Extract filename from URL path
pub fn filename_from_url(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .and_then(|s| {
                percent_decode_str(s)
                    .decode_utf8()
                    .ok()
                    .map(|cow| cow.into_owned())
            })
    })
}

/// File extension of the URL's last path segment, including the leading dot.
///
/// Only used to give temporary downloads a recognisable name; content is always classified
/// by inspection.
pub fn extension_from_url(url: &str) -> Option<String> {
    let filename = filename_from_url(url)?;
    let lower = filename.to_ascii_lowercase();

    if let Some(ext) = COMPOUND_EXTENSIONS.iter().find(|ext| lower.ends_with(**ext)) {
        return Some(ext.to_string());
    }

    Path::new(&filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
}
