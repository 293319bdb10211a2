//! File-extension to content-type lookup.

use std::collections::HashMap;
use std::path::Path;

/// Content type for files whose extension is unknown or missing.
pub const DEFAULT_MIME: &str = "application/octet-stream";

const BUILTIN: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("wasm", "application/wasm"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
];

/// An immutable extension → content-type table.
///
/// Built once at startup and shared read-only by every session.
///
/// # Examples
///
/// ```
/// use halo::mime::MimeTable;
///
/// let table = MimeTable::new();
/// assert_eq!(table.for_name("logo.PNG"), "image/png");
/// assert_eq!(table.for_name("archive.unknown"), "application/octet-stream");
/// ```
#[derive(Debug, Clone)]
pub struct MimeTable {
    by_extension: HashMap<&'static str, &'static str>,
}

impl MimeTable {
    /// Builds the table from the built-in extension list.
    pub fn new() -> Self {
        Self {
            by_extension: BUILTIN.iter().copied().collect(),
        }
    }

    /// Returns the content type for a resource name, judged by its extension.
    ///
    /// Extensions compare case-insensitively; names without a known
    /// extension get [`DEFAULT_MIME`].
    pub fn for_name(&self, name: &str) -> &'static str {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension.get(ext.to_ascii_lowercase().as_str()))
            .copied()
            .unwrap_or(DEFAULT_MIME)
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        let table = MimeTable::new();
        assert_eq!(table.for_name("index.html"), "text/html");
        assert_eq!(table.for_name("notes.txt"), "text/plain");
        assert_eq!(table.for_name("photo.jpeg"), "image/jpeg");
    }

    #[test]
    fn only_last_extension_counts() {
        let table = MimeTable::new();
        assert_eq!(table.for_name("bundle.tar.gz"), "application/gzip");
        assert_eq!(table.for_name("data.json.bak"), DEFAULT_MIME);
    }

    #[test]
    fn missing_extension_defaults() {
        let table = MimeTable::new();
        assert_eq!(table.for_name("README"), DEFAULT_MIME);
        assert_eq!(table.for_name(".bashrc"), DEFAULT_MIME);
        assert_eq!(table.for_name(""), DEFAULT_MIME);
    }
}
