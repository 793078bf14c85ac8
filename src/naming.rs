//! Title sanitization, the format/extension table, and path helpers.
//!
//! Naming must stay stable across versions: the skip-if-exists check in the
//! CLI only works if a title always maps to the same filename.

use std::path::{Path, PathBuf};

/// Closed lookup table mapping vendor format names to file extensions.
/// Kept as data — the vendor's "code" bundles are zip archives.
const FORMAT_EXTENSIONS: &[(&str, &str)] = &[
    ("pdf", "pdf"),
    ("mobi", "mobi"),
    ("epub", "epub"),
    ("code", "zip"),
];

/// File extension for a vendor format name, or `None` for unknown formats.
#[must_use]
pub fn extension_for(format: &str) -> Option<&'static str> {
    FORMAT_EXTENSIONS
        .iter()
        .find(|(name, _)| *name == format)
        .map(|(_, ext)| *ext)
}

/// All format names the tool accepts, for CLI validation messages.
#[must_use]
pub fn known_formats() -> Vec<&'static str> {
    FORMAT_EXTENSIONS.iter().map(|(name, _)| *name).collect()
}

/// Maps a catalog title to a filesystem-safe stem.
///
/// Spaces, dots and colons become underscores (matching the naming scheme
/// existing libraries were downloaded with, so re-runs still skip them);
/// path separators are replaced too so a hostile title cannot escape the
/// target directory.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            ' ' | '.' | ':' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

/// Target path for one (item, format) pair inside `dir`.
#[must_use]
pub fn target_path(dir: &Path, title_stem: &str, extension: &str) -> PathBuf {
    dir.join(format!("{title_stem}.{extension}"))
}

/// Availability marker path for a target: the sentinel recording "this
/// format was confirmed unavailable", checked before any network traffic.
#[must_use]
pub fn marker_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".unavailable");
    target.with_file_name(name)
}
