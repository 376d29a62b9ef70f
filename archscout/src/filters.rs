//! Entry filtering and archive discovery.
//!
//! Two filters live here:
//!
//! - [`FileTypeFilter`] decides which archive *entries* are worth opening,
//!   by extension. It is applied to entry names before any entry I/O.
//! - [`discover_archives`] decides which files on disk are archives, by the
//!   container extension, optionally dropping paths that match ignore globs.
//!
//! Extension comparison ignores case and a leading dot, so `".DB"`, `"db"`
//! and `".db"` all select `Manifest.db`.
use glob::Pattern;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::archive::is_supported_archive;
use crate::errors::{ScanError, ScanResult};

/// Set of entry extensions to scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypeFilter {
    extensions: BTreeSet<String>,
}

impl FileTypeFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Builds a filter, or `None` when no extensions were given
    pub fn from_extensions<I, S>(extensions: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filter = Self::new(extensions);
        (!filter.is_empty()).then_some(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// True when the entry name's extension is in the set
    pub fn allows(&self, entry_name: &str) -> bool {
        Path::new(entry_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Checks an entry against an optional filter; no filter admits everything
pub fn should_scan_entry(entry_name: &str, filter: Option<&FileTypeFilter>) -> bool {
    filter.map_or(true, |filter| filter.allows(entry_name))
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Checks if a path should be skipped based on ignore globs
pub fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
    let normalized_path = path.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|pattern| match Pattern::new(pattern) {
        Ok(p) => p.matches(&normalized_path),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "invalid ignore pattern");
            false
        }
    })
}

/// Resolves the archives to scan from a file or directory path.
///
/// A file is returned as given, whatever its extension; the scanner reports
/// unsupported formats itself. A directory is walked recursively, including
/// hidden and git-ignored files, and every file with a supported container
/// extension is collected in sorted order.
pub fn discover_archives(root: &Path, ignore_patterns: &[String]) -> ScanResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(ScanError::file_not_found(root));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut archives: Vec<PathBuf> = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable path during discovery");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_supported_archive(path) && !should_ignore(path, ignore_patterns))
        .collect();
    archives.sort();

    debug!(root = %root.display(), count = archives.len(), "discovered archives");
    Ok(archives)
}
