//! Error types for archive scanning.
//!
//! Scan-time failures are split by the scope they abort:
//!
//! | Variant             | Aborts            | Run continues |
//! |---------------------|-------------------|---------------|
//! | `UnsupportedFormat` | one archive       | yes           |
//! | `ArchiveOpen`       | one archive       | yes           |
//! | `EntryOpen`         | one entry         | yes           |
//! | `ReadOrDecode`      | one entry         | yes           |
//!
//! The scanner catches each of these at the narrowest scope and turns it into
//! a log line. The remaining variants describe configuration problems that are
//! reported before any scanning starts.
//!
//! ```rust,ignore
//! match ArchiveAdapter::open(path) {
//!     Ok(adapter) => // list and scan entries,
//!     Err(ScanError::UnsupportedFormat(path)) => // skip, warn,
//!     Err(e) => // skip, log error,
//! }
//! ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while scanning archives
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Failed to open archive {path}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },
    #[error("Failed to open entry {entry} in archive {archive}: {reason}")]
    EntryOpen {
        archive: PathBuf,
        entry: String,
        reason: String,
    },
    #[error("Error reading entry {entry} in archive {archive}: {reason}")]
    ReadOrDecode {
        archive: PathBuf,
        entry: String,
        reason: String,
    },
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("No valid archives found under {0}")]
    NoArchives(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    pub fn unsupported_format(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat(path.into())
    }

    pub fn archive_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArchiveOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn entry_open(
        archive: impl Into<PathBuf>,
        entry: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::EntryOpen {
            archive: archive.into(),
            entry: entry.into(),
            reason: reason.to_string(),
        }
    }

    pub fn read_or_decode(
        archive: impl Into<PathBuf>,
        entry: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::ReadOrDecode {
            archive: archive.into(),
            entry: entry.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn no_archives(path: &Path) -> Self {
        Self::NoArchives(path.to_path_buf())
    }

    /// True for the failures a scan logs and steps over instead of stopping.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::ArchiveOpen { .. }
                | Self::EntryOpen { .. }
                | Self::ReadOrDecode { .. }
        )
    }
}
