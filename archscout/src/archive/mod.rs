//! Uniform access to the supported container formats.
//!
//! Every format is one variant of [`ArchiveAdapter`]. Callers only ever see
//! three operations:
//!
//! 1. [`ArchiveAdapter::open`] resolves the format from the file extension and
//!    parses whatever container header the format needs. Unknown extensions
//!    fail with [`ScanError::UnsupportedFormat`], unreadable containers with
//!    [`ScanError::ArchiveOpen`].
//! 2. [`ArchiveAdapter::list_entries`] returns the regular-file entries in the
//!    order the container stores them. Directory entries are never reported.
//! 3. [`ArchiveAdapter::read_entry`] opens one entry as a byte stream and
//!    reads up to `limit` bytes from it, or everything when `limit` is `None`.
//!    A failure to locate or open the entry is [`ScanError::EntryOpen`]; a
//!    failure while pulling bytes is [`ScanError::ReadOrDecode`].
//!
//! All three are blocking and are expected to run on a blocking worker pool.
//! Closing is handled by `Drop`: every handle an adapter holds is released
//! when the adapter goes out of scope, whichever way the scan exits.
//!
//! Adding a format means adding one variant and one submodule; nothing that
//! drives the adapter has to change.
mod rar;
mod sevenz;
mod tar;
mod zip;

pub use self::rar::RarAdapter;
pub use self::sevenz::SevenZipAdapter;
pub use self::tar::TarAdapter;
pub use self::zip::ZipAdapter;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::errors::{ScanError, ScanResult};

/// Container formats with an adapter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Zip,
    Tar,
    SevenZip,
    Rar,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 4] = [
        ArchiveFormat::Zip,
        ArchiveFormat::Rar,
        ArchiveFormat::Tar,
        ArchiveFormat::SevenZip,
    ];

    /// File extension (without the dot) that identifies this format
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Rar => "rar",
        }
    }

    /// Maps a path to its format by extension, ignoring case
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One regular file inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Archive-relative path as stored in the container
    pub name: String,
    /// Uncompressed size, when the container records it
    pub size: Option<u64>,
}

impl EntryInfo {
    pub fn new(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A format-specific archive reader behind one interface
#[derive(Debug)]
pub enum ArchiveAdapter {
    Zip(ZipAdapter),
    Tar(TarAdapter),
    SevenZip(SevenZipAdapter),
    Rar(RarAdapter),
}

impl ArchiveAdapter {
    /// Opens `path` with the adapter its extension selects
    pub fn open(path: &Path) -> ScanResult<Self> {
        let format =
            ArchiveFormat::from_path(path).ok_or_else(|| ScanError::unsupported_format(path))?;
        Self::open_as(path, format)
    }

    /// Opens `path` as `format`, regardless of its extension
    pub fn open_as(path: &Path, format: ArchiveFormat) -> ScanResult<Self> {
        Ok(match format {
            ArchiveFormat::Zip => ArchiveAdapter::Zip(ZipAdapter::open(path)?),
            ArchiveFormat::Tar => ArchiveAdapter::Tar(TarAdapter::open(path)?),
            ArchiveFormat::SevenZip => ArchiveAdapter::SevenZip(SevenZipAdapter::open(path)?),
            ArchiveFormat::Rar => ArchiveAdapter::Rar(RarAdapter::open(path)?),
        })
    }

    pub fn format(&self) -> ArchiveFormat {
        match self {
            ArchiveAdapter::Zip(_) => ArchiveFormat::Zip,
            ArchiveAdapter::Tar(_) => ArchiveFormat::Tar,
            ArchiveAdapter::SevenZip(_) => ArchiveFormat::SevenZip,
            ArchiveAdapter::Rar(_) => ArchiveFormat::Rar,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ArchiveAdapter::Zip(a) => a.path(),
            ArchiveAdapter::Tar(a) => a.path(),
            ArchiveAdapter::SevenZip(a) => a.path(),
            ArchiveAdapter::Rar(a) => a.path(),
        }
    }

    /// Lists the regular-file entries of the archive
    pub fn list_entries(&self) -> ScanResult<Vec<EntryInfo>> {
        match self {
            ArchiveAdapter::Zip(a) => a.list_entries(),
            ArchiveAdapter::Tar(a) => a.list_entries(),
            ArchiveAdapter::SevenZip(a) => a.list_entries(),
            ArchiveAdapter::Rar(a) => a.list_entries(),
        }
    }

    /// Reads at most `limit` leading bytes of the named entry
    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> ScanResult<Vec<u8>> {
        match self {
            ArchiveAdapter::Zip(a) => a.read_entry(name, limit),
            ArchiveAdapter::Tar(a) => a.read_entry(name, limit),
            ArchiveAdapter::SevenZip(a) => a.read_entry(name, limit),
            ArchiveAdapter::Rar(a) => a.read_entry(name, limit),
        }
    }
}

/// True when the extension maps to a supported container format
pub fn is_supported_archive(path: &Path) -> bool {
    ArchiveFormat::from_path(path).is_some()
}

/// Reads up to `limit` bytes from `reader`, or to end of stream when `None`.
///
/// Bytes past the limit are never pulled from the underlying stream.
pub(crate) fn read_bounded<R: Read>(
    mut reader: R,
    limit: Option<u64>,
    size_hint: Option<u64>,
) -> std::io::Result<Vec<u8>> {
    let capacity = match (limit, size_hint) {
        (Some(limit), Some(size)) => limit.min(size),
        (Some(bound), None) | (None, Some(bound)) => bound,
        (None, None) => 0,
    }
    .min(READ_CAPACITY_HINT);
    let mut buf = Vec::with_capacity(capacity as usize);
    match limit {
        Some(limit) => reader.take(limit).read_to_end(&mut buf)?,
        None => reader.read_to_end(&mut buf)?,
    };
    Ok(buf)
}

/// Truncates an already materialized entry body to `limit` bytes
pub(crate) fn truncate_to_limit(mut bytes: Vec<u8>, limit: Option<u64>) -> Vec<u8> {
    if let Some(limit) = limit {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        bytes.truncate(limit);
    }
    bytes
}

/// Normalizes a stored entry name to forward slashes
pub(crate) fn entry_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// Upper bound on the buffer preallocated from an untrusted size header.
const READ_CAPACITY_HINT: u64 = 8 * 1024 * 1024;
