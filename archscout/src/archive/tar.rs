use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

use super::{entry_name, read_bounded, EntryInfo};
use crate::errors::{ScanError, ScanResult};

/// Uncompressed tar reader.
///
/// Tar has no index, so each read walks the headers from the start of the
/// file, seeking over member bodies, until it reaches the requested entry.
/// Each call opens its own file handle. Scanning every entry is therefore
/// quadratic in the number of headers, which shows on tars with many
/// thousands of members. Rar reads behave the same way.
#[derive(Debug)]
pub struct TarAdapter {
    path: PathBuf,
}

impl TarAdapter {
    pub fn open(path: &Path) -> ScanResult<Self> {
        let file = File::open(path).map_err(|e| ScanError::archive_open(path, e))?;
        let mut archive = Archive::new(file);
        let mut entries = archive
            .entries_with_seek()
            .map_err(|e| ScanError::archive_open(path, e))?;
        // A bad first header means this is not a tar file at all.
        if let Some(first) = entries.next() {
            first.map_err(|e| ScanError::archive_open(path, e))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list_entries(&self) -> ScanResult<Vec<EntryInfo>> {
        let mut archive = self.reopen().map_err(|e| ScanError::archive_open(&self.path, e))?;
        let mut entries = Vec::new();
        for entry in archive
            .entries_with_seek()
            .map_err(|e| ScanError::archive_open(&self.path, e))?
        {
            let entry = entry.map_err(|e| ScanError::archive_open(&self.path, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .map_err(|e| ScanError::archive_open(&self.path, e))?;
            entries.push(EntryInfo::new(entry_name(&name), Some(entry.size())));
        }
        debug!(archive = %self.path.display(), entries = entries.len(), "listed tar archive");
        Ok(entries)
    }

    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> ScanResult<Vec<u8>> {
        let open_err = |e: std::io::Error| ScanError::entry_open(&self.path, name, e);
        // TODO: keep the header offsets seen by `list_entries` and seek straight to the body
        let mut archive = self.reopen().map_err(open_err)?;
        for entry in archive.entries_with_seek().map_err(open_err)? {
            let entry = entry.map_err(open_err)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .map(|p| entry_name(&p) == name)
                .unwrap_or(false);
            if matches {
                let size = entry.size();
                return read_bounded(entry, limit, Some(size))
                    .map_err(|e| ScanError::read_or_decode(&self.path, name, e));
            }
        }
        Err(ScanError::entry_open(
            &self.path,
            name,
            "entry not found in archive",
        ))
    }

    fn reopen(&self) -> std::io::Result<Archive<File>> {
        Ok(Archive::new(File::open(&self.path)?))
    }
}
