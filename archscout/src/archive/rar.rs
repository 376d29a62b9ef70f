use std::path::{Path, PathBuf};
use tracing::debug;
use unrar::error::UnrarError;
use unrar::Archive;

use super::{entry_name, truncate_to_limit, EntryInfo};
use crate::errors::{ScanError, ScanResult};

/// RAR reader backed by the unrar library.
///
/// The library only hands out whole entry bodies, so a read materializes the
/// requested entry (never the archive) and truncates it to the limit. Headers
/// before the requested entry are skipped without decompressing their data,
/// except in solid archives where the library has to decode them anyway.
/// Every read reopens the archive and walks the headers from the start.
#[derive(Debug)]
pub struct RarAdapter {
    path: PathBuf,
}

impl RarAdapter {
    pub fn open(path: &Path) -> ScanResult<Self> {
        Archive::new(path)
            .open_for_listing()
            .map_err(|e| ScanError::archive_open(path, Self::describe(&e)))?;
        debug!(archive = %path.display(), "opened rar archive");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list_entries(&self) -> ScanResult<Vec<EntryInfo>> {
        let listing = Archive::new(&self.path)
            .open_for_listing()
            .map_err(|e| ScanError::archive_open(&self.path, Self::describe(&e)))?;
        let mut entries = Vec::new();
        for header in listing {
            let header =
                header.map_err(|e| ScanError::archive_open(&self.path, Self::describe(&e)))?;
            if header.is_directory() {
                continue;
            }
            entries.push(EntryInfo::new(
                entry_name(&header.filename),
                Some(header.unpacked_size),
            ));
        }
        Ok(entries)
    }

    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> ScanResult<Vec<u8>> {
        let open_err = |e: UnrarError| ScanError::entry_open(&self.path, name, Self::describe(&e));
        let mut cursor = Archive::new(&self.path)
            .open_for_processing()
            .map_err(open_err)?;
        loop {
            let at_file = match cursor.read_header().map_err(open_err)? {
                Some(at_file) => at_file,
                None => {
                    return Err(ScanError::entry_open(
                        &self.path,
                        name,
                        "entry not found in archive",
                    ))
                }
            };
            let header = at_file.entry();
            if !header.is_directory() && entry_name(&header.filename) == name {
                let (bytes, _rest) = at_file.read().map_err(|e| {
                    ScanError::read_or_decode(&self.path, name, Self::describe(&e))
                })?;
                return Ok(truncate_to_limit(bytes, limit));
            }
            cursor = at_file.skip().map_err(open_err)?;
        }
    }

    fn describe(e: &UnrarError) -> String {
        Self::describe_message(&e.to_string())
    }

    fn describe_message(msg: &str) -> String {
        if msg.to_lowercase().contains("password") {
            format!("encrypted archive or entry: {}", msg)
        } else {
            msg.to_string()
        }
    }
}
