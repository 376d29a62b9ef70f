use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{read_bounded, EntryInfo};
use crate::errors::{ScanError, ScanResult};

/// ZIP reader.
///
/// The central directory is parsed once on open. Entry reads share the single
/// file handle, so concurrent reads on one archive are serialized by the lock.
pub struct ZipAdapter {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

impl std::fmt::Debug for ZipAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipAdapter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ZipAdapter {
    pub fn open(path: &Path) -> ScanResult<Self> {
        let file = File::open(path).map_err(|e| ScanError::archive_open(path, e))?;
        let archive = ZipArchive::new(file).map_err(|e| ScanError::archive_open(path, e))?;
        debug!(archive = %path.display(), entries = archive.len(), "opened zip archive");
        Ok(Self {
            path: path.to_path_buf(),
            archive: Mutex::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list_entries(&self) -> ScanResult<Vec<EntryInfo>> {
        let mut archive = self.lock()?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            // Raw access skips decryption so encrypted entries still list.
            let file = archive
                .by_index_raw(index)
                .map_err(|e| ScanError::archive_open(&self.path, e))?;
            if file.is_dir() {
                continue;
            }
            entries.push(EntryInfo::new(file.name(), Some(file.size())));
        }
        Ok(entries)
    }

    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> ScanResult<Vec<u8>> {
        let mut archive = self.lock()?;
        let file = archive.by_name(name).map_err(|e| match e {
            ZipError::Io(io) => ScanError::read_or_decode(&self.path, name, io),
            other => ScanError::entry_open(&self.path, name, other),
        })?;
        let size = file.size();
        read_bounded(file, limit, Some(size))
            .map_err(|e| ScanError::read_or_decode(&self.path, name, e))
    }

    fn lock(&self) -> ScanResult<std::sync::MutexGuard<'_, ZipArchive<File>>> {
        self.archive
            .lock()
            .map_err(|_| ScanError::archive_open(&self.path, "archive handle poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        writer
            .add_directory("nested/", FileOptions::default())
            .unwrap();
        for (name, data) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_list_skips_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.zip");
        write_zip(
            &path,
            &[("notes.txt", b"hello"), ("nested/photo.jpg", b"\xff\xd8\xff")],
        );

        let adapter = ZipAdapter::open(&path).unwrap();
        let names: Vec<String> = adapter
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["notes.txt", "nested/photo.jpg"]);
    }

    #[test]
    fn test_read_entry_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.zip");
        write_zip(&path, &[("notes.txt", b"hello wickr world")]);

        let adapter = ZipAdapter::open(&path).unwrap();
        assert_eq!(
            adapter.read_entry("notes.txt", None).unwrap(),
            b"hello wickr world"
        );
        assert_eq!(adapter.read_entry("notes.txt", Some(5)).unwrap(), b"hello");
    }

    #[test]
    fn test_missing_entry_is_entry_open_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.zip");
        write_zip(&path, &[("notes.txt", b"hello")]);

        let adapter = ZipAdapter::open(&path).unwrap();
        let err = adapter.read_entry("missing.txt", None).unwrap_err();
        assert!(matches!(err, ScanError::EntryOpen { .. }));
    }

    #[test]
    fn test_corrupt_archive_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let err = ZipAdapter::open(&path).unwrap_err();
        assert!(matches!(err, ScanError::ArchiveOpen { .. }));
    }
}
