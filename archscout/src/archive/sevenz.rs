use sevenz_rust::{Archive, BlockDecoder};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::{read_bounded, EntryInfo};
use crate::errors::{ScanError, ScanResult};

const NO_PASSWORD: &[u8] = &[];

/// 7z reader.
///
/// A read decodes only the folder (solid block) holding the requested entry.
/// Members stored ahead of it in that folder are decoded and discarded, since
/// a solid stream cannot be entered midway. Other folders are never touched,
/// and entries without a stream are returned empty without decoding anything.
/// Each call opens its own file handle. Encrypted archives are opened with an
/// empty password and fail on open or on read.
#[derive(Debug)]
pub struct SevenZipAdapter {
    path: PathBuf,
}

impl SevenZipAdapter {
    pub fn open(path: &Path) -> ScanResult<Self> {
        let (_, archive) = Self::load(path).map_err(|e| ScanError::archive_open(path, e))?;
        debug!(
            archive = %path.display(),
            entries = archive.files.len(),
            folders = archive.folders.len(),
            "opened 7z archive"
        );
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list_entries(&self) -> ScanResult<Vec<EntryInfo>> {
        let (_, archive) =
            Self::load(&self.path).map_err(|e| ScanError::archive_open(&self.path, e))?;
        Ok(archive
            .files
            .iter()
            .filter(|entry| !entry.is_directory())
            .map(|entry| EntryInfo::new(entry_name(entry.name()), Some(entry.size())))
            .collect())
    }

    pub fn read_entry(&self, name: &str, limit: Option<u64>) -> ScanResult<Vec<u8>> {
        self.read_member(name, limit).map(|(bytes, _)| bytes)
    }

    /// Reads the named entry and reports how many folder members were
    /// handed to the decoder on the way, the target included.
    fn read_member(&self, name: &str, limit: Option<u64>) -> ScanResult<(Vec<u8>, usize)> {
        let (mut file, archive) =
            Self::load(&self.path).map_err(|e| ScanError::entry_open(&self.path, name, e))?;

        let index = archive
            .files
            .iter()
            .position(|entry| !entry.is_directory() && entry_name(entry.name()) == name)
            .ok_or_else(|| {
                ScanError::entry_open(&self.path, name, "entry not found in archive")
            })?;
        let folder_index = match archive.stream_map.file_folder_index.get(index).copied() {
            Some(Some(folder_index)) => folder_index,
            _ => return Ok((Vec::new(), 0)),
        };

        let mut found: Option<std::io::Result<Vec<u8>>> = None;
        let mut skip_error: Option<std::io::Error> = None;
        let mut visited = 0usize;
        let decoder = BlockDecoder::new(folder_index, &archive, NO_PASSWORD, &mut file);
        let decoded = decoder.for_each_entries(&mut |entry, data| {
            visited += 1;
            if entry_name(entry.name()) == name {
                found = Some(read_bounded(data, limit, Some(entry.size())));
                return Ok(false);
            }
            // Solid streams must be consumed to stay aligned on the next member.
            if let Err(e) = std::io::copy(data, &mut std::io::sink()) {
                skip_error = Some(e);
                return Ok(false);
            }
            Ok(true)
        });
        if let Err(e) = decoded {
            return Err(match found {
                Some(_) => ScanError::read_or_decode(&self.path, name, e),
                None => ScanError::entry_open(&self.path, name, e),
            });
        }
        trace!(
            archive = %self.path.display(),
            entry = name,
            folder = folder_index,
            visited,
            "decoded 7z folder"
        );

        match (found, skip_error) {
            (Some(result), _) => result
                .map(|bytes| (bytes, visited))
                .map_err(|e| ScanError::read_or_decode(&self.path, name, e)),
            (None, Some(e)) => Err(ScanError::entry_open(&self.path, name, e)),
            (None, None) => Err(ScanError::entry_open(
                &self.path,
                name,
                "entry missing from its folder",
            )),
        }
    }

    fn load(path: &Path) -> Result<(File, Archive), sevenz_rust::Error> {
        let mut file = File::open(path).map_err(sevenz_rust::Error::io)?;
        let len = file.metadata().map_err(sevenz_rust::Error::io)?.len();
        let archive = Archive::read(&mut file, len, NO_PASSWORD)?;
        Ok((file, archive))
    }
}

fn entry_name(raw: &str) -> String {
    raw.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_7z(dir: &Path, dest: &Path, files: &[(&str, &[u8])]) {
        let src = dir.join("src");
        for (name, data) in files {
            let file_path = src.join(name);
            std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
            std::fs::write(file_path, data).unwrap();
        }
        sevenz_rust::compress_to_path(&src, dest).unwrap();
    }

    #[test]
    fn test_list_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.7z");
        write_7z(
            dir.path(),
            &path,
            &[("notes.txt", b"hello wickr world"), ("photo.jpg", b"\xff\xd8\xff\xe0")],
        );

        let adapter = SevenZipAdapter::open(&path).unwrap();
        let mut names: Vec<String> = adapter
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["notes.txt", "photo.jpg"]);

        assert_eq!(
            adapter.read_entry("notes.txt", None).unwrap(),
            b"hello wickr world"
        );
        assert_eq!(adapter.read_entry("notes.txt", Some(5)).unwrap(), b"hello");
        assert_eq!(
            adapter.read_entry("photo.jpg", None).unwrap(),
            b"\xff\xd8\xff\xe0"
        );
    }

    const MEMBERS: [(&str, &[u8]); 5] = [
        ("a.txt", b"first member about wickr"),
        ("b.txt", b"second member"),
        ("c.txt", b"third member"),
        ("d.txt", b"fourth member"),
        ("e.txt", b"fifth member about signal"),
    ];

    fn five_folder_archive(dir: &Path) -> PathBuf {
        let path = dir.join("many.7z");
        write_7z(dir, &path, &MEMBERS);
        path
    }

    fn content_of(name: &str) -> &'static [u8] {
        MEMBERS.iter().find(|(n, _)| *n == name).unwrap().1
    }

    fn folder_of(archive: &Archive, name: &str) -> usize {
        let index = archive
            .files
            .iter()
            .position(|entry| entry.name() == name)
            .unwrap();
        archive.stream_map.file_folder_index[index].unwrap()
    }

    #[test]
    fn test_read_decodes_only_the_target_folder() {
        let dir = tempdir().unwrap();
        let path = five_folder_archive(dir.path());
        let (_, archive) = SevenZipAdapter::load(&path).unwrap();
        assert!(archive.folders.len() > 1);

        let adapter = SevenZipAdapter::open(&path).unwrap();
        let entries = adapter.list_entries().unwrap();
        let first = &entries[0].name;
        let last = &entries[entries.len() - 1].name;
        assert_ne!(folder_of(&archive, first), folder_of(&archive, last));

        let (bytes, visited) = adapter.read_member(first, None).unwrap();
        assert_eq!(bytes, content_of(first));
        assert_eq!(visited, 1);

        let (bytes, visited) = adapter.read_member(last, Some(5)).unwrap();
        assert_eq!(bytes, &content_of(last)[..5]);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_damaged_folder_does_not_affect_other_entries() {
        let dir = tempdir().unwrap();
        let path = five_folder_archive(dir.path());
        let (_, archive) = SevenZipAdapter::load(&path).unwrap();
        let members: Vec<String> = archive
            .files
            .iter()
            .filter(|entry| entry.has_stream())
            .map(|entry| entry.name().to_string())
            .collect();
        let damaged = &members[0];
        let intact = &members[members.len() - 1];
        let damaged_folder = folder_of(&archive, damaged);
        assert_ne!(damaged_folder, folder_of(&archive, intact));

        // Overwrite the packed bytes of the first folder
        let pack_index = archive.stream_map.folder_first_pack_stream_index[damaged_folder];
        let start = 32 + archive.pack_pos + archive.stream_map.pack_stream_offsets[pack_index];
        let end = start + archive.pack_sizes[pack_index];
        let mut raw = std::fs::read(&path).unwrap();
        for byte in &mut raw[start as usize..end as usize] {
            *byte = 0xff;
        }
        std::fs::write(&path, raw).unwrap();

        let adapter = SevenZipAdapter::open(&path).unwrap();
        assert_eq!(adapter.read_entry(intact, None).unwrap(), content_of(intact));
    }

    #[test]
    fn test_corrupt_archive_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.7z");
        std::fs::write(&path, b"not a 7z file").unwrap();

        let err = SevenZipAdapter::open(&path).unwrap_err();
        assert!(matches!(err, ScanError::ArchiveOpen { .. }));
    }
}
