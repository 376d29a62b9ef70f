//! Persisting match records.
//!
//! Both exporters write the same three columns per record:
//!
//! | Column              | Value                                  |
//! |---------------------|----------------------------------------|
//! | `Path+Filename`     | archive path joined with the entry path |
//! | `Archive Path`      | archive path                           |
//! | `Search Term Found` | the term that matched                  |
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::ScanResult;
use crate::results::MatchRecord;

/// Writes a set of records somewhere
pub trait MatchExporter {
    fn export(&self, records: &[MatchRecord]) -> ScanResult<()>;

    /// Where the records end up, for user-facing messages
    fn destination(&self) -> &Path;
}

#[derive(Debug, Serialize)]
struct ExportRow {
    #[serde(rename = "Path+Filename")]
    path_and_filename: String,
    #[serde(rename = "Archive Path")]
    archive_path: String,
    #[serde(rename = "Search Term Found")]
    search_term: String,
}

impl From<&MatchRecord> for ExportRow {
    fn from(record: &MatchRecord) -> Self {
        Self {
            path_and_filename: record.display_path().to_string_lossy().into_owned(),
            archive_path: record.archive_path.to_string_lossy().into_owned(),
            search_term: record.matched_term.clone(),
        }
    }
}

/// Comma-separated output with a header row
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MatchExporter for CsvExporter {
    fn export(&self, records: &[MatchRecord]) -> ScanResult<()> {
        let mut writer = csv::Writer::from_path(&self.path).map_err(io::Error::from)?;
        for record in records {
            writer
                .serialize(ExportRow::from(record))
                .map_err(io::Error::from)?;
        }
        writer.flush()?;
        info!(path = %self.path.display(), records = records.len(), "Exported CSV");
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

/// A pretty-printed JSON array of row objects
#[derive(Debug, Clone)]
pub struct JsonExporter {
    path: PathBuf,
}

impl JsonExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MatchExporter for JsonExporter {
    fn export(&self, records: &[MatchRecord]) -> ScanResult<()> {
        let rows: Vec<ExportRow> = records.iter().map(ExportRow::from).collect();
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &rows).map_err(io::Error::from)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!(path = %self.path.display(), records = records.len(), "Exported JSON");
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

/// Picks the exporter from the output extension: `.json` gets JSON, anything else CSV
pub fn exporter_for(path: &Path) -> Box<dyn MatchExporter> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Box::new(JsonExporter::new(path))
    } else {
        Box::new(CsvExporter::new(path))
    }
}
