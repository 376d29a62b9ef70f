//! Scan output types.
//!
//! A [`MatchRecord`] is the unit of output: one entry, the archive that holds
//! it, and the term that matched first. Concurrent scans push records into a
//! [`MatchSink`], which only supports appending. Once every scan has drained,
//! the coordinator takes the records out and wraps them in a [`ScanReport`]
//! together with the run's [`ScanSummary`].
//!
//! The record set is unordered: entries finish in whatever order their reads
//! complete, so callers that need a stable order sort the records themselves.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::metrics::ScanStats;

/// One hit of a term against one archive entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Path of the entry inside the archive
    pub entry_path: String,
    /// Path of the archive on disk
    pub archive_path: PathBuf,
    /// The term that matched, as configured
    pub matched_term: String,
}

impl MatchRecord {
    pub fn new(
        entry_path: impl Into<String>,
        archive_path: impl Into<PathBuf>,
        matched_term: impl Into<String>,
    ) -> Self {
        Self {
            entry_path: entry_path.into(),
            archive_path: archive_path.into(),
            matched_term: matched_term.into(),
        }
    }

    /// Archive path joined with the entry path, e.g. `dump/a.zip/notes.txt`
    pub fn display_path(&self) -> PathBuf {
        self.archive_path.join(&self.entry_path)
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} [{}]",
            self.archive_path.display(),
            self.entry_path,
            self.matched_term
        )
    }
}

/// Append-only record collection shared by every task of one run
#[derive(Debug, Default)]
pub struct MatchSink {
    records: Mutex<Vec<MatchRecord>>,
}

impl MatchSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record
    pub fn push(&self, record: MatchRecord) {
        // A poisoned lock still holds every record pushed before the panic.
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .map(|records| records.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the records out, for the owner to call once every writer is done
    pub fn take_records(&self) -> Vec<MatchRecord> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *records)
    }

    /// Consumes the sink and returns everything pushed into it
    pub fn into_records(self) -> Vec<MatchRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Aggregate statistics for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Archives handed to the run, including ones that failed to open
    pub archive_count: usize,
    /// Records in the result set
    pub match_count: usize,
    /// Entries counted by the pre-count pass
    pub entries_total: u64,
    /// Entries whose scan attempt completed
    pub entries_scanned: u64,
    /// Wall-clock time of the run, pre-count pass included
    pub elapsed: Duration,
}

impl ScanSummary {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archives, {} matches, {}/{} entries in {}",
            self.archive_count,
            self.match_count,
            self.entries_scanned,
            self.entries_total,
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64))
        )
    }
}

/// What one archive scan did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub archive: PathBuf,
    /// Entries the adapter listed, before filtering
    pub entries_listed: usize,
    /// Entries whose scan attempt completed
    pub entries_scanned: usize,
    /// Set when the archive could not be scanned at all
    pub error: Option<String>,
}

/// Everything a run produces
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub records: Vec<MatchRecord>,
    pub summary: ScanSummary,
    /// One outcome per input archive, in input order
    pub outcomes: Vec<ArchiveOutcome>,
    pub stats: ScanStats,
}

impl ScanReport {
    /// Records sorted by archive, entry and term
    pub fn sorted_records(&self) -> Vec<MatchRecord> {
        let mut records = self.records.clone();
        records.sort();
        records
    }

    /// Archives that could not be scanned
    pub fn failed_archives(&self) -> impl Iterator<Item = &ArchiveOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some())
    }

    /// Records that reference `archive`
    pub fn records_for<'a>(&'a self, archive: &'a Path) -> impl Iterator<Item = &'a MatchRecord> {
        self.records
            .iter()
            .filter(move |record| record.archive_path == archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_match_record_creation() {
        let record = MatchRecord::new("notes.txt", "dump/a.zip", "wickr");
        assert_eq!(record.entry_path, "notes.txt");
        assert_eq!(record.archive_path, PathBuf::from("dump/a.zip"));
        assert_eq!(record.matched_term, "wickr");
        assert_eq!(record.display_path(), PathBuf::from("dump/a.zip/notes.txt"));
        assert_eq!(record.to_string(), "dump/a.zip:notes.txt [wickr]");
    }

    #[test]
    fn test_sink_concurrent_push() {
        let sink = Arc::new(MatchSink::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        sink.push(MatchRecord::new(format!("{}-{}.txt", t, i), "a.zip", "x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.len(), 800);
        let sink = Arc::try_unwrap(sink).unwrap();
        let mut records = sink.into_records();
        records.sort();
        records.dedup();
        assert_eq!(records.len(), 800);
    }

    #[test]
    fn test_report_helpers() {
        let report = ScanReport {
            records: vec![
                MatchRecord::new("b.txt", "two.zip", "x"),
                MatchRecord::new("a.txt", "one.zip", "x"),
                MatchRecord::new("c.txt", "two.zip", "y"),
            ],
            ..Default::default()
        };

        let sorted = report.sorted_records();
        assert_eq!(sorted[0].archive_path, PathBuf::from("one.zip"));
        assert_eq!(report.records_for(Path::new("two.zip")).count(), 2);
    }

    #[test]
    fn test_summary_display() {
        let summary = ScanSummary {
            archive_count: 2,
            match_count: 1,
            entries_total: 3,
            entries_scanned: 3,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(summary.to_string(), "2 archives, 1 matches, 3/3 entries in 1s 500ms");
        assert!((summary.elapsed_secs() - 1.5).abs() < f64::EPSILON);
    }
}
