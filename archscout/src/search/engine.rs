use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{spawn_blocking, JoinSet};
use tracing::{debug, error, info, warn};

use super::matcher::{TermMatcher, TermSet};
use super::scanner::{ArchiveScanner, ScanContext};
use crate::archive::ArchiveAdapter;
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::export::MatchExporter;
use crate::filters::{discover_archives, FileTypeFilter};
use crate::progress::ProgressTracker;
use crate::results::{ArchiveOutcome, ScanReport, ScanSummary};

/// Resolved inputs for one run
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub term_set: TermSet,
    pub filter: Option<FileTypeFilter>,
    /// Maximum bytes read from each entry; `None` reads entries whole
    pub max_entry_size: Option<u64>,
    /// Upper bound on concurrent blocking entry reads
    pub read_concurrency: NonZeroUsize,
    pub show_progress: bool,
}

impl ScanOptions {
    pub fn new(term_set: TermSet) -> Self {
        Self {
            term_set,
            filter: None,
            max_entry_size: None,
            read_concurrency: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
            show_progress: false,
        }
    }

    pub fn from_config(config: &ScanConfig) -> ScanResult<Self> {
        Ok(Self {
            term_set: config.term_set()?,
            filter: config.file_type_filter()?,
            max_entry_size: config.max_entry_size,
            read_concurrency: config.thread_count,
            show_progress: false,
        })
    }

    pub fn with_filter(mut self, filter: Option<FileTypeFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_max_entry_size(mut self, max_entry_size: Option<u64>) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }

    pub fn with_read_concurrency(mut self, read_concurrency: NonZeroUsize) -> Self {
        self.read_concurrency = read_concurrency;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Lists every archive once and sums the entry counts.
///
/// Archives that fail to open contribute zero. The failure is only logged at
/// debug level here, since the scan pass reports it again.
pub async fn count_entries(archives: &[PathBuf]) -> u64 {
    let mut tasks = JoinSet::new();
    for archive in archives {
        let archive = archive.clone();
        tasks.spawn(async move {
            let listed = spawn_blocking({
                let archive = archive.clone();
                move || -> ScanResult<usize> {
                    let adapter = ArchiveAdapter::open(&archive)?;
                    Ok(adapter.list_entries()?.len())
                }
            })
            .await;
            match listed {
                Ok(Ok(count)) => count as u64,
                Ok(Err(e)) => {
                    debug!(archive = %archive.display(), error = %e, "pre-count skipped archive");
                    0
                }
                Err(e) => {
                    debug!(archive = %archive.display(), error = %e, "pre-count task failed");
                    0
                }
            }
        });
    }

    let mut total = 0;
    while let Some(joined) = tasks.join_next().await {
        total += joined.unwrap_or(0);
    }
    total
}

/// Scans every archive concurrently and returns once all of them finished.
///
/// Per-archive and per-entry failures are logged and never abort the run.
/// An empty archive list yields an empty report.
pub async fn scan_archives(archives: &[PathBuf], options: &ScanOptions) -> ScanResult<ScanReport> {
    let progress = if options.show_progress {
        ProgressTracker::visible()
    } else {
        ProgressTracker::hidden()
    };
    scan_archives_with_progress(archives, options, progress).await
}

/// Like [`scan_archives`], reporting progress through the given tracker
pub async fn scan_archives_with_progress(
    archives: &[PathBuf],
    options: &ScanOptions,
    progress: ProgressTracker,
) -> ScanResult<ScanReport> {
    let start = Instant::now();
    let matcher = TermMatcher::new(&options.term_set);
    if matcher.is_empty() {
        warn!("No usable search terms; every entry will be scanned without a match");
    }
    info!(
        archives = archives.len(),
        terms = matcher.len(),
        regex = options.term_set.is_regex,
        "Starting scan"
    );

    let total = count_entries(archives).await;
    progress.set_total(total);
    debug!(total, "pre-count complete");

    let ctx = Arc::new(ScanContext::new(
        matcher,
        options.filter.clone(),
        options.max_entry_size,
        options.read_concurrency.get(),
        progress,
    ));

    let mut tasks = JoinSet::new();
    for (index, archive) in archives.iter().enumerate() {
        let scanner = ArchiveScanner::new(archive.clone(), Arc::clone(&ctx));
        tasks.spawn(async move { (index, scanner.scan().await) });
    }

    let mut outcomes: Vec<Option<ArchiveOutcome>> = vec![None; archives.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => error!(error = %e, "archive task failed"),
        }
    }
    let outcomes: Vec<ArchiveOutcome> = outcomes
        .into_iter()
        .zip(archives)
        .map(|(outcome, archive)| {
            outcome.unwrap_or_else(|| ArchiveOutcome {
                archive: archive.clone(),
                error: Some("archive task failed".to_string()),
                ..Default::default()
            })
        })
        .collect();

    ctx.progress.finish();
    ctx.metrics.log_stats();

    let records = ctx.sink.take_records();
    let snapshot = ctx.progress.snapshot();
    let summary = ScanSummary {
        archive_count: archives.len(),
        match_count: records.len(),
        entries_total: snapshot.total,
        entries_scanned: snapshot.completed,
        elapsed: start.elapsed(),
    };
    info!("Scan complete. {}", summary);

    Ok(ScanReport {
        records,
        summary,
        outcomes,
        stats: ctx.metrics.get_stats(),
    })
}

/// Discovers archives under `config.root_path` and scans them
pub async fn scan(config: &ScanConfig) -> ScanResult<ScanReport> {
    let options = ScanOptions::from_config(config)?;
    let archives = discover_archives(&config.root_path, &config.ignore_patterns)?;
    if archives.is_empty() {
        return Err(ScanError::no_archives(&config.root_path));
    }
    scan_archives(&archives, &options).await
}

/// Hands the records to an exporter; returns false when there was nothing to write
pub fn export_report(report: &ScanReport, exporter: &dyn MatchExporter) -> ScanResult<bool> {
    if report.records.is_empty() {
        debug!("No matches, skipping export");
        return Ok(false);
    }
    exporter.export(&report.sorted_records())?;
    Ok(true)
}

/// Discovers archives under `path` and scans them with explicit options
pub async fn scan_path(path: &Path, options: &ScanOptions) -> ScanResult<ScanReport> {
    let archives = discover_archives(path, &[])?;
    if archives.is_empty() {
        return Err(ScanError::no_archives(path));
    }
    scan_archives(&archives, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::JsonExporter;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_count_entries_skips_broken_archives() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.zip");
        write_zip(&good, &[("a.txt", b"a"), ("b.txt", b"b")]);
        let broken = dir.path().join("broken.zip");
        std::fs::write(&broken, b"garbage").unwrap();
        let unsupported = dir.path().join("x.cab");
        std::fs::write(&unsupported, b"garbage").unwrap();

        assert_eq!(count_entries(&[good, broken, unsupported]).await, 2);
        assert_eq!(count_entries(&[]).await, 0);
    }

    #[tokio::test]
    async fn test_scan_archives_summary() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.zip");
        write_zip(
            &good,
            &[("notes.txt", b"hello wickr world"), ("photo.jpg", b"\xff\xd8")],
        );
        let broken = dir.path().join("broken.zip");
        std::fs::write(&broken, b"garbage").unwrap();

        let options = ScanOptions::new(TermSet::literal(["wickr"]));
        let report = scan_archives(&[broken.clone(), good.clone()], &options)
            .await
            .unwrap();

        assert_eq!(report.summary.archive_count, 2);
        assert_eq!(report.summary.match_count, 1);
        assert_eq!(report.summary.entries_total, 2);
        assert_eq!(report.summary.entries_scanned, 2);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].archive, broken);
        assert_eq!(report.failed_archives().count(), 1);
        assert_eq!(report.stats.archives_failed, 1);
        assert_eq!(report.records[0].archive_path, good);
    }

    #[tokio::test]
    async fn test_empty_archive_list() {
        let options = ScanOptions::new(TermSet::literal(["x"]));
        let report = scan_archives(&[], &options).await.unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.summary.archive_count, 0);
    }

    #[tokio::test]
    async fn test_scan_path_without_archives() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"wickr").unwrap();
        let options = ScanOptions::new(TermSet::literal(["wickr"]));
        let err = scan_path(dir.path(), &options).await.unwrap_err();
        assert!(matches!(err, ScanError::NoArchives(_)));
    }

    #[test]
    fn test_export_report_skips_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let exporter = JsonExporter::new(&path);

        assert!(!export_report(&ScanReport::default(), &exporter).unwrap());
        assert!(!path.exists());
    }
}
