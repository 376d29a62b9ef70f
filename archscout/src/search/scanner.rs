use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{spawn_blocking, JoinSet};
use tracing::{debug, error, warn};

use super::matcher::TermMatcher;
use crate::archive::{ArchiveAdapter, ArchiveFormat, EntryInfo};
use crate::errors::{ScanError, ScanResult};
use crate::filters::{should_scan_entry, FileTypeFilter};
use crate::metrics::ScanMetrics;
use crate::progress::ProgressTracker;
use crate::results::{ArchiveOutcome, MatchSink};

/// State shared by every archive and entry task of one run
#[derive(Debug)]
pub struct ScanContext {
    pub matcher: TermMatcher,
    pub filter: Option<FileTypeFilter>,
    pub max_entry_size: Option<u64>,
    pub sink: MatchSink,
    pub progress: ProgressTracker,
    pub metrics: ScanMetrics,
    read_permits: Semaphore,
}

impl ScanContext {
    pub fn new(
        matcher: TermMatcher,
        filter: Option<FileTypeFilter>,
        max_entry_size: Option<u64>,
        read_concurrency: usize,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            matcher,
            filter,
            max_entry_size,
            sink: MatchSink::new(),
            progress,
            metrics: ScanMetrics::new(),
            read_permits: Semaphore::new(read_concurrency.max(1)),
        }
    }
}

/// Scans every qualifying entry of one archive.
///
/// Failures never escape: an archive that cannot be opened or listed is
/// logged and yields an outcome with `error` set, and an entry that cannot be
/// opened or read is logged and treated as a non-match.
pub struct ArchiveScanner {
    path: PathBuf,
    ctx: Arc<ScanContext>,
}

impl ArchiveScanner {
    pub fn new(path: impl Into<PathBuf>, ctx: Arc<ScanContext>) -> Self {
        Self {
            path: path.into(),
            ctx,
        }
    }

    pub async fn scan(self) -> ArchiveOutcome {
        let mut outcome = ArchiveOutcome {
            archive: self.path.clone(),
            ..Default::default()
        };

        if ArchiveFormat::from_path(&self.path).is_none() {
            let ext = self
                .path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            warn!(archive = %self.path.display(), extension = %ext, "Unsupported archive format");
            self.ctx.metrics.record_archive_unsupported();
            outcome.error = Some(ScanError::unsupported_format(&self.path).to_string());
            return outcome;
        }

        let (adapter, entries) = match open_and_list(&self.path).await {
            Ok(opened) => opened,
            Err(e) => {
                error!(archive = %self.path.display(), error = %e, "Error processing archive");
                self.ctx.metrics.record_archive_failed();
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        outcome.entries_listed = entries.len();

        let selected: Vec<EntryInfo> = entries
            .into_iter()
            .filter(|entry| should_scan_entry(&entry.name, self.ctx.filter.as_ref()))
            .collect();
        let filtered = outcome.entries_listed - selected.len();
        if filtered > 0 {
            self.ctx.metrics.record_entries_filtered(filtered as u64);
        }
        debug!(
            archive = %self.path.display(),
            selected = selected.len(),
            filtered,
            "scanning entries"
        );

        let adapter = Arc::new(adapter);
        let mut tasks = JoinSet::new();
        for entry in selected {
            tasks.spawn(scan_entry(
                Arc::clone(&adapter),
                entry,
                Arc::clone(&self.ctx),
            ));
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(()) => outcome.entries_scanned += 1,
                Err(e) => {
                    error!(archive = %self.path.display(), error = %e, "entry task failed");
                }
            }
        }

        self.ctx.metrics.record_archive_scanned();
        outcome
    }
}

/// Opens the archive and lists its entries on the blocking pool
async fn open_and_list(path: &Path) -> ScanResult<(ArchiveAdapter, Vec<EntryInfo>)> {
    let owned = path.to_path_buf();
    spawn_blocking(move || -> ScanResult<(ArchiveAdapter, Vec<EntryInfo>)> {
        let adapter = ArchiveAdapter::open(&owned)?;
        let entries = adapter.list_entries()?;
        Ok((adapter, entries))
    })
    .await
    .map_err(|e| ScanError::archive_open(path, format!("open task failed: {}", e)))?
}

/// Advances progress when dropped, so every entry task counts exactly once
struct CompletionHook(Arc<ScanContext>);

impl Drop for CompletionHook {
    fn drop(&mut self) {
        self.0.progress.advance();
    }
}

async fn scan_entry(adapter: Arc<ArchiveAdapter>, entry: EntryInfo, ctx: Arc<ScanContext>) {
    let _completion = CompletionHook(Arc::clone(&ctx));
    let archive = adapter.path().to_path_buf();

    let bytes = match read_entry(adapter, &entry.name, &ctx).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(
                archive = %archive.display(),
                entry = %entry.name,
                error = %e,
                "Error reading entry"
            );
            ctx.metrics.record_entry_failed();
            return;
        }
    };
    ctx.metrics
        .record_read(bytes.len() as u64, ctx.max_entry_size);

    if let Some(record) = ctx.matcher.match_entry(&bytes, &entry.name, &archive) {
        ctx.metrics.record_entry_matched();
        ctx.sink.push(record);
    }
}

/// Reads the bounded entry body on the blocking pool
async fn read_entry(
    adapter: Arc<ArchiveAdapter>,
    name: &str,
    ctx: &ScanContext,
) -> ScanResult<Vec<u8>> {
    // The semaphore is never closed, so acquiring only waits.
    let _permit = ctx.read_permits.acquire().await.ok();
    let owned_name = name.to_string();
    let limit = ctx.max_entry_size;
    let archive = adapter.path().to_path_buf();
    spawn_blocking(move || adapter.read_entry(&owned_name, limit))
        .await
        .map_err(|e| ScanError::read_or_decode(archive, name, format!("read task failed: {}", e)))?
}
