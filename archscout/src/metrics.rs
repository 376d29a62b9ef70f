use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Diagnostic counters for one run, shared by every scan task
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Archive-level outcomes
    archives_scanned: Arc<AtomicU64>,
    archives_failed: Arc<AtomicU64>,
    archives_unsupported: Arc<AtomicU64>,

    // Entry-level outcomes
    entries_matched: Arc<AtomicU64>,
    entries_failed: Arc<AtomicU64>,
    entries_filtered: Arc<AtomicU64>,

    // Bytes pulled out of entries
    bytes_read: Arc<AtomicU64>,
    truncated_reads: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            archives_scanned: Arc::new(AtomicU64::new(0)),
            archives_failed: Arc::new(AtomicU64::new(0)),
            archives_unsupported: Arc::new(AtomicU64::new(0)),
            entries_matched: Arc::new(AtomicU64::new(0)),
            entries_failed: Arc::new(AtomicU64::new(0)),
            entries_filtered: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            truncated_reads: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_archive_scanned(&self) {
        self.archives_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archive_failed(&self) {
        self.archives_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archive_unsupported(&self) {
        self.archives_unsupported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entries_filtered(&self, count: u64) {
        self.entries_filtered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_entry_failed(&self) {
        self.entries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entry_matched(&self) {
        self.entries_matched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the bytes one entry read produced
    pub fn record_read(&self, bytes: u64, limit: Option<u64>) {
        let total = self.bytes_read.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if limit.is_some_and(|limit| bytes >= limit) {
            self.truncated_reads.fetch_add(1, Ordering::Relaxed);
        }
        debug!("Entry read: {} bytes, total: {} bytes", bytes, total);
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            archives_scanned: self.archives_scanned.load(Ordering::Relaxed),
            archives_failed: self.archives_failed.load(Ordering::Relaxed),
            archives_unsupported: self.archives_unsupported.load(Ordering::Relaxed),
            entries_matched: self.entries_matched.load(Ordering::Relaxed),
            entries_failed: self.entries_failed.load(Ordering::Relaxed),
            entries_filtered: self.entries_filtered.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            truncated_reads: self.truncated_reads.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Archives scanned/failed/unsupported: {}/{}/{}\n\
             Entries matched/failed/filtered: {}/{}/{}\n\
             Bytes read: {} ({} reads hit the size limit)",
            stats.archives_scanned,
            stats.archives_failed,
            stats.archives_unsupported,
            stats.entries_matched,
            stats.entries_failed,
            stats.entries_filtered,
            stats.bytes_read,
            stats.truncated_reads
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub archives_scanned: u64,
    pub archives_failed: u64,
    pub archives_unsupported: u64,
    pub entries_matched: u64,
    pub entries_failed: u64,
    pub entries_filtered: u64,
    pub bytes_read: u64,
    pub truncated_reads: u64,
}
