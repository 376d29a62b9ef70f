use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} entries ({per_sec})";

/// Point-in-time view of a [`ProgressTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// Shared count of completed entry scans.
///
/// `advance` is called exactly once per entry, after its scan attempt ends.
/// The tracker never blocks and never gates scanning; the optional bar only
/// mirrors the counter.
#[derive(Debug)]
pub struct ProgressTracker {
    completed: AtomicU64,
    total: AtomicU64,
    bar: ProgressBar,
}

impl ProgressTracker {
    /// A tracker with no visible output
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    /// A tracker that drives a terminal progress bar on stderr
    pub fn visible() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message("Scanning archives");
        Self::with_bar(bar)
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            bar,
        }
    }

    /// Declares the expected number of entries
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.bar.set_length(total);
    }

    /// Records one finished entry
    pub fn advance(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::hidden()
    }
}
