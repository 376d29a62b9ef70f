/// Concurrent content search across archives.
///
/// # Structure
///
/// A run has two levels of fan-out:
///
/// 1. [`engine`] spawns one task per archive into a run-wide `JoinSet` and
///    waits for every one of them before building the report.
/// 2. [`scanner`] lists one archive, drops entries the file-type filter
///    rejects, and spawns one task per remaining entry into its own
///    `JoinSet`.
///
/// Each entry task reads its bounded body on tokio's blocking pool and hands
/// the bytes to the [`matcher`], which runs on the async workers:
/// ```rust,ignore
/// let bytes = spawn_blocking(move || adapter.read_entry(&name, limit)).await??;
/// if let Some(record) = matcher.match_entry(&bytes, &name, archive) {
///     sink.push(record);
/// }
/// ```
///
/// # Failure Handling
///
/// Nothing below the archive level can end a run. An archive that cannot be
/// opened is logged and skipped, and an entry that cannot be read is logged
/// and counted as a non-match. Progress advances once per attempted entry in
/// every case, so the counter always settles.
///
/// # Shared State
///
/// Tasks only share append-only state: the record sink, the progress counter
/// and the diagnostic metrics. None of them is read back until every task
/// of the run has been joined.
pub mod engine;
pub mod matcher;
pub mod scanner;

pub use engine::{count_entries, export_report, scan, scan_archives, scan_path, ScanOptions};
pub use matcher::{TermMatcher, TermSet};
pub use scanner::{ArchiveScanner, ScanContext};
