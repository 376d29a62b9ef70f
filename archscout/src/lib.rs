pub mod archive;
pub mod config;
pub mod errors;
pub mod export;
pub mod filters;
pub mod metrics;
pub mod presets;
pub mod progress;
pub mod results;
pub mod search;

pub use archive::{ArchiveAdapter, ArchiveFormat, EntryInfo};
pub use config::ScanConfig;
pub use errors::{ScanError, ScanResult};
pub use export::{exporter_for, CsvExporter, JsonExporter, MatchExporter};
pub use filters::{discover_archives, FileTypeFilter};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use results::{ArchiveOutcome, MatchRecord, MatchSink, ScanReport, ScanSummary};
pub use search::{
    count_entries, export_report, scan, scan_archives, scan_path, ScanOptions, TermMatcher,
    TermSet,
};
