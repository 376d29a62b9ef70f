use archscout::{
    config::ScanConfig,
    export::exporter_for,
    filters::discover_archives,
    presets::{FILE_CATEGORIES, TERM_GROUPS},
    results::ScanReport,
    search::{export_report, scan_archives, ScanOptions, TermMatcher},
    ScanError,
};
use clap::Parser;
use colored::Colorize;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type Result<T> = std::result::Result<T, ScanError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Archive or directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Term to search for (can be specified multiple times)
    #[arg(short = 't', long = "term")]
    terms: Vec<String>,

    /// Predefined term groups (e.g. wickr,whatsapp)
    #[arg(short = 'p', long = "preset", value_delimiter = ',')]
    presets: Vec<String>,

    /// Treat every term as a case-insensitive regular expression
    #[arg(short = 'r', long = "regex")]
    is_regex: bool,

    /// Match literal terms case-sensitively
    #[arg(short = 'c', long)]
    case_sensitive: bool,

    /// Entry extensions to scan (e.g. txt,db,plist)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Predefined file-type category (can be specified multiple times)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Only read the first N kilobytes of each entry
    #[arg(long)]
    max_size_kb: Option<u64>,

    /// Number of concurrent entry reads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Result file (.json for JSON, CSV otherwise)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also append log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the predefined term groups and file-type categories, then exit
    #[arg(long)]
    list_presets: bool,
}

impl Cli {
    fn to_config(&self) -> ScanConfig {
        let file_extensions = self.extensions.as_ref().map(|e| {
            e.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        let defaults = ScanConfig::default();
        ScanConfig {
            terms: self.terms.clone(),
            presets: self.presets.clone(),
            is_regex: self.is_regex,
            case_sensitive: self.case_sensitive,
            file_extensions,
            categories: self.categories.clone(),
            max_entry_size: self.max_size_kb.map(|kb| kb.saturating_mul(1024)),
            root_path: self.path.clone(),
            thread_count: self.threads.unwrap_or(defaults.thread_count),
            log_level: self.log_level.clone(),
            output: self.output.clone(),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_presets {
        print_presets();
        return Ok(());
    }

    let config = ScanConfig::load_from(cli.config.as_deref())?.merge_with_cli(cli.to_config());
    init_logging(&config.log_level, cli.log_file.as_deref())?;
    tracing::debug!(?config, "effective configuration");

    let options = ScanOptions::from_config(&config)?.with_progress(!cli.no_progress);
    if options.term_set.is_empty() {
        return Err(ScanError::config_error(
            "No search terms given; use --term or --preset",
        ));
    }
    // Reject bad regexes before any archive is touched
    TermMatcher::try_new(&options.term_set)?;
    if let Some(filter) = &options.filter {
        let extensions: Vec<&str> = filter.extensions().collect();
        println!(
            "{}",
            format!("Limiting search to file types: {}", extensions.join(", ")).green()
        );
    }

    let archives = discover_archives(&config.root_path, &config.ignore_patterns)?;
    if archives.is_empty() {
        println!("{}", "No valid archives found.".red());
        return Ok(());
    }

    let report = scan_archives(&archives, &options).await?;
    print_summary(&report);

    let exporter = exporter_for(&config.output_path());
    if export_report(&report, exporter.as_ref())? {
        println!(
            "{}",
            format!("Results saved to '{}'.", exporter.destination().display()).green()
        );
    }
    Ok(())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Logs go to stderr, and to `log_file` as well when one is given
fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(env_filter(level)),
            )
        }
        None => None,
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(level));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| ScanError::config_error(format!("Failed to initialize logging: {}", e)))
}

fn print_summary(report: &ScanReport) {
    let summary = &report.summary;
    println!("{}", "-".repeat(40).cyan());
    println!("{}", "Processing Complete!".green());
    println!(
        "{}",
        format!("Total Archives Processed: {}", summary.archive_count).yellow()
    );
    println!(
        "{}",
        format!("Total Matches Found: {}", summary.match_count).yellow()
    );
    println!(
        "{}",
        format!("Time Taken: {:.2} seconds", summary.elapsed_secs()).yellow()
    );
    println!("{}", "-".repeat(40).cyan());

    for record in report.sorted_records() {
        println!(
            "{} {}",
            record.display_path().display().to_string().blue(),
            format!("[{}]", record.matched_term).green()
        );
    }
    for outcome in report.failed_archives() {
        if let Some(error) = &outcome.error {
            eprintln!("{} {}", "skipped:".red(), error);
        }
    }
}

fn print_presets() {
    print_options("Predefined Search Term Groups", TERM_GROUPS);
    print_options("File Type Options", FILE_CATEGORIES);
}

fn print_options(title: &str, options: &[(&str, &[&str])]) {
    println!("{}", format!("{}:", title).cyan());
    println!("{}", "-".repeat(40).cyan());
    for (name, values) in options {
        println!("{}{}", format!("{:<32}", name).yellow(), values.join(", "));
    }
    println!("{}", "-".repeat(40).cyan());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_size_kb_saturates() {
        let huge = u64::MAX.to_string();
        let cli = Cli::parse_from(["archscout", "--max-size-kb", huge.as_str()]);
        assert_eq!(cli.to_config().max_entry_size, Some(u64::MAX));

        let cli = Cli::parse_from(["archscout", "--max-size-kb", "5"]);
        assert_eq!(cli.to_config().max_entry_size, Some(5120));
    }
}
