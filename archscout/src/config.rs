use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{ScanError, ScanResult};
use crate::filters::FileTypeFilter;
use crate::presets::{resolve_categories, resolve_term_groups};
use crate::search::matcher::TermSet;

/// Configuration for a scan run.
///
/// # Configuration Locations
///
/// Files are merged in this order, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/archscout/config.yaml`
/// 2. Local `.archscout.yaml` in the current directory
/// 3. Custom config file given with `--config`
///
/// Command-line values are applied last, through [`ScanConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Literal terms, or regular expressions when is_regex is set
/// terms: ["wickr", "proton"]
///
/// # Predefined term groups appended after the explicit terms
/// presets: ["whatsapp"]
///
/// is_regex: false
/// case_sensitive: false
///
/// # Only scan entries with these extensions
/// file_extensions: ["txt", "db"]
///
/// # Predefined extension categories, merged with file_extensions
/// categories: ["Plist Files"]
///
/// # Stop reading an entry after this many bytes
/// max_entry_size: 5242880
///
/// # File or directory to scan
/// root_path: "/evidence"
///
/// # Archive paths to skip during discovery (glob syntax)
/// ignore_patterns: ["**/old/**"]
///
/// # Concurrent entry reads (default: CPU cores)
/// thread_count: 8
///
/// log_level: "warn"
///
/// # Result file; .json writes JSON, anything else CSV
/// output: "search_results.csv"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Search terms in evaluation order
    #[serde(default)]
    pub terms: Vec<String>,

    /// Names of predefined term groups
    #[serde(default)]
    pub presets: Vec<String>,

    #[serde(default)]
    pub is_regex: bool,

    /// Has no effect on regex terms
    #[serde(default)]
    pub case_sensitive: bool,

    /// Entry extensions to scan. If None, every entry is scanned.
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,

    /// Names of predefined extension categories
    #[serde(default)]
    pub categories: Vec<String>,

    /// Per-entry read bound in bytes
    #[serde(default)]
    pub max_entry_size: Option<u64>,

    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Bound on concurrent blocking entry reads
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

pub(crate) fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Where results go when no output path is configured
pub const DEFAULT_OUTPUT: &str = "search_results.csv";

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            presets: Vec::new(),
            is_regex: false,
            case_sensitive: false,
            file_extensions: None,
            categories: Vec::new(),
            max_entry_size: None,
            root_path: default_root_path(),
            ignore_patterns: Vec::new(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            output: None,
        }
    }
}

impl ScanConfig {
    /// Loads configuration from the default locations
    pub fn load() -> ScanResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ScanError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("archscout/config.yaml")),
            Some(PathBuf::from(".archscout.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ScanError::config_error(e.to_string()))
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli_config: ScanConfig) -> Self {
        // CLI values take precedence over config file values
        if !cli_config.terms.is_empty() {
            self.terms = cli_config.terms;
        }
        if !cli_config.presets.is_empty() {
            self.presets = cli_config.presets;
        }
        if cli_config.is_regex {
            self.is_regex = true;
        }
        if cli_config.case_sensitive {
            self.case_sensitive = true;
        }
        if cli_config.file_extensions.is_some() {
            self.file_extensions = cli_config.file_extensions;
        }
        if !cli_config.categories.is_empty() {
            self.categories = cli_config.categories;
        }
        if cli_config.max_entry_size.is_some() {
            self.max_entry_size = cli_config.max_entry_size;
        }
        if cli_config.root_path != default_root_path() {
            self.root_path = cli_config.root_path;
        }
        if !cli_config.ignore_patterns.is_empty() {
            self.ignore_patterns = cli_config.ignore_patterns;
        }
        if cli_config.thread_count != default_thread_count() {
            self.thread_count = cli_config.thread_count;
        }
        if cli_config.log_level != default_log_level() {
            self.log_level = cli_config.log_level;
        }
        if cli_config.output.is_some() {
            self.output = cli_config.output;
        }
        self
    }

    /// Explicit terms followed by the terms of every selected preset group
    pub fn term_set(&self) -> ScanResult<TermSet> {
        let mut terms: Vec<String> = self
            .terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        terms.extend(resolve_term_groups(&self.presets)?);

        Ok(TermSet {
            terms,
            case_sensitive: self.case_sensitive,
            is_regex: self.is_regex,
        })
    }

    /// Explicit extensions plus those of every selected category, or None when both are empty
    pub fn file_type_filter(&self) -> ScanResult<Option<FileTypeFilter>> {
        let mut extensions = self.file_extensions.clone().unwrap_or_default();
        extensions.extend(resolve_categories(&self.categories)?);
        Ok(FileTypeFilter::from_extensions(extensions))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            terms: ["wickr", "proton"]
            presets: ["torbrowser"]
            is_regex: true
            case_sensitive: true
            file_extensions: ["txt", "db"]
            categories: ["Email Data"]
            max_entry_size: 5242880
            root_path: "evidence"
            ignore_patterns: ["**/old/**"]
            thread_count: 4
            log_level: "debug"
            output: "hits.json"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ScanConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.terms, vec!["wickr", "proton"]);
        assert_eq!(config.presets, vec!["torbrowser"]);
        assert!(config.is_regex);
        assert!(config.case_sensitive);
        assert_eq!(
            config.file_extensions,
            Some(vec!["txt".to_string(), "db".to_string()])
        );
        assert_eq!(config.categories, vec!["Email Data"]);
        assert_eq!(config.max_entry_size, Some(5_242_880));
        assert_eq!(config.root_path, PathBuf::from("evidence"));
        assert_eq!(config.ignore_patterns, vec!["**/old/**".to_string()]);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.output_path(), PathBuf::from("hits.json"));
    }

    #[test]
    fn test_merge_with_cli() {
        let config_file = ScanConfig {
            terms: vec!["wickr".to_string()],
            file_extensions: Some(vec!["db".to_string()]),
            root_path: PathBuf::from("evidence"),
            max_entry_size: Some(1024),
            log_level: "info".to_string(),
            ..Default::default()
        };

        let cli_config = ScanConfig {
            terms: vec!["proton".to_string()],
            case_sensitive: true,
            output: Some(PathBuf::from("out.csv")),
            ..Default::default()
        };

        let merged = config_file.merge_with_cli(cli_config);
        assert_eq!(merged.terms, vec!["proton"]); // CLI value
        assert!(merged.case_sensitive); // CLI value
        assert_eq!(merged.file_extensions, Some(vec!["db".to_string()])); // File value (CLI None)
        assert_eq!(merged.root_path, PathBuf::from("evidence")); // File value (CLI default)
        assert_eq!(merged.max_entry_size, Some(1024)); // File value
        assert_eq!(merged.log_level, "info"); // File value (CLI default)
        assert_eq!(merged.output, Some(PathBuf::from("out.csv"))); // CLI value
    }

    #[test]
    fn test_default_values() {
        let config_content = r#"
            terms: ["test"]
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ScanConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.terms, vec!["test"]);
        assert_eq!(config.root_path, PathBuf::from("."));
        assert_eq!(config.file_extensions, None);
        assert_eq!(config.max_entry_size, None);
        assert!(!config.is_regex);
        assert_eq!(config.thread_count, default_thread_count());
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.output_path(), PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn test_invalid_config() {
        let config_content = r#"
            terms: 123
            thread_count: "invalid"
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let result = ScanConfig::load_from(Some(&config_path));
        assert!(matches!(result, Err(ScanError::ConfigError(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ScanConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_term_set_with_presets() {
        let config = ScanConfig {
            terms: vec!["custom".to_string(), "  ".to_string()],
            presets: vec!["ProtonMail".to_string()],
            case_sensitive: true,
            ..Default::default()
        };
        let set = config.term_set().unwrap();
        assert_eq!(set.terms, vec!["custom", "proton", "protonmail"]);
        assert!(set.case_sensitive);
        assert!(!set.is_regex);

        let bad = ScanConfig {
            presets: vec!["nope".to_string()],
            ..Default::default()
        };
        assert!(bad.term_set().is_err());
    }

    #[test]
    fn test_file_type_filter_resolution() {
        let none = ScanConfig::default();
        assert!(none.file_type_filter().unwrap().is_none());

        let config = ScanConfig {
            file_extensions: Some(vec!["txt".to_string()]),
            categories: vec!["plist files".to_string()],
            ..Default::default()
        };
        let filter = config.file_type_filter().unwrap().unwrap();
        assert!(filter.allows("notes.txt"));
        assert!(filter.allows("Info.plist"));
        assert!(!filter.allows("photo.jpg"));
    }
}
