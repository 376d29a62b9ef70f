//! Built-in search term groups and entry file-type categories.
//!
//! Names are matched case-insensitively, so `--preset WhatsApp` and
//! `--category "sqlite databases"` both resolve.
use crate::errors::{ScanError, ScanResult};

/// A named list of values
pub type Preset = (&'static str, &'static [&'static str]);

/// Predefined search term groups
pub static TERM_GROUPS: &[Preset] = &[
    (
        "snapchat",
        &["cache_controller.db", "SCContent", "arroyo.db", "scdb-27.sqlite3"],
    ),
    ("protonmail", &["proton", "protonmail"]),
    (
        "torbrowser",
        &["tor.browser", "torbrowser", "tor-browser", ".onion"],
    ),
    (
        "wickr",
        &["wickr", "wickr pro", "wickrpro", "wickr me", "wickrme", "mywickr"],
    ),
    (
        "whatsapp",
        &[
            "whatsapp",
            "messages.db",
            "com.whatsapp.conversation",
            "msgstore.db.crypt12",
            "msgstore.db.crypt14",
        ],
    ),
    ("sqlite databases", &[".sqlite", ".db"]),
    ("video", &[".mp4", ".mov", ".avi", ".wmv", ".flv", ".mkv"]),
    ("pictures", &[".jpg", ".jpeg", ".gif", ".bmp", ".tiff"]),
];

/// Entry extension categories for the file-type filter
pub static FILE_CATEGORIES: &[Preset] = &[
    ("SQLite Databases", &[".sqlite", ".db"]),
    ("Plist Files", &[".plist"]),
    ("Image and Media Files", &[".jpg", ".heic", ".mp4", ".mov"]),
    ("Backup Files", &[".bak", ".backup"]),
    ("Application Cache and Log Files", &[".log", ".cache"]),
    ("Browser Data", &[".db", ".plist", ".txt"]),
    ("Keychain Files", &[".db"]),
    ("Text and Document Files", &[".txt", ".pdf", ".docx"]),
    ("Email Data", &[".eml"]),
    ("Health and Fitness Data", &[".db", ".json"]),
];

fn lookup(table: &'static [Preset], name: &str) -> Option<&'static [&'static str]> {
    let name = name.trim();
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, values)| *values)
}

/// Terms of one predefined group
pub fn term_group(name: &str) -> ScanResult<&'static [&'static str]> {
    lookup(TERM_GROUPS, name)
        .ok_or_else(|| ScanError::config_error(format!("Unknown term group: {}", name.trim())))
}

/// Extensions of one file-type category
pub fn file_category(name: &str) -> ScanResult<&'static [&'static str]> {
    lookup(FILE_CATEGORIES, name)
        .ok_or_else(|| ScanError::config_error(format!("Unknown file category: {}", name.trim())))
}

/// Concatenates the terms of several groups, in the order given
pub fn resolve_term_groups<S: AsRef<str>>(names: &[S]) -> ScanResult<Vec<String>> {
    let mut terms = Vec::new();
    for name in names {
        terms.extend(term_group(name.as_ref())?.iter().map(|t| t.to_string()));
    }
    Ok(terms)
}

/// Concatenates the extensions of several categories, in the order given
pub fn resolve_categories<S: AsRef<str>>(names: &[S]) -> ScanResult<Vec<String>> {
    let mut extensions = Vec::new();
    for name in names {
        extensions.extend(file_category(name.as_ref())?.iter().map(|e| e.to_string()));
    }
    Ok(extensions)
}
