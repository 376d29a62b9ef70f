use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::errors::{ScanError, ScanResult};
use crate::results::MatchRecord;

static REGEX_CACHE: Lazy<DashMap<String, Arc<Regex>>> = Lazy::new(DashMap::new);

/// The configured search terms and how to interpret them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSet {
    /// Terms in evaluation order
    pub terms: Vec<String>,
    /// Compare literals without case folding. Has no effect in regex mode.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Interpret every term as a regular expression
    #[serde(default)]
    pub is_regex: bool,
}

impl TermSet {
    pub fn literal(terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            case_sensitive: false,
            is_regex: false,
        }
    }

    pub fn regex(terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            is_regex: true,
            ..Self::literal(terms)
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone)]
enum CompiledTerm {
    /// `needle` is already case-folded when matching is case-insensitive
    Literal { term: String, needle: String },
    Regex { term: String, regex: Arc<Regex> },
}

impl CompiledTerm {
    fn term(&self) -> &str {
        match self {
            CompiledTerm::Literal { term, .. } | CompiledTerm::Regex { term, .. } => term,
        }
    }
}

/// Decides whether one entry matches a [`TermSet`].
///
/// Terms are tried in order and the first hit wins. Literal terms are
/// compared as substrings against both the decoded content and the entry
/// name. Regex terms only see the content and always match
/// case-insensitively, whatever `case_sensitive` says.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    terms: Vec<CompiledTerm>,
    case_sensitive: bool,
    is_regex: bool,
}

impl TermMatcher {
    /// Builds a matcher, dropping regex terms that fail to compile with a warning
    pub fn new(set: &TermSet) -> Self {
        let terms = set
            .terms
            .iter()
            .filter_map(|term| match Self::compile(term, set) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(term = %term, error = %e, "skipping search term");
                    None
                }
            })
            .collect();
        Self {
            terms,
            case_sensitive: set.case_sensitive,
            is_regex: set.is_regex,
        }
    }

    /// Builds a matcher, failing on the first regex term that does not compile
    pub fn try_new(set: &TermSet) -> ScanResult<Self> {
        let terms = set
            .terms
            .iter()
            .map(|term| Self::compile(term, set))
            .collect::<ScanResult<Vec<_>>>()?;
        Ok(Self {
            terms,
            case_sensitive: set.case_sensitive,
            is_regex: set.is_regex,
        })
    }

    fn compile(term: &str, set: &TermSet) -> ScanResult<CompiledTerm> {
        if set.is_regex {
            Ok(CompiledTerm::Regex {
                term: term.to_string(),
                regex: Self::cached_regex(term)?,
            })
        } else {
            let needle = if set.case_sensitive {
                term.to_string()
            } else {
                term.to_lowercase()
            };
            Ok(CompiledTerm::Literal {
                term: term.to_string(),
                needle,
            })
        }
    }

    fn cached_regex(pattern: &str) -> ScanResult<Arc<Regex>> {
        if let Some(regex) = REGEX_CACHE.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ScanError::invalid_pattern(format!("{}: {}", pattern, e)))?;
        let regex = Arc::new(regex);
        REGEX_CACHE.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    /// Number of usable terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the first term that matches `content` or, for literals, `entry_name`
    pub fn first_match(&self, content: &str, entry_name: &str) -> Option<&str> {
        if self.is_regex {
            return self
                .terms
                .iter()
                .find(|term| match term {
                    CompiledTerm::Regex { regex, .. } => regex.is_match(content),
                    CompiledTerm::Literal { .. } => false,
                })
                .map(CompiledTerm::term);
        }

        let (content, name): (Cow<'_, str>, Cow<'_, str>) = if self.case_sensitive {
            (Cow::Borrowed(content), Cow::Borrowed(entry_name))
        } else {
            (
                Cow::Owned(content.to_lowercase()),
                Cow::Owned(entry_name.to_lowercase()),
            )
        };
        self.terms
            .iter()
            .find(|term| match term {
                CompiledTerm::Literal { needle, .. } => {
                    content.contains(needle.as_str()) || name.contains(needle.as_str())
                }
                CompiledTerm::Regex { .. } => false,
            })
            .map(CompiledTerm::term)
    }

    /// Matches the leading bytes of one entry and builds its record on a hit.
    ///
    /// Bytes are decoded lossily, so binary content never fails to decode.
    pub fn match_entry(
        &self,
        bytes: &[u8],
        entry_name: &str,
        archive_path: &Path,
    ) -> Option<MatchRecord> {
        let content = String::from_utf8_lossy(bytes);
        let term = self.first_match(&content, entry_name)?;
        trace!(
            archive = %archive_path.display(),
            entry = %entry_name,
            term = %term,
            "entry matched"
        );
        Some(MatchRecord::new(entry_name, archive_path, term))
    }
}
