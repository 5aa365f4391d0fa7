//! Filter predicates over candidate files.
//!
//! A filter is a closed set of variants evaluated through the single
//! [`Filter::matches`] entry point. Multi-stage composition (`AllOf`,
//! `AnyOf`, `Not`) is part of the same enum, so behavior is fixed at
//! construction and never rebound afterwards.

use std::path::{Path, PathBuf};

use regex::Regex;

/// A file under routing consideration: its path relative to the source
/// handle, plus an optionally loaded textual payload for content filters.
#[derive(Debug, Clone)]
pub struct Candidate {
    path: PathBuf,
    payload: Option<String>,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
        }
    }

    /// Attach loaded content, enabling content filters to match.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    fn file_stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches any file.
    Any,
    /// File stem contains the given fragment.
    NameContains(String),
    /// File name matches the given regular expression.
    NameMatches(Regex),
    /// File extension equals the given one (case-insensitive, no dot).
    Extension(String),
    /// Loaded payload contains the given fragment. A candidate without a
    /// payload never matches; content must be loaded before dispatch.
    ContentContains(String),
    Not(Box<Filter>),
    /// Every inner filter must match.
    AllOf(Vec<Filter>),
    /// At least one inner filter must match.
    AnyOf(Vec<Filter>),
}

impl Filter {
    /// Compile a name-pattern filter, surfacing bad patterns at build time.
    pub fn name_matches(pattern: &str) -> Result<Filter, regex::Error> {
        Ok(Filter::NameMatches(Regex::new(pattern)?))
    }

    /// Evaluate the candidate. Pure with respect to its inputs.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            Filter::Any => true,
            Filter::NameContains(fragment) => candidate.file_stem().contains(fragment.as_str()),
            Filter::NameMatches(re) => re.is_match(candidate.file_name()),
            Filter::Extension(ext) => candidate
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
            Filter::ContentContains(fragment) => candidate
                .payload()
                .is_some_and(|p| p.contains(fragment.as_str())),
            Filter::Not(inner) => !inner.matches(candidate),
            Filter::AllOf(inner) => inner.iter().all(|f| f.matches(candidate)),
            Filter::AnyOf(inner) => inner.iter().any(|f| f.matches(candidate)),
        }
    }

    /// Whether evaluating this filter requires the candidate's content.
    pub fn needs_payload(&self) -> bool {
        match self {
            Filter::ContentContains(_) => true,
            Filter::Not(inner) => inner.needs_payload(),
            Filter::AllOf(inner) | Filter::AnyOf(inner) => {
                inner.iter().any(Filter::needs_payload)
            }
            _ => false,
        }
    }

    /// Short human-readable description of the evaluation criteria.
    pub fn describe(&self) -> String {
        match self {
            Filter::Any => "matches any file".to_string(),
            Filter::NameContains(fragment) => {
                format!("file name contains '{fragment}'")
            }
            Filter::NameMatches(re) => format!("file name matches /{}/", re.as_str()),
            Filter::Extension(ext) => format!("file extension is '.{ext}'"),
            Filter::ContentContains(fragment) => {
                format!("file content contains '{fragment}'")
            }
            Filter::Not(inner) => format!("not ({})", inner.describe()),
            Filter::AllOf(inner) => {
                let parts: Vec<String> = inner.iter().map(Filter::describe).collect();
                format!("all of [{}]", parts.join("; "))
            }
            Filter::AnyOf(inner) => {
                let parts: Vec<String> = inner.iter().map(Filter::describe).collect();
                format!("any of [{}]", parts.join("; "))
            }
        }
    }
}
