//! Tab metadata: normalization, relevance filtering and chronological ordering.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::workbook::SheetDocument;

/// Tab name suffixes that mark a release tab in the modern naming
/// convention ("2025 Prog-metal"). Matched case-sensitively.
const RELEASE_SUFFIXES: [&str; 2] = [" Prog-metal", " Prog-rock"];

lazy_static! {
    static ref SUFFIXED_YEAR_RE: Regex = Regex::new(r"^(\d{4}) (?:Prog-metal|Prog-rock)$").unwrap();
    static ref BARE_YEAR_RE: Regex = Regex::new(r"^\d{4}$").unwrap();
    static ref LEADING_YEAR_RE: Regex = Regex::new(r"^(\d{4})").unwrap();
}

/// Descriptor of one workbook tab, derived from its name and position.
///
/// Ephemeral: lives only for the duration of one sync run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabMetadata {
    /// Raw tab name as read from the workbook.
    pub name: String,
    /// Whitespace-trimmed, ASCII-validated name.
    pub normalized_name: String,
    /// Year extracted from the name, used for sort order only.
    pub year: Option<i32>,
    /// Original position in the workbook, 0-indexed.
    pub order: usize,
    /// Whether this tab passes the release-tab filter.
    pub is_included: bool,
}

impl std::fmt::Display for TabMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.year {
            Some(year) => write!(f, "'{}' ({}, order={})", self.name, year, self.order),
            None => write!(f, "'{}' (order={})", self.name, self.order),
        }
    }
}

/// Normalize a raw tab name and report whether it is valid.
///
/// Trims surrounding whitespace. A name is invalid when it is empty after
/// trimming, contains non-ASCII characters, contains any whitespace other
/// than a plain space, or contains characters outside `[A-Za-z0-9 _-]`.
pub fn normalize_tab_name(raw: &str) -> (String, bool) {
    let normalized = raw.trim();

    if normalized.is_empty() {
        return (String::new(), false);
    }
    if !normalized.is_ascii() {
        warn!("Tab name contains non-ASCII characters: {:?}", raw);
        return (String::new(), false);
    }
    if normalized.chars().any(|c| c.is_whitespace() && c != ' ') {
        warn!("Tab name contains control whitespace: {:?}", raw);
        return (String::new(), false);
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        warn!("Tab name contains invalid characters: {:?}", raw);
        return (String::new(), false);
    }

    (normalized.to_string(), true)
}

/// Whether a normalized tab name identifies a release tab.
///
/// Matches the modern convention (`"<year> Prog-metal"` / `"<year> Prog-rock"`,
/// case-sensitive) and the legacy convention (a bare 4-digit year). Everything
/// else, including differently-cased or extra-suffixed names, is excluded.
pub fn is_relevant_tab(name: &str) -> bool {
    if RELEASE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return true;
    }
    BARE_YEAR_RE.is_match(name)
}

/// Extract a year from a tab name, for sort ordering.
///
/// Three tiers: exact `"YYYY <suffix>"`, exact `"YYYY"`, then any four
/// leading digits. Returns `None` when no digits can be extracted.
pub fn extract_year(name: &str) -> Option<i32> {
    if let Some(caps) = SUFFIXED_YEAR_RE.captures(name) {
        return caps[1].parse().ok();
    }
    if BARE_YEAR_RE.is_match(name) {
        return name.parse().ok();
    }
    LEADING_YEAR_RE
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Enumerate all tabs of a document with metadata, in document order.
///
/// Works on tab names and positions only; no row data is read. Tabs whose
/// names fail validation are marked excluded regardless of the relevance
/// rules.
pub fn enumerate_tabs(document: &dyn SheetDocument) -> Vec<TabMetadata> {
    let mut tabs = Vec::new();

    for (order, name) in document.tab_names().into_iter().enumerate() {
        let (normalized, is_valid) = normalize_tab_name(&name);

        let (year, is_included) = if is_valid {
            (extract_year(&normalized), is_relevant_tab(&normalized))
        } else {
            warn!("Skipping invalid tab name: {:?}", name);
            (None, false)
        };

        let tab = TabMetadata {
            name,
            normalized_name: normalized,
            year,
            order,
            is_included,
        };
        debug!("Enumerated tab {}", tab);
        tabs.push(tab);
    }

    tabs
}

/// Sort tabs chronologically: tabs with a known year ascending (oldest
/// first, stable on ties), then tabs without a year in original order.
pub fn sort_chronologically(tabs: Vec<TabMetadata>) -> Vec<TabMetadata> {
    let (mut with_year, without_year): (Vec<_>, Vec<_>) =
        tabs.into_iter().partition(|t| t.year.is_some());

    with_year.sort_by_key(|t| t.year);

    for tab in &without_year {
        warn!(
            "Tab {} has no extractable year, will be processed after dated tabs",
            tab
        );
    }

    with_year.extend(without_year);
    with_year
}
