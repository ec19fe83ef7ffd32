//! Workbook boundary: the document-like object the sync core reads from,
//! and its calamine-backed XLSX implementation.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use calamine::{Data, Range, Reader, Xlsx};
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::tabs::{extract_year, normalize_tab_name};

/// Columns that must be present in a release tab.
const REQUIRED_COLUMNS: [&str; 3] = ["Artist", "Album", "Spotify"];

/// How many leading rows to scan for the header row.
const HEADER_SCAN_ROWS: u32 = 20;

lazy_static! {
    static ref HYPERLINK_FORMULA_RE: Regex = Regex::new(r#"HYPERLINK\("([^"]+)""#).unwrap();
}

/// Errors raised while reading the workbook.
///
/// `Malformed` is fatal for the whole document; the tab-scoped variants are
/// recoverable and only fail the tab they name.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("malformed workbook: {0}")]
    Malformed(String),

    #[error("tab '{tab}' not found in workbook")]
    TabNotFound { tab: String },

    #[error("tab '{tab}': could not find header row with 'Artist' column")]
    HeaderRowNotFound { tab: String },

    #[error("tab '{tab}': missing expected column '{column}'")]
    MissingColumn { tab: String, column: String },

    #[error("tab '{tab}': {message}")]
    TabRead { tab: String, message: String },
}

/// One data row of a release tab, with normalized field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRow {
    pub artist: String,
    pub album: String,
    pub release_date: Option<NaiveDate>,
    pub genre: String,
    pub vocal_style: String,
    pub country: String,
    pub spotify_url: String,
    /// Year extracted from the tab name, used when the date cell has no year.
    pub tab_year: Option<i32>,
}

/// A loaded spreadsheet document.
///
/// `tab_names` must be cheap and must not materialize row data; only
/// `fetch_rows` reads cells.
pub trait SheetDocument: Send + Sync {
    /// Tab names in original document order.
    fn tab_names(&self) -> Vec<String>;

    /// Read one tab's data rows, excluding the header.
    fn fetch_rows(&self, tab_name: &str) -> Result<Vec<AlbumRow>, SheetError>;
}

/// XLSX-backed document, as exported by Google Sheets.
///
/// The XLSX export preserves hyperlink formulas, which is where the Spotify
/// URLs live when the cell text is just the album name.
pub struct XlsxDocument {
    workbook: Mutex<Xlsx<Cursor<Vec<u8>>>>,
    tab_names: Vec<String>,
}

impl XlsxDocument {
    /// Open a workbook from raw XLSX bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SheetError> {
        let workbook =
            Xlsx::new(Cursor::new(bytes)).map_err(|e| SheetError::Malformed(e.to_string()))?;
        let tab_names = workbook.sheet_names().to_vec();
        Ok(Self {
            workbook: Mutex::new(workbook),
            tab_names,
        })
    }
}

impl SheetDocument for XlsxDocument {
    fn tab_names(&self) -> Vec<String> {
        self.tab_names.clone()
    }

    fn fetch_rows(&self, tab_name: &str) -> Result<Vec<AlbumRow>, SheetError> {
        if !self.tab_names.iter().any(|n| n == tab_name) {
            return Err(SheetError::TabNotFound {
                tab: tab_name.to_string(),
            });
        }

        let mut workbook = self.workbook.lock().unwrap();
        let range = workbook
            .worksheet_range(tab_name)
            .map_err(|e| SheetError::TabRead {
                tab: tab_name.to_string(),
                message: e.to_string(),
            })?;
        // Formulas are read separately; hyperlink cells carry their URL here.
        let formulas = workbook.worksheet_formula(tab_name).ok();
        drop(workbook);

        let (normalized, _) = normalize_tab_name(tab_name);
        let tab_year = extract_year(&normalized);

        parse_tab(tab_name, &range, formulas.as_ref(), tab_year)
    }
}

fn parse_tab(
    tab_name: &str,
    range: &Range<Data>,
    formulas: Option<&Range<String>>,
    tab_year: Option<i32>,
) -> Result<Vec<AlbumRow>, SheetError> {
    let start = range.start().unwrap_or((0, 0));
    let rows: Vec<&[Data]> = range.rows().collect();

    // Header row: first row whose first cell is exactly "Artist".
    let header_idx = rows
        .iter()
        .take(HEADER_SCAN_ROWS as usize)
        .position(|row| matches!(row.first(), Some(Data::String(s)) if s == "Artist"))
        .ok_or_else(|| SheetError::HeaderRowNotFound {
            tab: tab_name.to_string(),
        })?;

    // Column index mapping, stopping at the first empty header cell.
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, cell) in rows[header_idx].iter().enumerate() {
        match cell {
            Data::String(s) if !s.trim().is_empty() => {
                columns.insert(s.trim().to_string(), idx);
            }
            Data::Empty => break,
            _ => {}
        }
    }

    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(required) {
            return Err(SheetError::MissingColumn {
                tab: tab_name.to_string(),
                column: required.to_string(),
            });
        }
    }

    let artist_col = columns["Artist"];
    let album_col = columns["Album"];
    let spotify_col = columns["Spotify"];
    let date_col = columns.get("Release Date").copied();
    let genre_col = columns.get("Genre / Subgenres").copied();
    let vocal_col = columns.get("Vocal Style").copied();
    let country_col = columns.get("Country / State").copied();

    let mut albums = Vec::new();

    for (rel_idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        let artist = cell_text(row, artist_col);
        // The sheet's data block ends at the first empty Artist cell.
        if artist.is_empty() {
            break;
        }

        let album = cell_text(row, album_col);
        if album.is_empty() {
            continue;
        }

        let abs_row = start.0 + rel_idx as u32;
        let spotify_url = match extract_url(row, spotify_col, formulas, abs_row, start.1) {
            Some(url) => url,
            None => {
                debug!(
                    "Tab '{}' row {}: no Spotify URL, skipping",
                    tab_name, abs_row
                );
                continue;
            }
        };

        let release_date =
            date_col.and_then(|col| row.get(col).and_then(|c| parse_date_cell(c, tab_year)));

        albums.push(AlbumRow {
            artist,
            album,
            release_date,
            genre: genre_col.map(|c| cell_text(row, c)).unwrap_or_default(),
            vocal_style: vocal_col.map(|c| cell_text(row, c)).unwrap_or_default(),
            country: country_col.map(|c| cell_text(row, c)).unwrap_or_default(),
            spotify_url,
            tab_year,
        });
    }

    debug!(
        "Tab '{}': parsed {} rows with Spotify URLs",
        tab_name,
        albums.len()
    );

    Ok(albums)
}

fn cell_text(row: &[Data], col: usize) -> String {
    match row.get(col) {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(f)) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Some(Data::Int(i)) => format!("{}", i),
        Some(Data::Bool(b)) => format!("{}", b),
        _ => String::new(),
    }
}

/// Pull a URL out of a cell: either the cell text itself is a link, or the
/// cell carries a `=HYPERLINK("url", "text")` formula.
fn extract_url(
    row: &[Data],
    col: usize,
    formulas: Option<&Range<String>>,
    abs_row: u32,
    start_col: u32,
) -> Option<String> {
    if let Some(Data::String(s)) = row.get(col) {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            return Some(s.to_string());
        }
        if let Some(caps) = HYPERLINK_FORMULA_RE.captures(s) {
            return Some(caps[1].to_string());
        }
    }

    let abs_col = start_col + col as u32;
    if let Some(formula) = formulas.and_then(|f| f.get_value((abs_row, abs_col))) {
        if let Some(caps) = HYPERLINK_FORMULA_RE.captures(formula) {
            return Some(caps[1].to_string());
        }
    }

    None
}

/// Parse a release-date cell.
///
/// The sheet provides either real date cells (read as Excel datetimes) or
/// strings like "January 15" / "January"; the tab year fills in the missing
/// year and overrides a mismatched one.
fn parse_date_cell(cell: &Data, tab_year: Option<i32>) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => {
            let date = dt.as_datetime()?.date();
            match tab_year {
                Some(year) if date.year() != year => date.with_year(year),
                _ => Some(date),
            }
        }
        Data::String(s) => parse_date_text(s, tab_year),
        _ => None,
    }
}

fn parse_date_text(text: &str, tab_year: Option<i32>) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let year = tab_year.unwrap_or_else(|| chrono::Utc::now().year());

    // "January 15" then "January"
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}, {}", text, year), "%B %d, %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{} 1, {}", text, year), "%B %d, %Y") {
        return Some(date);
    }

    warn!("Could not parse release date: {:?}", text);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_text_month_and_day() {
        assert_eq!(
            parse_date_text("January 15", Some(2024)),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            parse_date_text("March 3", Some(2017)),
            NaiveDate::from_ymd_opt(2017, 3, 3)
        );
    }

    #[test]
    fn test_parse_date_text_month_only() {
        assert_eq!(
            parse_date_text("February", Some(2024)),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn test_parse_date_text_garbage() {
        assert_eq!(parse_date_text("TBA", Some(2024)), None);
        assert_eq!(parse_date_text("", Some(2024)), None);
    }

    #[test]
    fn test_extract_url_plain_and_formula_text() {
        let row = vec![Data::String(
            "https://open.spotify.com/album/4iVu4nUXnfDGZBKBBC1NRh".to_string(),
        )];
        assert_eq!(
            extract_url(&row, 0, None, 0, 0).as_deref(),
            Some("https://open.spotify.com/album/4iVu4nUXnfDGZBKBBC1NRh")
        );

        let row = vec![Data::String(
            r#"=HYPERLINK("https://open.spotify.com/album/4iVu4nUXnfDGZBKBBC1NRh", "Listen")"#
                .to_string(),
        )];
        assert_eq!(
            extract_url(&row, 0, None, 0, 0).as_deref(),
            Some("https://open.spotify.com/album/4iVu4nUXnfDGZBKBBC1NRh")
        );
    }

    #[test]
    fn test_extract_url_rejects_plain_text() {
        let row = vec![Data::String("Listen here".to_string())];
        assert_eq!(extract_url(&row, 0, None, 0, 0), None);
    }
}
