//! Spreadsheet access layer.
//!
//! Turns the community release sheet (a multi-tab XLSX export) into an
//! ordered, filtered sequence of tabs and, per tab, a sequence of raw
//! album rows. Tab enumeration works on names and positions only;
//! row data is only materialized when a tab is actually fetched.

mod fetcher;
mod tabs;
mod workbook;

pub use fetcher::{DocumentSource, SheetFetcher};
pub use tabs::{
    enumerate_tabs, extract_year, is_relevant_tab, normalize_tab_name, sort_chronologically,
    TabMetadata,
};
pub use workbook::{AlbumRow, SheetDocument, SheetError, XlsxDocument};
