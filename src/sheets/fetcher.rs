//! Downloads the sheet's XLSX export and opens it as a document.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::workbook::{SheetDocument, XlsxDocument};

/// Anything that can produce a loaded spreadsheet document.
///
/// The sync worker only sees this seam; tests swap in canned documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load_document(&self) -> Result<Arc<dyn SheetDocument>>;
}

/// Fetches the Google Sheets XLSX export over HTTP.
///
/// Any failure here (connectivity, non-success status, malformed workbook)
/// is fatal for the whole sync run; there is nothing to recover per-tab
/// when the document itself cannot be loaded.
pub struct SheetFetcher {
    client: reqwest::Client,
    xlsx_url: String,
}

impl SheetFetcher {
    pub fn new(xlsx_url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, xlsx_url })
    }

    /// Download the export and open it as a workbook document.
    pub async fn fetch_document(&self) -> Result<XlsxDocument> {
        info!("Fetching XLSX export from {}", self.xlsx_url);

        let response = self
            .client
            .get(&self.xlsx_url)
            .send()
            .await
            .context("Failed to reach the spreadsheet source")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Spreadsheet source returned status {}",
                response.status()
            );
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read spreadsheet response body")?;

        let document = XlsxDocument::from_bytes(bytes.to_vec())
            .context("Failed to parse XLSX workbook")?;

        info!(
            "Loaded workbook with {} tabs",
            document.tab_names().len()
        );

        Ok(document)
    }
}

#[async_trait]
impl DocumentSource for SheetFetcher {
    async fn load_document(&self) -> Result<Arc<dyn SheetDocument>> {
        Ok(Arc::new(self.fetch_document().await?))
    }
}
