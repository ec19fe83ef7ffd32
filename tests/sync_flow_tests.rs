//! End-to-end tests for the sync pipeline, from trigger to history record,
//! against canned spreadsheet documents and a canned enrichment service.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use progmetal_catalog_server::enrichment::{AlbumMetadata, EnrichmentClient, EnrichmentError};
use progmetal_catalog_server::sheets::{AlbumRow, DocumentSource, SheetDocument, SheetError};
use progmetal_catalog_server::sync::{
    AcquireOutcome, SyncOperation, SyncRecord, SyncStatus, TriggerOutcome,
};
use progmetal_catalog_server::{
    CatalogStore, SqliteCatalogStore, SqliteSyncStore, SyncManager, SyncSettings, SyncStore,
};

/// A 22-character alphanumeric album ID, unique per n.
fn ext_id(n: u32) -> String {
    format!("{:022}", n)
}

fn row(album: &str, id: &str) -> AlbumRow {
    AlbumRow {
        artist: "Wilderun".to_string(),
        album: album.to_string(),
        release_date: None,
        genre: "Progressive Metal".to_string(),
        vocal_style: "Clean".to_string(),
        country: "USA".to_string(),
        spotify_url: format!("https://open.spotify.com/album/{}", id),
        tab_year: None,
    }
}

#[derive(Default)]
struct FakeSheetDocument {
    tabs: Vec<String>,
    rows: HashMap<String, Vec<AlbumRow>>,
    failing_tabs: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl FakeSheetDocument {
    fn new(tabs: &[(&str, Vec<AlbumRow>)]) -> Self {
        Self {
            tabs: tabs.iter().map(|(name, _)| name.to_string()).collect(),
            rows: tabs
                .iter()
                .map(|(name, rows)| (name.to_string(), rows.clone()))
                .collect(),
            failing_tabs: HashSet::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn with_failing_tab(mut self, tab: &str) -> Self {
        self.failing_tabs.insert(tab.to_string());
        self
    }

    fn fetched_tabs(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl SheetDocument for FakeSheetDocument {
    fn tab_names(&self) -> Vec<String> {
        self.tabs.clone()
    }

    fn fetch_rows(&self, tab_name: &str) -> Result<Vec<AlbumRow>, SheetError> {
        self.fetched.lock().unwrap().push(tab_name.to_string());
        if self.failing_tabs.contains(tab_name) {
            return Err(SheetError::MissingColumn {
                tab: tab_name.to_string(),
                column: "Spotify".to_string(),
            });
        }
        Ok(self.rows.get(tab_name).cloned().unwrap_or_default())
    }
}

struct FakeDocumentSource {
    document: Option<Arc<FakeSheetDocument>>,
}

#[async_trait]
impl DocumentSource for FakeDocumentSource {
    async fn load_document(&self) -> anyhow::Result<Arc<dyn SheetDocument>> {
        match &self.document {
            Some(doc) => Ok(doc.clone() as Arc<dyn SheetDocument>),
            None => anyhow::bail!("connection refused"),
        }
    }
}

#[derive(Default)]
struct FakeEnrichmentClient {
    fail_ids: HashSet<String>,
}

#[async_trait]
impl EnrichmentClient for FakeEnrichmentClient {
    async fn album_metadata(&self, album_id: &str) -> Result<AlbumMetadata, EnrichmentError> {
        if self.fail_ids.contains(album_id) {
            return Err(EnrichmentError::NotFound);
        }
        Ok(AlbumMetadata {
            album_id: album_id.to_string(),
            name: format!("Album {}", album_id),
            artist_name: "Wilderun".to_string(),
            artist_id: "artist-1".to_string(),
            release_date: None,
            cover_art_url: None,
            spotify_url: format!("https://open.spotify.com/album/{}", album_id),
            total_tracks: 8,
            label: None,
            popularity: Some(30),
            genres: vec!["progressive metal".to_string()],
        })
    }
}

struct Harness {
    manager: Arc<SyncManager>,
    sync_store: Arc<SqliteSyncStore>,
    catalog: Arc<SqliteCatalogStore>,
    document: Option<Arc<FakeSheetDocument>>,
}

fn harness(document: Option<FakeSheetDocument>, fail_ids: HashSet<String>) -> Harness {
    harness_with_settings(document, fail_ids, SyncSettings::default())
}

fn harness_with_settings(
    document: Option<FakeSheetDocument>,
    fail_ids: HashSet<String>,
    settings: SyncSettings,
) -> Harness {
    let sync_store = Arc::new(SqliteSyncStore::in_memory().unwrap());
    let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
    let document = document.map(Arc::new);

    let manager = Arc::new(SyncManager::new(
        sync_store.clone(),
        catalog.clone(),
        Arc::new(FakeDocumentSource {
            document: document.clone(),
        }),
        Arc::new(FakeEnrichmentClient { fail_ids }),
        settings,
        None,
    ));

    Harness {
        manager,
        sync_store,
        catalog,
        document,
    }
}

/// Acquire an operation and run it synchronously to its terminal state.
async fn run_to_completion(h: &Harness) -> (SyncOperation, SyncRecord) {
    let op = match h.sync_store.try_acquire().unwrap() {
        AcquireOutcome::Acquired(op) => op,
        AcquireOutcome::AlreadyRunning => panic!("expected acquisition"),
    };
    h.manager.run_sync(&op.id).await;

    let op = h.sync_store.get_operation(&op.id).unwrap().unwrap();
    let mut records = h.sync_store.list_records(1).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one history record");
    (op, records.remove(0))
}

#[tokio::test]
async fn test_full_run_filters_sorts_and_creates() {
    let doc = FakeSheetDocument::new(&[
        (
            "2024 Prog-metal",
            vec![
                row("A4", &ext_id(4)),
                row("A5", &ext_id(5)),
                row("A6", &ext_id(6)),
            ],
        ),
        (
            "2023 Prog-metal",
            vec![
                row("A1", &ext_id(1)),
                row("A2", &ext_id(2)),
                row("A3", &ext_id(3)),
            ],
        ),
        ("Statistics", vec![row("X", &ext_id(99))]),
    ]);
    let h = harness(Some(doc), HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Completed);
    assert!(op.error_message.is_none());
    assert!(op.completed_at.is_some());

    assert!(record.success);
    assert_eq!(record.albums_created, 6);
    assert_eq!(record.albums_updated, 0);
    assert_eq!(record.albums_failed, 0);
    assert_eq!(record.total_albums_in_catalog, 6);
    assert_eq!(h.catalog.album_count().unwrap(), 6);

    // irrelevant tab never read; relevant tabs in chronological order
    assert_eq!(
        h.document.as_ref().unwrap().fetched_tabs(),
        vec!["2023 Prog-metal", "2024 Prog-metal"]
    );
}

#[tokio::test]
async fn test_duplicate_id_across_tabs_deduplicates() {
    let doc = FakeSheetDocument::new(&[
        (
            "2023 Prog-metal",
            vec![
                row("A1", &ext_id(1)),
                row("A2", &ext_id(2)),
                row("A3", &ext_id(3)),
            ],
        ),
        (
            "2024 Prog-metal",
            vec![
                // same external ID as A1; identical content, so a skip
                row("A1", &ext_id(1)),
                row("A4", &ext_id(4)),
                row("A5", &ext_id(5)),
            ],
        ),
    ]);
    let h = harness(Some(doc), HashSet::new());

    let (_, record) = run_to_completion(&h).await;

    assert!(record.success);
    assert_eq!(record.albums_created, 5);
    assert_eq!(record.albums_skipped, 1);
    assert_eq!(h.catalog.album_count().unwrap(), 5);
}

#[tokio::test]
async fn test_failed_tab_is_contained() {
    let doc = FakeSheetDocument::new(&[
        ("2023 Prog-metal", vec![row("A1", &ext_id(1))]),
        ("2024 Prog-metal", vec![]),
    ])
    .with_failing_tab("2024 Prog-metal");
    let h = harness(Some(doc), HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    // tab failure does not fail the run
    assert_eq!(op.status, SyncStatus::Completed);
    assert!(!record.success);
    assert_eq!(record.albums_created, 1);

    let summary = record.error_message.unwrap();
    assert!(summary.contains("2024 Prog-metal"), "summary: {}", summary);
    assert!(summary.contains("1 tab(s) failed"), "summary: {}", summary);
}

#[tokio::test]
async fn test_unreachable_source_fails_run() {
    let h = harness(None, HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Failed);
    assert!(op
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection refused"));

    assert!(!record.success);
    assert_eq!(record.albums_created, 0);
    assert_eq!(h.catalog.album_count().unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_triggers_accept_exactly_one() {
    let doc = FakeSheetDocument::new(&[("2023 Prog-metal", vec![row("A1", &ext_id(1))])]);
    let h = harness(Some(doc), HashSet::new());

    // no await between the two calls, so the spawned run cannot finish first
    let first = h.manager.trigger().unwrap();
    let second = h.manager.trigger().unwrap();

    assert!(matches!(first, TriggerOutcome::Accepted { .. }));
    assert!(matches!(second, TriggerOutcome::AlreadyRunning));
}

#[tokio::test]
async fn test_bare_year_tab_is_processed() {
    let doc = FakeSheetDocument::new(&[(
        "2017",
        vec![row("A1", &ext_id(1)), row("A2", &ext_id(2))],
    )]);
    let h = harness(Some(doc), HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Completed);
    assert!(record.success);
    assert_eq!(record.albums_created, 2);
}

#[tokio::test]
async fn test_zero_relevant_tabs_is_success() {
    let doc = FakeSheetDocument::new(&[("Statistics", vec![]), ("Info", vec![])]);
    let h = harness(Some(doc), HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Completed);
    assert!(record.success);
    assert_eq!(record.albums_created, 0);
    assert!(op.stage_message.contains("No release tabs"));
    assert!(h.document.as_ref().unwrap().fetched_tabs().is_empty());
}

#[tokio::test]
async fn test_empty_tab_completes_cleanly() {
    let doc = FakeSheetDocument::new(&[("2023 Prog-metal", vec![])]);
    let h = harness(Some(doc), HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Completed);
    assert!(record.success);
    assert_eq!(record.albums_created, 0);
    assert_eq!(op.albums_processed, 0);
    assert_eq!(op.total_albums, Some(0));
}

#[tokio::test]
async fn test_rerun_of_unchanged_sheet_only_skips() {
    let tabs = [(
        "2023 Prog-metal",
        vec![row("A1", &ext_id(1)), row("A2", &ext_id(2))],
    )];

    let h = harness(Some(FakeSheetDocument::new(&tabs)), HashSet::new());
    let (_, first) = run_to_completion(&h).await;
    assert_eq!(first.albums_created, 2);

    let (_, second) = run_to_completion(&h).await;
    assert!(second.success);
    assert_eq!(second.albums_created, 0);
    assert_eq!(second.albums_skipped, 2);
    assert_eq!(h.catalog.album_count().unwrap(), 2);
}

#[tokio::test]
async fn test_enrichment_failure_is_album_scoped() {
    let doc = FakeSheetDocument::new(&[(
        "2023 Prog-metal",
        vec![
            row("A1", &ext_id(1)),
            row("A2", &ext_id(2)),
            row("A3", &ext_id(3)),
        ],
    )]);
    let mut fail_ids = HashSet::new();
    fail_ids.insert(ext_id(2));
    let h = harness(Some(doc), fail_ids);

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Completed);
    assert!(!record.success);
    assert_eq!(record.albums_created, 2);
    assert_eq!(record.albums_failed, 1);
    assert!(record.error_message.unwrap().contains("1 album(s) failed"));

    // counts sum to the rows actually read
    assert_eq!(
        record.albums_created
            + record.albums_updated
            + record.albums_skipped
            + record.albums_failed,
        3
    );
}

#[tokio::test]
async fn test_unextractable_url_counts_as_failed() {
    let mut bad = row("A2", &ext_id(2));
    bad.spotify_url = "https://open.spotify.com/track/short".to_string();

    let doc = FakeSheetDocument::new(&[("2023 Prog-metal", vec![row("A1", &ext_id(1)), bad])]);
    let h = harness(Some(doc), HashSet::new());

    let (_, record) = run_to_completion(&h).await;

    assert_eq!(record.albums_created, 1);
    assert_eq!(record.albums_failed, 1);
    assert!(!record.success);
}

#[tokio::test]
async fn test_zero_progress_interval_still_completes() {
    let doc = FakeSheetDocument::new(&[(
        "2023 Prog-metal",
        vec![row("A1", &ext_id(1)), row("A2", &ext_id(2))],
    )]);
    let settings = SyncSettings {
        progress_update_every: 0,
        ..Default::default()
    };
    let h = harness_with_settings(Some(doc), HashSet::new(), settings);

    let (op, record) = run_to_completion(&h).await;

    assert_eq!(op.status, SyncStatus::Completed);
    assert_eq!(op.albums_processed, 2);
    assert!(record.success);
    assert_eq!(record.albums_created, 2);
}

#[tokio::test]
async fn test_final_progress_write_reflects_last_album() {
    // 7 rows: throttled writes at 5 plus an unconditional one at 7
    let rows: Vec<AlbumRow> = (1..=7)
        .map(|n| row(&format!("A{}", n), &ext_id(n)))
        .collect();
    let doc = FakeSheetDocument::new(&[("2023 Prog-metal", rows)]);
    let h = harness(Some(doc), HashSet::new());

    let (op, _) = run_to_completion(&h).await;

    assert_eq!(op.albums_processed, 7);
    assert_eq!(op.total_albums, Some(7));
}

#[tokio::test]
async fn test_status_fields_after_completion() {
    let doc = FakeSheetDocument::new(&[("2023 Prog-metal", vec![row("A1", &ext_id(1))])]);
    let h = harness(Some(doc), HashSet::new());

    let (op, record) = run_to_completion(&h).await;

    assert!(!op.is_active());
    assert_eq!(op.current_tab, "");
    assert!(op.completed_at.unwrap() >= op.started_at);
    assert!(h.sync_store.current_active_operation().unwrap().is_none());

    let last = h.sync_store.last_successful_sync().unwrap().unwrap();
    assert_eq!(last.id, record.id);
}
