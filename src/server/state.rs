use std::sync::Arc;

use axum::extract::FromRef;

use crate::catalog_store::CatalogStore;
use crate::sync::{SyncManager, SyncStore};

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedSyncStore = Arc<dyn SyncStore>;
pub type GuardedSyncManager = Arc<SyncManager>;

#[derive(Clone)]
pub struct ServerState {
    pub catalog_store: GuardedCatalogStore,
    pub sync_store: GuardedSyncStore,
    pub sync_manager: GuardedSyncManager,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedSyncStore {
    fn from_ref(input: &ServerState) -> Self {
        input.sync_store.clone()
    }
}

impl FromRef<ServerState> for GuardedSyncManager {
    fn from_ref(input: &ServerState) -> Self {
        input.sync_manager.clone()
    }
}
