//! Persistent album catalog.

mod models;
mod schema;
mod store;

pub use models::Album;
pub use schema::CATALOG_SCHEMA_SQL;
pub use store::{CatalogStore, SqliteCatalogStore, UpsertOutcome};
