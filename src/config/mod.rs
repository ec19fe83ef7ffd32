mod file_config;

pub use file_config::{EnrichmentConfig, FileConfig, SyncConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::warn;

use crate::enrichment::RetrySettings;
use crate::sync::SyncSettings;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub sheets_xlsx_url: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub sheets_xlsx_url: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub http_timeout_secs: u64,

    // Feature settings (with defaults)
    pub sync: SyncSettings,
    pub enrichment: RetrySettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let sheets_xlsx_url = file.sheets_xlsx_url.or_else(|| cli.sheets_xlsx_url.clone());
        let spotify_client_id = file
            .spotify_client_id
            .or_else(|| cli.spotify_client_id.clone());
        let spotify_client_secret = file
            .spotify_client_secret
            .or_else(|| cli.spotify_client_secret.clone());

        let http_timeout_secs = file.http_timeout_secs.unwrap_or(cli.http_timeout_secs);

        let sync_file = file.sync.unwrap_or_default();
        let sync_defaults = SyncSettings::default();
        let progress_update_every = sync_file
            .progress_update_every
            .unwrap_or(sync_defaults.progress_update_every);
        if progress_update_every == 0 {
            warn!("progress_update_every of 0 is invalid, using 1");
        }
        let sync = SyncSettings {
            progress_update_every: progress_update_every.max(1),
            stale_operation_threshold_secs: sync_file
                .stale_operation_threshold_secs
                .unwrap_or(sync_defaults.stale_operation_threshold_secs),
        };

        let enrichment_file = file.enrichment.unwrap_or_default();
        let retry_defaults = RetrySettings::default();
        let enrichment = RetrySettings {
            max_retries: enrichment_file
                .max_retries
                .unwrap_or(retry_defaults.max_retries),
            base_backoff_ms: enrichment_file
                .base_backoff_ms
                .unwrap_or(retry_defaults.base_backoff_ms),
        };

        Ok(Self {
            db_dir,
            port,
            sheets_xlsx_url,
            spotify_client_id,
            spotify_client_secret,
            http_timeout_secs,
            sync,
            enrichment,
        })
    }

    /// Missing settings that prevent a sync from running, if any.
    ///
    /// The server still starts without them; triggering a sync reports a
    /// configuration error instead.
    pub fn sync_config_error(&self) -> Option<String> {
        let mut missing = Vec::new();
        if self.sheets_xlsx_url.is_none() {
            missing.push("GOOGLE_SHEETS_XLSX_URL");
        }
        if self.spotify_client_id.is_none() {
            missing.push("SPOTIFY_CLIENT_ID");
        }
        if self.spotify_client_secret.is_none() {
            missing.push("SPOTIFY_CLIENT_SECRET");
        }
        if missing.is_empty() {
            None
        } else {
            Some(format!("Missing required settings: {}", missing.join(", ")))
        }
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn sync_db_path(&self) -> PathBuf {
        self.db_dir.join("sync.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn cli_with_db_dir(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(dir.path().to_path_buf()),
            port: 3001,
            http_timeout_secs: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let mut cli = cli_with_db_dir(&temp_dir);
        cli.sheets_xlsx_url = Some("https://example.com/sheet.xlsx".to_string());

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3001);
        assert_eq!(
            config.sheets_xlsx_url.as_deref(),
            Some("https://example.com/sheet.xlsx")
        );
        assert_eq!(config.sync.progress_update_every, 5);
        assert_eq!(config.sync.stale_operation_threshold_secs, 3600);
        assert_eq!(config.enrichment.max_retries, 3);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            port: 3001,
            sheets_xlsx_url: Some("https://cli.example/sheet.xlsx".to_string()),
            http_timeout_secs: 30,
            ..Default::default()
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            sheets_xlsx_url: Some("https://toml.example/sheet.xlsx".to_string()),
            sync: Some(SyncConfig {
                progress_update_every: Some(10),
                stale_operation_threshold_secs: None,
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(
            config.sheets_xlsx_url.as_deref(),
            Some("https://toml.example/sheet.xlsx")
        );
        assert_eq!(config.sync.progress_update_every, 10);
        // defaults used when neither specifies
        assert_eq!(config.sync.stale_operation_threshold_secs, 3600);
    }

    #[test]
    fn test_resolve_clamps_zero_progress_interval() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            sync: Some(SyncConfig {
                progress_update_every: Some(0),
                stale_operation_threshold_secs: None,
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&CliConfig::default(), Some(file_config)).unwrap();
        assert_eq!(config.sync.progress_update_every, 1);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_sync_config_error_lists_missing_settings() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_db_dir(&temp_dir), None).unwrap();

        let error = config.sync_config_error().unwrap();
        assert!(error.contains("GOOGLE_SHEETS_XLSX_URL"));
        assert!(error.contains("SPOTIFY_CLIENT_ID"));
        assert!(error.contains("SPOTIFY_CLIENT_SECRET"));
    }

    #[test]
    fn test_sync_config_error_none_when_complete() {
        let temp_dir = make_temp_db_dir();
        let mut cli = cli_with_db_dir(&temp_dir);
        cli.sheets_xlsx_url = Some("https://example.com/sheet.xlsx".to_string());
        cli.spotify_client_id = Some("id".to_string());
        cli.spotify_client_secret = Some("secret".to_string());

        let config = AppConfig::resolve(&cli, None).unwrap();
        assert!(config.sync_config_error().is_none());
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_db_dir(&temp_dir), None).unwrap();

        assert_eq!(config.catalog_db_path(), temp_dir.path().join("catalog.db"));
        assert_eq!(config.sync_db_path(), temp_dir.path().join("sync.db"));
    }
}
