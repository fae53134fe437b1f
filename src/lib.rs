pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod phi_audit;
pub mod pipeline;
pub mod workflow;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::{start_api_server, ApiContext};
use crate::catalog::{CatalogError, CategoryCatalog};
use crate::config::{AppConfig, ConfigError};
use crate::db::DatabaseError;
use crate::notify::OutboxNotifier;
use crate::pipeline::external::{ExternalAnalyzer, ExternalError, OpenAiClient};
use crate::pipeline::DraftPipeline;

/// Startup failures.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("External analysis setup failed: {0}")]
    External(#[from] ExternalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the drafting pipeline. The external collaborator is attached only
/// when an API key is configured.
pub fn build_pipeline(config: &AppConfig) -> Result<DraftPipeline, AppError> {
    let catalog = Arc::new(CategoryCatalog::load(config.catalog_path.as_deref())?);
    let pipeline = DraftPipeline::new(catalog);

    match &config.llm {
        Some(llm) => {
            let client = OpenAiClient::new(&llm.base_url, &llm.api_key, &llm.model, llm.timeout_secs)?;
            tracing::info!(model = %llm.model, "External analysis enabled");
            Ok(pipeline.with_external(ExternalAnalyzer::new(Box::new(client))))
        }
        None => {
            tracing::info!("External analysis disabled; using rule-based drafts");
            Ok(pipeline)
        }
    }
}

/// Open the database and assemble the shared API state.
pub fn build_context(config: &AppConfig) -> Result<ApiContext, AppError> {
    let pipeline = build_pipeline(config)?;
    let conn = db::open_database(&config.database_path)?;
    let notifier = OutboxNotifier::new(config.mail_from.clone(), config.outbox_dir.clone());
    if config.mail_from.is_none() {
        tracing::warn!("MAIL_FROM not set; draft emails will fail until configured");
    }
    Ok(ApiContext::new(conn, pipeline, Arc::new(notifier), &config.base_url))
}

pub fn run() -> Result<(), AppError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("EPA feedback service starting v{}", config::APP_VERSION);

    let config = AppConfig::from_env()?;
    // The blocking HTTP client must be built outside the async runtime.
    let ctx = build_context(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut server = start_api_server(ctx, config.bind_addr).await?;
        tokio::signal::ctrl_c().await?;
        server.shutdown();
        server.stopped().await;
        Ok::<(), AppError>(())
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::LlmSettings;

    fn test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            database_path: dir.join("sessions.db"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            base_url: "http://localhost:3000".into(),
            catalog_path: None,
            llm: None,
            mail_from: None,
            outbox_dir: dir.join("outbox"),
        }
    }

    #[test]
    fn pipeline_without_key_is_rule_based() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_pipeline(&test_config(dir.path())).unwrap();
        assert!(!pipeline.has_external());
        assert_eq!(pipeline.catalog().len(), 12);
    }

    #[test]
    fn pipeline_with_key_attaches_external() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.llm = Some(LlmSettings {
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
            base_url: "http://127.0.0.1:9/v1".into(),
            timeout_secs: 1,
        });
        assert!(build_pipeline(&config).unwrap().has_external());
    }

    #[test]
    fn missing_catalog_file_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.catalog_path = Some(PathBuf::from("/nonexistent/epas.json"));
        assert!(matches!(build_pipeline(&config), Err(AppError::Catalog(_))));
    }

    #[test]
    fn context_opens_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let ctx = build_context(&config).unwrap();
        assert!(config.database_path.exists());
        assert!(!ctx.notifier.is_configured());
    }
}
