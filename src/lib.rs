pub mod analyzer;
pub mod anthropic;
pub mod config;
pub mod db;
pub mod error;
pub mod heuristic;
pub mod history;
pub mod keywords;
pub mod llm;
pub mod logging;
pub mod openai;
pub mod orchestrator;
pub mod prompts;
pub mod store;

use std::sync::Arc;

pub use config::InsightsConfig;
pub use db::{CalendarEntry, ConversationRecord, Database, GeneratedBy, InsightsRecord};
pub use error::{InsightsError, Result};
pub use orchestrator::{InsightsOrchestrator, InsightsOutcome};

use analyzer::InsightsAnalyzer;
use history::HistoryAggregator;

// ============ Engine Initialization ============

/// Wire logging, the SQLite collaborators and the configured provider into an orchestrator.
///
/// Without an API key the orchestrator runs heuristic-only.
pub fn init_engine(config: &InsightsConfig) -> Result<InsightsOrchestrator> {
    config.validate()?;

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    match logging::cleanup_old_logs(&config.log_dir, config.log_retention_days) {
        Ok(0) => {}
        Ok(removed) => logging::log_insights(None, &format!("Removed {} old log files", removed)),
        Err(e) => logging::log_error(None, &format!("Log cleanup failed: {}", e)),
    }

    let db = Arc::new(Database::open(&config.database_path)?);
    logging::log_store(None, &format!("Opened database at {}", config.database_path.display()));

    let analyzer = llm::provider_from_config(config)?
        .map(|model| InsightsAnalyzer::new(model, config.digest.clone()));
    match &analyzer {
        Some(_) => logging::log_insights(None, &format!(
            "Engine ready with {} model {}", config.provider.as_str(), config.model_name()
        )),
        None => logging::log_insights(None, "Engine ready without API key, heuristic analysis only"),
    }

    let aggregator = HistoryAggregator::new(db.clone(), db.clone());
    Ok(InsightsOrchestrator::new(aggregator, analyzer, db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_config(name: &str) -> InsightsConfig {
        let root = std::env::temp_dir().join(format!("daily-insights-{}-{}", name, uuid::Uuid::new_v4()));
        InsightsConfig {
            database_path: root.join("insights.db"),
            log_dir: root.join("logs"),
            ..InsightsConfig::default()
        }
    }

    #[tokio::test]
    async fn engine_without_key_serves_heuristic_records() {
        let config = temp_config("engine");
        let engine = init_engine(&config).unwrap();

        let today = Utc::now().date_naive();
        let record = engine.get_insights("alice", today, false).await;
        assert_eq!(record.generated_by, GeneratedBy::Heuristic);
        assert!(config.database_path.exists());

        let cached = engine.get_insights_outcome("alice", today, false).await;
        assert!(cached.cached);
        assert_eq!(cached.record, record);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = temp_config("invalid");
        config.max_tokens = 0;
        assert!(matches!(init_engine(&config), Err(InsightsError::Config(_))));
    }
}
