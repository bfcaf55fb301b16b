//! Insights orchestration
//!
//! The public entry point. Decides between the cache and a fresh analysis,
//! runs the AI analyzer with the heuristic analyzer as its safety net, and
//! persists the result. `get_insights` always returns a record: aggregation,
//! analysis, and persistence failures are logged and recovered here.
//!
//! The orchestrator holds no mutable state. Concurrent calls for the same key
//! are not coordinated and the last store write wins.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::analyzer::InsightsAnalyzer;
use crate::db::{CalendarEntry, ConversationRecord, InsightsRecord};
use crate::error::AnalysisError;
use crate::heuristic::analyze_heuristically;
use crate::history::HistoryAggregator;
use crate::logging;
use crate::store::InsightsStore;

/// A record plus how it was obtained
#[derive(Debug, Clone, Serialize)]
pub struct InsightsOutcome {
    pub record: InsightsRecord,
    /// Served from the store without analysis
    pub cached: bool,
    /// The record returned is the one the store now holds
    pub persisted: bool,
}

pub struct InsightsOrchestrator {
    aggregator: HistoryAggregator,
    analyzer: Option<InsightsAnalyzer>,
    store: Arc<dyn InsightsStore>,
}

impl InsightsOrchestrator {
    /// Without an analyzer every fresh record comes from the heuristic path
    pub fn new(
        aggregator: HistoryAggregator,
        analyzer: Option<InsightsAnalyzer>,
        store: Arc<dyn InsightsStore>,
    ) -> Self {
        Self { aggregator, analyzer, store }
    }

    pub async fn get_insights(&self, user_id: &str, date: NaiveDate, force_regenerate: bool) -> InsightsRecord {
        self.get_insights_outcome(user_id, date, force_regenerate).await.record
    }

    /// Same as `get_insights(user_id, date, true)`
    pub async fn regenerate(&self, user_id: &str, date: NaiveDate) -> InsightsRecord {
        self.get_insights(user_id, date, true).await
    }

    pub async fn get_insights_outcome(
        &self,
        user_id: &str,
        date: NaiveDate,
        force_regenerate: bool,
    ) -> InsightsOutcome {
        if !force_regenerate {
            match self.store.get(user_id, date) {
                Ok(Some(record)) => {
                    logging::log_insights(Some(user_id), &format!("Cache hit for {}", date));
                    return InsightsOutcome { record, cached: true, persisted: true };
                }
                Ok(None) => {
                    logging::log_insights(Some(user_id), &format!("Cache miss for {}, generating", date));
                }
                Err(e) => {
                    logging::log_error(Some(user_id), &format!(
                        "Cache lookup failed for {}, generating instead: {}", date, e
                    ));
                }
            }
        } else {
            logging::log_insights(Some(user_id), &format!("Regenerating insights for {}", date));
        }

        // Aggregation failures are already logged; the day is analyzed as empty.
        let aggregation = self.aggregator.aggregate(user_id, date);
        let history = aggregation.history;

        let mut record = match self.analyze_with_ai(&history.conversations, &history.entries, user_id, date).await {
            Ok(record) => record,
            Err(e) => {
                logging::log_analysis(Some(user_id), &format!(
                    "AI analysis unavailable ({}), using heuristic analysis", e
                ));
                analyze_heuristically(&history.conversations, &history.entries, user_id, date)
            }
        };
        record.stamp(Utc::now());

        match self.store.put(&record) {
            Ok(stored) => {
                logging::log_store(Some(user_id), &format!(
                    "Stored {} insights for {}", stored.generated_by.as_str(), date
                ));
                InsightsOutcome { record: stored, cached: false, persisted: true }
            }
            Err(e) => {
                logging::log_error(Some(user_id), &format!(
                    "Failed to persist insights for {}, returning unsaved record: {}", date, e
                ));
                InsightsOutcome { record, cached: false, persisted: false }
            }
        }
    }

    async fn analyze_with_ai(
        &self,
        conversations: &[ConversationRecord],
        entries: &[CalendarEntry],
        user_id: &str,
        date: NaiveDate,
    ) -> Result<InsightsRecord, AnalysisError> {
        match &self.analyzer {
            Some(analyzer) => analyzer.analyze(conversations, entries, user_id, date).await,
            None => Err(AnalysisError::Unavailable),
        }
    }
}
