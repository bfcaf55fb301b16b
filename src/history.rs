//! History aggregation
//!
//! Pulls one user's conversation turns and calendar entries for a single day
//! from the two external stores. A failed read is not fatal: the day is
//! analyzed as if it had no history, and the error is handed back for logging.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::db::{CalendarEntry, ConversationRecord, Database};
use crate::error::{AggregationError, Result};
use crate::logging;

/// Read side of the conversation log
pub trait ConversationLog: Send + Sync {
    fn read_conversations(&self, user_id: &str, date: NaiveDate) -> Result<Vec<ConversationRecord>>;
}

/// Read side of the calendar store
pub trait CalendarStore: Send + Sync {
    fn read_entries(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEntry>>;
}

impl ConversationLog for Database {
    fn read_conversations(&self, user_id: &str, date: NaiveDate) -> Result<Vec<ConversationRecord>> {
        self.get_conversations_for_day(user_id, date)
    }
}

impl CalendarStore for Database {
    fn read_entries(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEntry>> {
        self.get_calendar_entries_for_day(user_id, date)
    }
}

/// Everything known about one (user, day), oldest first
#[derive(Debug, Clone, Default)]
pub struct DayHistory {
    pub conversations: Vec<ConversationRecord>,
    pub entries: Vec<CalendarEntry>,
}

impl DayHistory {
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty() && self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct Aggregation {
    pub history: DayHistory,
    /// Set when a read failed and `history` was replaced with empty history
    pub error: Option<AggregationError>,
}

#[derive(Clone)]
pub struct HistoryAggregator {
    conversations: Arc<dyn ConversationLog>,
    calendar: Arc<dyn CalendarStore>,
}

impl HistoryAggregator {
    pub fn new(conversations: Arc<dyn ConversationLog>, calendar: Arc<dyn CalendarStore>) -> Self {
        Self { conversations, calendar }
    }

    pub fn aggregate(&self, user_id: &str, date: NaiveDate) -> Aggregation {
        if user_id.trim().is_empty() {
            logging::log_history(None, "Blank user id, treating day as empty");
            return Aggregation { history: DayHistory::default(), error: None };
        }

        match self.read_both(user_id, date) {
            Ok(history) if history.is_empty() => {
                logging::log_history(Some(user_id), &format!("No conversations or calendar entries for {}", date));
                Aggregation { history, error: None }
            }
            Ok(history) => {
                logging::log_history(Some(user_id), &format!(
                    "Aggregated {} conversations and {} calendar entries for {}",
                    history.conversations.len(), history.entries.len(), date
                ));
                Aggregation { history, error: None }
            }
            Err(e) => {
                logging::log_error(Some(user_id), &format!(
                    "History read failed for {}, continuing with empty history: {}", date, e
                ));
                Aggregation { history: DayHistory::default(), error: Some(e) }
            }
        }
    }

    fn read_both(&self, user_id: &str, date: NaiveDate) -> std::result::Result<DayHistory, AggregationError> {
        let mut conversations = self
            .conversations
            .read_conversations(user_id, date)
            .map_err(|e| AggregationError::Conversations(e.to_string()))?;
        let mut entries = self
            .calendar
            .read_entries(user_id, date)
            .map_err(|e| AggregationError::Calendar(e.to_string()))?;

        // Stores promise ascending order; re-sort in case a collaborator does not
        conversations.sort_by_key(|c| c.created_at);
        entries.sort_by_key(|e| e.created_at);

        Ok(DayHistory { conversations, entries })
    }
}
