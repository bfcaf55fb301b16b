use chrono::NaiveDate;

use crate::db::{Database, InsightsRecord};
use crate::error::PersistError;

/// Durable cache of insights records, keyed by (user, date)
pub trait InsightsStore: Send + Sync {
    fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<InsightsRecord>, PersistError>;

    /// Insert or replace the record for its (user, date) and return it as stored.
    ///
    /// A later `get` for the same key returns exactly this value.
    fn put(&self, record: &InsightsRecord) -> Result<InsightsRecord, PersistError>;
}

impl InsightsStore for Database {
    fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<InsightsRecord>, PersistError> {
        self.get_insights(user_id, date)
            .map_err(|e| PersistError::Read(e.to_string()))
    }

    fn put(&self, record: &InsightsRecord) -> Result<InsightsRecord, PersistError> {
        self.upsert_insights(record)
            .map_err(|e| PersistError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::analyze_heuristically;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn miss_then_hit() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn InsightsStore = &db;
        assert!(store.get("alice", day()).unwrap().is_none());

        let record = analyze_heuristically(&[], &[], "alice", day());
        let stored = store.put(&record).unwrap();

        assert_eq!(store.get("alice", day()).unwrap(), Some(stored.clone()));
        assert_eq!(stored.conversation_summary, record.conversation_summary);
        assert!(store.get("bob", day()).unwrap().is_none());
    }

    #[test]
    fn put_twice_keeps_one_row_and_advances_updated_at() {
        let db = Database::open_in_memory().unwrap();
        let record = analyze_heuristically(&[], &[], "alice", day());

        let first = InsightsStore::put(&db, &record).unwrap();
        let second = InsightsStore::put(&db, &record).unwrap();

        assert_eq!(db.count_insights("alice", day()).unwrap(), 1);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at > first.updated_at);
    }
}
