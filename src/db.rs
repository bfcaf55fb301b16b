use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{InsightsError, Result};
use crate::logging;

// ============ Conversation Log Structs ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantKind {
    Workout,
    News,
    Video,
    Image,
    Other,
}

impl AssistantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantKind::Workout => "workout",
            AssistantKind::News => "news",
            AssistantKind::Video => "video",
            AssistantKind::Image => "image",
            AssistantKind::Other => "other",
        }
    }

    /// Unknown tags fall back to `Other`; the log is written by other services.
    pub fn from_str(s: &str) -> AssistantKind {
        match s.trim().to_lowercase().as_str() {
            "workout" => AssistantKind::Workout,
            "news" => AssistantKind::News,
            "video" | "youtube" => AssistantKind::Video,
            "image" => AssistantKind::Image,
            _ => AssistantKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    Text,
    Image,
    Audio,
}

impl InputModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputModality::Text => "text",
            InputModality::Image => "image",
            InputModality::Audio => "audio",
        }
    }

    pub fn from_str(s: &str) -> InputModality {
        match s.trim().to_lowercase().as_str() {
            "image" => InputModality::Image,
            "audio" => InputModality::Audio,
            _ => InputModality::Text,
        }
    }
}

/// One logged exchange between the user and an assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub assistant: AssistantKind,
    pub user_text: String,
    pub assistant_text: String,
    pub modality: InputModality,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(
        user_id: &str,
        assistant: AssistantKind,
        modality: InputModality,
        user_text: &str,
        assistant_text: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            assistant,
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            modality,
            created_at: Utc::now(),
        }
    }
}

// ============ Calendar Structs ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Intensity> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Intensity::Low),
            "medium" => Some(Intensity::Medium),
            "high" => Some(Intensity::High),
            _ => None,
        }
    }
}

/// One logged or planned activity for a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub kind: String,                   // "workout", "yoga", "swimming", ..., "other"
    pub label: Option<String>,          // free text, expected when kind = "other"
    pub duration_minutes: Option<u32>,
    pub intensity: Option<Intensity>,
    pub notes: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEntry {
    /// The label for "other" entries, otherwise the kind
    pub fn display_kind(&self) -> &str {
        match (&self.label, self.kind.eq_ignore_ascii_case("other")) {
            (Some(label), true) if !label.trim().is_empty() => label,
            _ => &self.kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalendarEntry {
    pub user_id: String,
    pub date: NaiveDate,
    pub kind: String,
    pub label: Option<String>,
    pub duration_minutes: Option<u32>,
    pub intensity: Option<Intensity>,
    pub notes: Option<String>,
    pub completed: bool,
}

// ============ Insights Structs ============

/// A topic the user asked about during the day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInsight {
    pub requested: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInsight {
    pub performed: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInsight {
    pub entries_logged: bool,
    pub entries_count: u32,
    pub entries_summary: Option<String>,
}

impl CalendarInsight {
    /// `entries_logged` is always derived from the count
    pub fn from_count(entries_count: u32, entries_summary: Option<String>) -> Self {
        Self {
            entries_logged: entries_count > 0,
            entries_count,
            entries_summary,
        }
    }
}

/// Which analyzer produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedBy {
    Ai,
    Heuristic,
}

impl GeneratedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratedBy::Ai => "ai",
            GeneratedBy::Heuristic => "heuristic",
        }
    }

    pub fn from_str(s: &str) -> GeneratedBy {
        match s {
            "heuristic" => GeneratedBy::Heuristic,
            _ => GeneratedBy::Ai,
        }
    }
}

/// Daily behavioral summary for one (user, date) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub workout: TopicInsight,
    pub meal: TopicInsight,
    pub video: TopicInsight,
    pub news: TopicInsight,
    pub image_analysis: ImageInsight,
    pub conversation_summary: String,
    pub calendar: CalendarInsight,
    pub generated_by: GeneratedBy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsightsRecord {
    /// Analyzers stamp records with the start of the analyzed day so their
    /// output depends only on their input; the orchestrator restamps on persist.
    pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn stamp(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
        self.updated_at = at;
    }
}

// ============ Timestamps ============

/// Stored timestamps keep microsecond precision so reads round-trip exactly
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| InsightsError::InvalidData(format!("timestamp '{}': {}", s, e)))
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============ Database ============

/// SQLite-backed conversation log, calendar store, and insights cache
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| InsightsError::Lock)?;
        Ok(f(&mut *conn)?)
    }

    // ============ Conversations ============

    pub fn save_conversation(&self, record: &ConversationRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO conversations (id, user_id, assistant_kind, human_message, ai_message, input_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.user_id,
                    record.assistant.as_str(),
                    record.user_text,
                    record.assistant_text,
                    record.modality.as_str(),
                    format_timestamp(&record.created_at)
                ],
            )?;
            Ok(())
        })
    }

    /// Rows whose timestamp does not parse are skipped and logged; the log is
    /// written by other services.
    pub fn get_conversations_for_day(&self, user_id: &str, date: NaiveDate) -> Result<Vec<ConversationRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, assistant_kind, human_message, ai_message, input_type, created_at
                 FROM conversations
                 WHERE user_id = ?1 AND DATE(created_at) = ?2
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let records = stmt.query_map(params![user_id, date.to_string()], |row| {
                let id: String = row.get(0)?;
                let raw_created: String = row.get(6)?;
                let created_at = match parse_timestamp(&raw_created) {
                    Ok(ts) => ts,
                    Err(e) => {
                        logging::log_error(Some(user_id), &format!("Skipping conversation {}: {}", id, e));
                        return Ok(None);
                    }
                };
                Ok(Some(ConversationRecord {
                    id,
                    user_id: row.get(1)?,
                    assistant: AssistantKind::from_str(&row.get::<_, String>(2)?),
                    user_text: row.get(3)?,
                    assistant_text: row.get(4)?,
                    modality: InputModality::from_str(&row.get::<_, String>(5)?),
                    created_at,
                }))
            })?;

            records.filter_map(|r| r.transpose()).collect()
        })
    }

    // ============ Calendar ============

    pub fn add_calendar_entry(&self, entry: &NewCalendarEntry) -> Result<CalendarEntry> {
        let now = Utc::now();
        let now_str = format_timestamp(&now);
        let id = self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO calendar_entries (user_id, entry_date, activity_type, custom_activity, duration, intensity, additional_notes, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.user_id,
                    entry.date.to_string(),
                    entry.kind,
                    entry.label,
                    entry.duration_minutes,
                    entry.intensity.map(|i| i.as_str()),
                    entry.notes,
                    entry.completed,
                    now_str,
                    now_str
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        let stored = parse_timestamp(&now_str)?;
        Ok(CalendarEntry {
            id,
            user_id: entry.user_id.clone(),
            date: entry.date,
            kind: entry.kind.clone(),
            label: entry.label.clone(),
            duration_minutes: entry.duration_minutes,
            intensity: entry.intensity,
            notes: entry.notes.clone(),
            completed: entry.completed,
            created_at: stored,
            updated_at: stored,
        })
    }

    /// Returns false when no entry has this id
    pub fn set_entry_completed(&self, entry_id: i64, completed: bool) -> Result<bool> {
        let now = format_timestamp(&Utc::now());
        self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE calendar_entries SET completed = ?1, updated_at = ?2 WHERE id = ?3",
                params![completed, now, entry_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_calendar_entry(&self, entry_id: i64) -> Result<bool> {
        self.with_connection(|conn| {
            let changed = conn.execute("DELETE FROM calendar_entries WHERE id = ?1", params![entry_id])?;
            Ok(changed > 0)
        })
    }

    pub fn get_calendar_entries_for_day(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, entry_date, activity_type, custom_activity, duration, intensity, additional_notes, completed, created_at, updated_at
                 FROM calendar_entries
                 WHERE user_id = ?1 AND entry_date = ?2
                 ORDER BY created_at ASC, id ASC",
            )?;

            let entries = stmt.query_map(params![user_id, date.to_string()], |row| {
                Ok(CalendarEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    date: get_date(row, 2)?,
                    kind: row.get(3)?,
                    label: row.get(4)?,
                    duration_minutes: row.get(5)?,
                    intensity: row
                        .get::<_, Option<String>>(6)?
                        .and_then(|s| Intensity::from_str(&s)),
                    notes: row.get(7)?,
                    completed: row.get::<_, i64>(8)? != 0,
                    created_at: get_timestamp(row, 9)?,
                    updated_at: get_timestamp(row, 10)?,
                })
            })?;

            entries.collect()
        })
    }

    // ============ Insights ============

    pub fn get_insights(&self, user_id: &str, date: NaiveDate) -> Result<Option<InsightsRecord>> {
        self.with_connection(|conn| read_insights(conn, user_id, date))
    }

    /// Insert or fully replace the record for (user, date).
    ///
    /// `created_at` of an existing row is kept; `updated_at` is set to now, or
    /// one microsecond past the previous value when the clock has not advanced.
    /// Returns the row as stored.
    pub fn upsert_insights(&self, record: &InsightsRecord) -> Result<InsightsRecord> {
        let date = record.date.to_string();
        let stored = self.with_connection(|conn| {
            let tx = conn.transaction()?;

            let previous: Option<(String, String)> = match tx.query_row(
                "SELECT created_at, updated_at FROM insights WHERE user_id = ?1 AND analysis_date = ?2",
                params![record.user_id, date],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ) {
                Ok(found) => Some(found),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };

            let now = Utc::now();
            let (created_at, updated_at) = match previous {
                Some((created, updated)) => {
                    let prior = DateTime::parse_from_rfc3339(&updated)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or(now);
                    let bumped = if now > prior {
                        now
                    } else {
                        prior + chrono::Duration::microseconds(1)
                    };
                    (created, format_timestamp(&bumped))
                }
                None => {
                    let ts = format_timestamp(&now);
                    (ts.clone(), ts)
                }
            };

            tx.execute(
                "INSERT INTO insights (
                    user_id, analysis_date,
                    workout_requested, workout_detail, meal_requested, meal_detail,
                    video_requested, video_detail, news_requested, news_detail,
                    image_analysis_done, image_analysis_detail, conversation_summary,
                    entries_logged, entries_count, entries_summary, generated_by,
                    created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                 ON CONFLICT(user_id, analysis_date) DO UPDATE SET
                    workout_requested = excluded.workout_requested,
                    workout_detail = excluded.workout_detail,
                    meal_requested = excluded.meal_requested,
                    meal_detail = excluded.meal_detail,
                    video_requested = excluded.video_requested,
                    video_detail = excluded.video_detail,
                    news_requested = excluded.news_requested,
                    news_detail = excluded.news_detail,
                    image_analysis_done = excluded.image_analysis_done,
                    image_analysis_detail = excluded.image_analysis_detail,
                    conversation_summary = excluded.conversation_summary,
                    entries_logged = excluded.entries_logged,
                    entries_count = excluded.entries_count,
                    entries_summary = excluded.entries_summary,
                    generated_by = excluded.generated_by,
                    updated_at = excluded.updated_at",
                params![
                    record.user_id,
                    date,
                    record.workout.requested,
                    record.workout.detail,
                    record.meal.requested,
                    record.meal.detail,
                    record.video.requested,
                    record.video.detail,
                    record.news.requested,
                    record.news.detail,
                    record.image_analysis.performed,
                    record.image_analysis.detail,
                    record.conversation_summary,
                    record.calendar.entries_logged,
                    record.calendar.entries_count,
                    record.calendar.entries_summary,
                    record.generated_by.as_str(),
                    created_at,
                    updated_at
                ],
            )?;

            let stored = read_insights(&tx, &record.user_id, record.date)?;
            tx.commit()?;
            Ok(stored)
        })?;

        stored.ok_or_else(|| InsightsError::InvalidData("insights row missing after upsert".to_string()))
    }
}

#[cfg(test)]
impl Database {
    pub(crate) fn count_insights(&self, user_id: &str, date: NaiveDate) -> Result<i64> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM insights WHERE user_id = ?1 AND analysis_date = ?2",
                params![user_id, date.to_string()],
                |row| row.get(0),
            )
        })
    }
}

fn read_insights(conn: &Connection, user_id: &str, date: NaiveDate) -> rusqlite::Result<Option<InsightsRecord>> {
    let result = conn.query_row(
        "SELECT user_id, analysis_date,
                workout_requested, workout_detail, meal_requested, meal_detail,
                video_requested, video_detail, news_requested, news_detail,
                image_analysis_done, image_analysis_detail, conversation_summary,
                entries_logged, entries_count, entries_summary, generated_by,
                created_at, updated_at
         FROM insights
         WHERE user_id = ?1 AND analysis_date = ?2",
        params![user_id, date.to_string()],
        |row| {
            Ok(InsightsRecord {
                user_id: row.get(0)?,
                date: get_date(row, 1)?,
                workout: TopicInsight { requested: row.get(2)?, detail: row.get(3)? },
                meal: TopicInsight { requested: row.get(4)?, detail: row.get(5)? },
                video: TopicInsight { requested: row.get(6)?, detail: row.get(7)? },
                news: TopicInsight { requested: row.get(8)?, detail: row.get(9)? },
                image_analysis: ImageInsight { performed: row.get(10)?, detail: row.get(11)? },
                conversation_summary: row.get(12)?,
                calendar: CalendarInsight {
                    entries_logged: row.get(13)?,
                    entries_count: row.get(14)?,
                    entries_summary: row.get(15)?,
                },
                generated_by: GeneratedBy::from_str(
                    &row.get::<_, Option<String>>(16)?.unwrap_or_default(),
                ),
                created_at: get_timestamp(row, 17)?,
                updated_at: get_timestamp(row, 18)?,
            })
        },
    );
    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?1", table),
        params![column],
        |row| Ok(row.get::<_, i64>(0)? > 0),
    )
    .unwrap_or(false)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        -- Conversation log written by the chat router
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            assistant_kind TEXT NOT NULL,
            human_message TEXT NOT NULL,
            ai_message TEXT NOT NULL,
            input_type TEXT NOT NULL DEFAULT 'text',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user_created
            ON conversations(user_id, created_at);

        -- Calendar logbook
        CREATE TABLE IF NOT EXISTS calendar_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            entry_date TEXT NOT NULL,
            activity_type TEXT NOT NULL,
            custom_activity TEXT,
            duration INTEGER,
            intensity TEXT,
            additional_notes TEXT,
            completed INTEGER DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_calendar_user_date
            ON calendar_entries(user_id, entry_date);

        -- One insights row per (user, day)
        CREATE TABLE IF NOT EXISTS insights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            analysis_date TEXT NOT NULL,
            workout_requested INTEGER DEFAULT 0,
            workout_detail TEXT,
            meal_requested INTEGER DEFAULT 0,
            meal_detail TEXT,
            video_requested INTEGER DEFAULT 0,
            video_detail TEXT,
            news_requested INTEGER DEFAULT 0,
            news_detail TEXT,
            image_analysis_done INTEGER DEFAULT 0,
            image_analysis_detail TEXT,
            conversation_summary TEXT NOT NULL,
            entries_logged INTEGER DEFAULT 0,
            entries_count INTEGER DEFAULT 0,
            entries_summary TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, analysis_date)
        );
        ",
    )?;

    // Migration: record which analyzer produced each row
    if !has_column(conn, "insights", "generated_by") {
        conn.execute("ALTER TABLE insights ADD COLUMN generated_by TEXT DEFAULT 'ai'", [])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn conversation_at(user: &str, hour: u32, text: &str) -> ConversationRecord {
        let mut record = ConversationRecord::new(
            user,
            AssistantKind::Workout,
            InputModality::Text,
            text,
            "Here is a plan",
        );
        record.created_at = Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap();
        record
    }

    fn sample_insights(summary: &str) -> InsightsRecord {
        let now = Utc::now();
        InsightsRecord {
            user_id: "alice".to_string(),
            date: day(),
            workout: TopicInsight { requested: true, detail: Some("split".to_string()) },
            meal: TopicInsight::default(),
            video: TopicInsight::default(),
            news: TopicInsight::default(),
            image_analysis: ImageInsight::default(),
            conversation_summary: summary.to_string(),
            calendar: CalendarInsight::from_count(0, Some("No activities logged".to_string())),
            generated_by: GeneratedBy::Heuristic,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn conversations_filtered_by_day_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        db.save_conversation(&conversation_at("alice", 15, "second")).unwrap();
        db.save_conversation(&conversation_at("alice", 9, "first")).unwrap();
        db.save_conversation(&conversation_at("bob", 10, "other user")).unwrap();

        let mut next_day = conversation_at("alice", 9, "tomorrow");
        next_day.created_at = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap();
        db.save_conversation(&next_day).unwrap();

        let found = db.get_conversations_for_day("alice", day()).unwrap();
        let texts: Vec<_> = found.iter().map(|c| c.user_text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn unparseable_conversation_timestamp_skips_only_that_row() {
        let db = Database::open_in_memory().unwrap();
        db.save_conversation(&conversation_at("alice", 9, "kept")).unwrap();
        db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, assistant_kind, human_message, ai_message, input_type, created_at)
                 VALUES ('legacy', 'alice', 'workout', 'no offset', 'ok', 'text', '2025-03-14 10:00:00')",
                [],
            )
        })
        .unwrap();

        let found = db.get_conversations_for_day("alice", day()).unwrap();
        let texts: Vec<_> = found.iter().map(|c| c.user_text.as_str()).collect();
        assert_eq!(texts, vec!["kept"]);
    }

    #[test]
    fn calendar_entries_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let added = db
            .add_calendar_entry(&NewCalendarEntry {
                user_id: "alice".to_string(),
                date: day(),
                kind: "yoga".to_string(),
                label: None,
                duration_minutes: Some(30),
                intensity: Some(Intensity::Low),
                notes: Some("morning".to_string()),
                completed: false,
            })
            .unwrap();

        assert!(db.set_entry_completed(added.id, true).unwrap());
        assert!(!db.set_entry_completed(9999, true).unwrap());

        let entries = db.get_calendar_entries_for_day("alice", day()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].intensity, Some(Intensity::Low));
        assert_eq!(entries[0].duration_minutes, Some(30));
        assert!(entries[0].completed);

        assert!(db.delete_calendar_entry(added.id).unwrap());
        assert!(db.get_calendar_entries_for_day("alice", day()).unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_and_keeps_one_row() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_insights(&sample_insights("first pass")).unwrap();

        let mut second_payload = sample_insights("second pass");
        second_payload.workout = TopicInsight::default();
        let second = db.upsert_insights(&second_payload).unwrap();

        assert_eq!(db.count_insights("alice", day()).unwrap(), 1);
        assert_eq!(second.conversation_summary, "second pass");
        assert_eq!(second.workout, TopicInsight::default());
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn get_returns_exactly_what_upsert_returned() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.upsert_insights(&sample_insights("cached")).unwrap();
        let read = db.get_insights("alice", day()).unwrap().unwrap();
        assert_eq!(stored, read);
        assert!(db.get_insights("alice", day().succ_opt().unwrap()).unwrap().is_none());
    }

    #[test]
    fn display_kind_prefers_label_for_other() {
        let now = Utc::now();
        let mut entry = CalendarEntry {
            id: 1,
            user_id: "alice".to_string(),
            date: day(),
            kind: "other".to_string(),
            label: Some("rock climbing".to_string()),
            duration_minutes: None,
            intensity: None,
            notes: None,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(entry.display_kind(), "rock climbing");
        entry.kind = "workout".to_string();
        assert_eq!(entry.display_kind(), "workout");
    }

    #[test]
    fn assistant_kind_parsing_is_lenient() {
        assert_eq!(AssistantKind::from_str("YouTube"), AssistantKind::Video);
        assert_eq!(AssistantKind::from_str("calendar"), AssistantKind::Other);
        assert_eq!(InputModality::from_str("voice"), InputModality::Text);
    }
}
