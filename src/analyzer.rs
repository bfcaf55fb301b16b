//! AI-based insights analysis
//!
//! Renders the day's history into a bounded digest, embeds it in the fixed
//! analysis template, and asks the language model for a single JSON object.
//! Decoding is strict: a response either decodes into a complete record or
//! the whole response is rejected with an `AnalysisError`. Nothing from a
//! malformed response is kept, and nothing is retried here.

use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{DigestLimits, DIGEST_TRUNCATION_MARKER};
use crate::db::{
    AssistantKind, CalendarEntry, CalendarInsight, ConversationRecord, GeneratedBy, ImageInsight,
    InputModality, InsightsRecord, TopicInsight,
};
use crate::error::AnalysisError;
use crate::heuristic::{calendar_totals, truncate_chars};
use crate::keywords::{self, Topic};
use crate::llm::LanguageModel;
use crate::logging;
use crate::prompts::render_analysis_prompt;

// ============ Response Payload ============

#[derive(Debug, Deserialize)]
struct TopicPayload {
    requested: bool,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    performed: bool,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    workout: TopicPayload,
    meal: TopicPayload,
    video: TopicPayload,
    news: TopicPayload,
    image_analysis: ImagePayload,
    conversation_summary: String,
    #[serde(default)]
    calendar_entries_summary: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<TopicPayload> for TopicInsight {
    fn from(p: TopicPayload) -> Self {
        // detail is kept even when requested is false; callers see what the model said
        TopicInsight { requested: p.requested, detail: non_blank(p.detail) }
    }
}

impl From<ImagePayload> for ImageInsight {
    fn from(p: ImagePayload) -> Self {
        ImageInsight { performed: p.performed, detail: non_blank(p.detail) }
    }
}

// ============ Analyzer ============

pub struct InsightsAnalyzer {
    model: Arc<dyn LanguageModel>,
    limits: DigestLimits,
}

impl InsightsAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>, limits: DigestLimits) -> Self {
        Self { model, limits }
    }

    pub async fn analyze(
        &self,
        conversations: &[ConversationRecord],
        entries: &[CalendarEntry],
        user_id: &str,
        date: NaiveDate,
    ) -> Result<InsightsRecord, AnalysisError> {
        let digest = render_digest(conversations, entries, &self.limits);
        let prompt = render_analysis_prompt(user_id, &date.to_string(), &digest);

        logging::log_analysis(Some(user_id), &format!(
            "Requesting {} analysis: {} conversations, {} entries, digest {} chars",
            self.model.name(), conversations.len(), entries.len(), digest.chars().count()
        ));

        let response = self.model.complete(&prompt).await.map_err(AnalysisError::from)?;

        logging::log_analysis(Some(user_id), &format!(
            "Got analysis response, length: {}", response.len()
        ));

        decode_response(&response, entries, user_id, date)
    }
}

/// Remove optional surrounding ```json / ``` fences
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Decode a model response into a record, or reject it entirely.
///
/// Calendar counts come from `entries`, never from the model.
pub fn decode_response(
    raw: &str,
    entries: &[CalendarEntry],
    user_id: &str,
    date: NaiveDate,
) -> Result<InsightsRecord, AnalysisError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(AnalysisError::Incomplete("empty response"));
    }

    let payload: AnalysisPayload = serde_json::from_str(cleaned).map_err(|e| {
        AnalysisError::Malformed(format!(
            "{} (response starts: {})", e, truncate_chars(cleaned, 200)
        ))
    })?;

    if payload.conversation_summary.trim().is_empty() {
        return Err(AnalysisError::Incomplete("conversation_summary is empty"));
    }

    let at = InsightsRecord::day_start(date);
    Ok(InsightsRecord {
        user_id: user_id.to_string(),
        date,
        workout: payload.workout.into(),
        meal: payload.meal.into(),
        video: payload.video.into(),
        news: payload.news.into(),
        image_analysis: payload.image_analysis.into(),
        conversation_summary: payload.conversation_summary.trim().to_string(),
        calendar: CalendarInsight::from_count(
            entries.len() as u32,
            non_blank(payload.calendar_entries_summary),
        ),
        generated_by: GeneratedBy::Ai,
        created_at: at,
        updated_at: at,
    })
}

// ============ Digest ============

/// Render history into the bounded text block embedded in the prompt
pub fn render_digest(
    conversations: &[ConversationRecord],
    entries: &[CalendarEntry],
    limits: &DigestLimits,
) -> String {
    let workout = count_where(conversations, |c| c.assistant == AssistantKind::Workout);
    let meal = count_where(conversations, |c| keywords::mentions(&c.user_text, Topic::Meal));
    let video = count_where(conversations, |c| {
        c.assistant == AssistantKind::Video || keywords::mentions(&c.user_text, Topic::Video)
    });
    let news = count_where(conversations, |c| c.assistant == AssistantKind::News);
    let image = count_where(conversations, |c| c.modality == InputModality::Image);

    let mut out = String::new();
    out.push_str(&format!(
        "CONVERSATION ANALYSIS:\nTotal conversations: {}\n- Workout-related: {}\n- Meal/nutrition: {}\n- Video/tutorial requests: {}\n- News requests: {}\n- Image analysis sessions: {}\n\nCONVERSATIONS:\n",
        conversations.len(), workout, meal, video, news, image
    ));

    if conversations.is_empty() {
        out.push_str("No conversations found for this date.\n");
    }
    for conv in conversations.iter().take(limits.max_turns) {
        out.push_str(&format!(
            "[{}] assistant={} input={}\nUser: {}\nAssistant: {}\n\n",
            conv.created_at.format("%H:%M"),
            conv.assistant.as_str(),
            conv.modality.as_str(),
            truncate_chars(&conv.user_text, limits.max_turn_chars),
            truncate_chars(&conv.assistant_text, limits.max_turn_chars),
        ));
    }
    if conversations.len() > limits.max_turns {
        out.push_str(&format!("({} more conversations omitted)\n", conversations.len() - limits.max_turns));
    }

    let totals = calendar_totals(entries);
    out.push_str(&format!(
        "\nCALENDAR ANALYSIS:\nTotal entries: {}\n- Completed: {}\n- Pending: {}\n- Total planned duration: {} minutes\n\nCALENDAR ENTRIES:\n",
        totals.count, totals.completed, totals.pending, totals.total_minutes
    ));

    if entries.is_empty() {
        out.push_str("No calendar entries found for this date.\n");
    }
    for entry in entries.iter().take(limits.max_entries) {
        out.push_str(&render_entry(entry, limits.max_turn_chars));
    }
    if entries.len() > limits.max_entries {
        out.push_str(&format!("({} more entries omitted)\n", entries.len() - limits.max_entries));
    }

    clip_digest(out, limits.max_chars)
}

/// Bound the digest to `max_chars`, marking the cut when the marker fits
fn clip_digest(digest: String, max_chars: usize) -> String {
    if digest.chars().count() <= max_chars {
        return digest;
    }
    let marker_len = DIGEST_TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return digest.chars().take(max_chars).collect();
    }
    let mut clipped: String = digest.chars().take(max_chars - marker_len).collect();
    clipped.push_str(DIGEST_TRUNCATION_MARKER);
    clipped
}

fn count_where(conversations: &[ConversationRecord], pred: impl Fn(&ConversationRecord) -> bool) -> usize {
    conversations.iter().filter(|c| pred(c)).count()
}

fn render_entry(entry: &CalendarEntry, max_chars: usize) -> String {
    let kind = entry.display_kind();
    let mut line = format!("- Activity: {}", truncate_chars(kind, max_chars));
    if let Some(label) = entry.label.as_deref().filter(|l| *l != kind && !l.trim().is_empty()) {
        line.push_str(&format!(" ({})", truncate_chars(label, max_chars)));
    }
    if let Some(minutes) = entry.duration_minutes {
        line.push_str(&format!(", Duration: {} minutes", minutes));
    }
    if let Some(intensity) = entry.intensity {
        line.push_str(&format!(", Intensity: {}", intensity.as_str()));
    }
    if let Some(notes) = &entry.notes {
        line.push_str(&format!(", Notes: {}", truncate_chars(notes, max_chars)));
    }
    line.push_str(&format!(", Completed: {}\n", if entry.completed { "Yes" } else { "No" }));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Intensity;
    use crate::error::{InsightsError, Result};
    use async_trait::async_trait;
    use chrono::Utc;

    const VALID: &str = r#"{
        "workout": {"requested": true, "detail": "4-day hypertrophy split"},
        "meal": {"requested": false, "detail": null},
        "video": {"requested": false},
        "news": {"requested": false, "detail": ""},
        "image_analysis": {"performed": false, "detail": null},
        "conversation_summary": "Asked for a muscle building split.",
        "calendar_entries_summary": "One high intensity workout completed."
    }"#;

    struct Scripted(std::result::Result<String, &'static str>);

    #[async_trait]
    impl LanguageModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(msg) => Err(InsightsError::provider("scripted", *msg)),
            }
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn workout_entry() -> CalendarEntry {
        let now = Utc::now();
        CalendarEntry {
            id: 1,
            user_id: "alice".to_string(),
            date: day(),
            kind: "workout".to_string(),
            label: None,
            duration_minutes: Some(45),
            intensity: Some(Intensity::High),
            notes: None,
            completed: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fenced_json_decodes() {
        let fenced = format!("```json\n{}\n```", VALID);
        let record = decode_response(&fenced, &[workout_entry()], "alice", day()).unwrap();

        assert!(record.workout.requested);
        assert_eq!(record.workout.detail.as_deref(), Some("4-day hypertrophy split"));
        assert_eq!(record.news.detail, None);
        assert_eq!(record.calendar.entries_count, 1);
        assert!(record.calendar.entries_logged);
        assert_eq!(record.generated_by, GeneratedBy::Ai);
    }

    #[test]
    fn bare_fence_is_stripped() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn malformed_json_is_rejected_whole() {
        let truncated = &VALID[..VALID.len() / 2];
        let err = decode_response(truncated, &[], "alice", day()).unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));
    }

    #[test]
    fn missing_topic_is_malformed() {
        let raw = r#"{"workout":{"requested":true},"conversation_summary":"x","image_analysis":{"performed":false}}"#;
        assert!(matches!(decode_response(raw, &[], "alice", day()), Err(AnalysisError::Malformed(_))));
    }

    #[test]
    fn blank_summary_is_incomplete() {
        let raw = VALID.replace("Asked for a muscle building split.", "  ");
        assert!(matches!(decode_response(&raw, &[], "alice", day()), Err(AnalysisError::Incomplete(_))));
    }

    #[test]
    fn calendar_counts_ignore_model_claims() {
        // the model cannot claim entries that were never logged
        let record = decode_response(VALID, &[], "alice", day()).unwrap();
        assert!(!record.calendar.entries_logged);
        assert_eq!(record.calendar.entries_count, 0);
    }

    #[test]
    fn detail_with_unrequested_topic_is_left_alone() {
        let raw = VALID.replace(
            r#""meal": {"requested": false, "detail": null}"#,
            r#""meal": {"requested": false, "detail": "high protein"}"#,
        );
        let record = decode_response(&raw, &[], "alice", day()).unwrap();
        assert!(!record.meal.requested);
        assert_eq!(record.meal.detail.as_deref(), Some("high protein"));
    }

    #[test]
    fn digest_is_bounded() {
        let conversations: Vec<_> = (0..200)
            .map(|i| ConversationRecord::new(
                "alice",
                AssistantKind::Workout,
                InputModality::Text,
                &format!("turn {} {}", i, "x".repeat(1000)),
                "reply",
            ))
            .collect();
        let limits = DigestLimits { max_turns: 10, max_turn_chars: 100, max_entries: 5, max_chars: 2000 };
        let digest = render_digest(&conversations, &[workout_entry()], &limits);

        assert!(digest.chars().count() <= 2000);
        assert!(digest.ends_with(DIGEST_TRUNCATION_MARKER));
    }

    #[test]
    fn tiny_bound_is_never_exceeded() {
        let limits = DigestLimits { max_chars: 5, ..DigestLimits::default() };
        let digest = render_digest(&[], &[workout_entry()], &limits);
        assert_eq!(digest.chars().count(), 5);
    }

    #[test]
    fn digest_tags_turns_and_entries() {
        let conv = ConversationRecord::new("alice", AssistantKind::News, InputModality::Audio, "latest news?", "Here");
        let digest = render_digest(&[conv], &[workout_entry()], &DigestLimits::default());

        assert!(digest.contains("assistant=news input=audio"));
        assert!(digest.contains("- News requests: 1"));
        assert!(digest.contains("- Activity: workout, Duration: 45 minutes, Intensity: high, Completed: Yes"));
        assert!(digest.contains("Total planned duration: 45 minutes"));
    }

    #[test]
    fn digest_names_labelled_other_entries() {
        let mut climbing = workout_entry();
        climbing.kind = "other".to_string();
        climbing.label = Some("rock climbing".to_string());
        let digest = render_digest(&[], &[climbing], &DigestLimits::default());

        assert!(digest.contains("- Activity: rock climbing, Duration: 45 minutes"));
        assert!(!digest.contains("Activity: other"));
    }

    #[tokio::test]
    async fn provider_failure_becomes_analysis_error() {
        let analyzer = InsightsAnalyzer::new(Arc::new(Scripted(Err("overloaded"))), DigestLimits::default());
        let err = analyzer.analyze(&[], &[], "alice", day()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Provider(_)));
    }

    #[tokio::test]
    async fn valid_response_becomes_record() {
        let analyzer = InsightsAnalyzer::new(Arc::new(Scripted(Ok(VALID.to_string()))), DigestLimits::default());
        let record = analyzer.analyze(&[], &[], "alice", day()).await.unwrap();
        assert_eq!(record.conversation_summary, "Asked for a muscle building split.");
    }
}
