//! Keyword-based fallback analysis
//!
//! Produces the same record shape as the AI analyzer from nothing but the
//! aggregated history. It cannot fail and has no hidden inputs: the same
//! conversations and entries always yield the same record.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::db::{
    CalendarEntry, CalendarInsight, ConversationRecord, GeneratedBy, ImageInsight, InputModality,
    InsightsRecord, TopicInsight,
};
use crate::keywords::{self, Topic};

/// Matching turns quoted per topic
const MAX_DETAIL_TURNS: usize = 3;
/// Characters kept from each quoted turn
const DETAIL_PREFIX_CHARS: usize = 50;
const DETAIL_SEPARATOR: &str = "; ";

pub const NO_ACTIVITY_SUMMARY: &str = "No activities logged";
pub const NO_CONVERSATION_SUMMARY: &str = "No conversations were logged for this day.";

/// Clip to `max_chars` characters, marking the cut with "..."
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max_chars).collect();
        format!("{}...", clipped)
    }
}

pub fn analyze_heuristically(
    conversations: &[ConversationRecord],
    entries: &[CalendarEntry],
    user_id: &str,
    date: NaiveDate,
) -> InsightsRecord {
    let folded: Vec<String> = conversations.iter().map(|c| c.user_text.to_lowercase()).collect();
    let corpus = folded.join(" ");

    let topic = |topic: Topic| -> TopicInsight {
        if !keywords::mentions_folded(&corpus, topic) {
            return TopicInsight::default();
        }
        let quoted: Vec<String> = conversations
            .iter()
            .zip(&folded)
            .filter(|(_, text)| keywords::mentions_folded(text, topic))
            .take(MAX_DETAIL_TURNS)
            .map(|(conv, _)| truncate_chars(&conv.user_text, DETAIL_PREFIX_CHARS))
            .collect();
        TopicInsight {
            requested: true,
            detail: if quoted.is_empty() { None } else { Some(quoted.join(DETAIL_SEPARATOR)) },
        }
    };

    let image_turns = conversations
        .iter()
        .filter(|c| c.modality == InputModality::Image)
        .count();
    let image_analysis = if image_turns > 0 {
        ImageInsight {
            performed: true,
            detail: Some(format!("Image analysis performed on {} photos", image_turns)),
        }
    } else {
        ImageInsight::default()
    };

    let conversation_summary = if conversations.is_empty() {
        NO_CONVERSATION_SUMMARY.to_string()
    } else {
        format!(
            "User engaged in {} fitness-related conversations covering workout planning, nutrition advice, and educational content.",
            conversations.len()
        )
    };

    let at = InsightsRecord::day_start(date);
    InsightsRecord {
        user_id: user_id.to_string(),
        date,
        workout: topic(Topic::Workout),
        meal: topic(Topic::Meal),
        video: topic(Topic::Video),
        news: topic(Topic::News),
        image_analysis,
        conversation_summary,
        calendar: CalendarInsight::from_count(entries.len() as u32, Some(summarize_calendar(entries))),
        generated_by: GeneratedBy::Heuristic,
        created_at: at,
        updated_at: at,
    }
}

/// Calendar totals used by both the fallback summary and the AI digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarTotals {
    pub count: usize,
    pub completed: usize,
    pub pending: usize,
    pub total_minutes: u32,
    pub kinds: BTreeSet<String>,
}

pub fn calendar_totals(entries: &[CalendarEntry]) -> CalendarTotals {
    let completed = entries.iter().filter(|e| e.completed).count();
    CalendarTotals {
        count: entries.len(),
        completed,
        pending: entries.len() - completed,
        total_minutes: entries.iter().filter_map(|e| e.duration_minutes).sum(),
        kinds: entries.iter().map(|e| e.display_kind().to_string()).collect(),
    }
}

pub fn summarize_calendar(entries: &[CalendarEntry]) -> String {
    if entries.is_empty() {
        return NO_ACTIVITY_SUMMARY.to_string();
    }
    let totals = calendar_totals(entries);
    format!(
        "Logged {} activities ({}): {} completed, {} pending, {} min total",
        totals.count,
        totals.kinds.iter().cloned().collect::<Vec<_>>().join(", "),
        totals.completed,
        totals.pending,
        totals.total_minutes
    )
}
