// Instruction template for the daily insights analysis.
// The digest is substituted for {digest}; user and date for {user_id} and {date}.

pub const INSIGHTS_ANALYSIS_PROMPT: &str = r#"You are a fitness data analyst. Analyze the activity of user {user_id} on {date} and describe what they asked for and what they logged.

Look for:
1. WORKOUT: workout requests, types, goals, preferences
2. MEAL: nutrition questions, diet preferences, meal planning
3. VIDEO: tutorial requests, exercise demos, educational content
4. NEWS: fitness news, trends, research interests
5. IMAGE: physique photos, food photos, form checks

{digest}

Respond with ONLY valid JSON in this exact format (no markdown, no commentary):
{
  "workout": {"requested": true, "detail": "workout type and goals mentioned, or null"},
  "meal": {"requested": false, "detail": null},
  "video": {"requested": false, "detail": null},
  "news": {"requested": false, "detail": null},
  "image_analysis": {"performed": false, "detail": "summary of image analysis performed, or null"},
  "conversation_summary": "summary of all user interactions and goals (200-300 chars)",
  "calendar_entries_summary": "breakdown of planned and completed activities (150-200 chars), or null"
}

Rules:
- "detail" must be null whenever "requested" (or "performed") is false
- "conversation_summary" must never be empty
"#;

/// Fill the analysis template in one pass; substituted values are never rescanned
pub fn render_analysis_prompt(user_id: &str, date: &str, digest: &str) -> String {
    let placeholders = [("{user_id}", user_id), ("{date}", date), ("{digest}", digest)];
    let mut out = String::with_capacity(INSIGHTS_ANALYSIS_PROMPT.len() + digest.len());
    let mut rest = INSIGHTS_ANALYSIS_PROMPT;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match placeholders.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
