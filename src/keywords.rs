// Fixed keyword sets for the deterministic topic classifier.
// Matching is plain substring search over case-folded text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Workout,
    Meal,
    Video,
    News,
}

impl Topic {
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Topic::Workout => WORKOUT_KEYWORDS,
            Topic::Meal => MEAL_KEYWORDS,
            Topic::Video => VIDEO_KEYWORDS,
            Topic::News => NEWS_KEYWORDS,
        }
    }
}

pub const WORKOUT_KEYWORDS: &[&str] = &[
    "workout",
    "exercise",
    "training",
    "muscle",
    "strength",
    "fitness",
    "gym",
    "bodybuilding",
    "split",
    "routine",
];

pub const MEAL_KEYWORDS: &[&str] = &[
    "meal",
    "nutrition",
    "protein",
    "diet",
    "food",
    "eating",
    "calories",
    "macro",
];

pub const VIDEO_KEYWORDS: &[&str] = &[
    "video",
    "youtube",
    "tutorial",
    "show me",
    "watch",
    "demo",
];

pub const NEWS_KEYWORDS: &[&str] = &[
    "news",
    "latest",
    "trending",
    "updates",
    "research",
];

/// Check whether already case-folded text mentions the topic
pub fn mentions_folded(folded: &str, topic: Topic) -> bool {
    topic.keywords().iter().any(|kw| folded.contains(kw))
}

/// Check whether a message mentions the topic
pub fn mentions(message: &str, topic: Topic) -> bool {
    mentions_folded(&message.to_lowercase(), topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive() {
        assert!(mentions("Need a new GYM Routine", Topic::Workout));
        assert!(mentions("Show Me how to squat", Topic::Video));
        assert!(!mentions("What's the weather", Topic::News));
    }

    #[test]
    fn muscle_split_is_workout_only() {
        let msg = "I want a 4-day muscle building split";
        assert!(mentions(msg, Topic::Workout));
        assert!(!mentions(msg, Topic::Meal));
        assert!(!mentions(msg, Topic::Video));
        assert!(!mentions(msg, Topic::News));
    }
}
