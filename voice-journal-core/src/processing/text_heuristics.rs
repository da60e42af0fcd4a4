//! Keyword heuristics that suggest a mood and tags for a transcript.
//!
//! Matching is a case-insensitive substring test against fixed keyword
//! lists, so the same text always yields the same suggestions.

use std::collections::BTreeSet;

use crate::models::entry::Mood;

/// Mood keyword sets, checked in this order. First match wins.
const MOOD_KEYWORDS: &[(Mood, &[&str])] = &[
    (
        Mood::Happy,
        &["happy", "joy", "great", "wonderful", "amazing", "glad", "excited", "love"],
    ),
    (
        Mood::Sad,
        &["sad", "depressed", "down", "upset", "lonely", "cry", "hurt", "miserable"],
    ),
    (
        Mood::Anxious,
        &["anxious", "anxiety", "worried", "worry", "stress", "nervous", "panic", "overwhelmed"],
    ),
    (
        Mood::Calm,
        &["calm", "peaceful", "relaxed", "serene", "content", "tranquil"],
    ),
];

/// Tag categories and the keywords that select them.
const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "work",
        &["work", "job", "office", "meeting", "boss", "deadline", "project", "career"],
    ),
    (
        "anxiety",
        &["anxious", "anxiety", "worried", "worry", "stress", "nervous", "panic"],
    ),
    (
        "family",
        &["family", "mom", "dad", "mother", "father", "parents", "sister", "brother", "kids"],
    ),
    (
        "relationships",
        &["friend", "partner", "relationship", "boyfriend", "girlfriend", "husband", "wife"],
    ),
    (
        "health",
        &["health", "exercise", "sleep", "tired", "sick", "doctor", "workout"],
    ),
    (
        "gratitude",
        &["grateful", "thankful", "gratitude", "appreciate", "blessed"],
    ),
    (
        "self-care",
        &["meditat", "self-care", "yoga", "journal", "breath"],
    ),
];

/// Mood and tags suggested for one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestions {
    pub mood: Mood,
    pub tags: BTreeSet<String>,
}

pub fn suggest(text: &str) -> Suggestions {
    Suggestions {
        mood: suggest_mood(text),
        tags: suggest_tags(text),
    }
}

/// Mood of the first keyword set (happy, sad, anxious, calm) that matches,
/// or `Mood::Neutral`.
///
/// Never returns `Mood::Excited`: "excited" is a happy keyword. That mood is
/// only set by the user through an entry update.
pub fn suggest_mood(text: &str) -> Mood {
    let lower = text.to_lowercase();
    MOOD_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(mood, _)| *mood)
        .unwrap_or(Mood::Neutral)
}

/// Every tag category with at least one keyword in `text`.
pub fn suggest_tags(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    TAG_KEYWORDS
        .iter()
        .filter(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// One-line reflection stored as an entry's insights.
pub fn suggest_insight(mood: Mood, tags: &BTreeSet<String>) -> String {
    let base = match mood {
        Mood::Happy | Mood::Excited => "You sounded upbeat. Notice what lifted your mood.",
        Mood::Calm => "You sounded settled. Remember what helped you feel this way.",
        Mood::Anxious => "You sounded tense. A few slow breaths may help.",
        Mood::Sad => "You sounded low. Be gentle with yourself today.",
        Mood::Neutral => "Thanks for checking in with yourself.",
    };

    if tags.is_empty() {
        return base.to_string();
    }
    let topics: Vec<&str> = tags.iter().map(String::as_str).collect();
    format!("{} Topics: {}.", base, topics.join(", "))
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn anxious_about_work() {
        let text = "I felt very anxious about work today";
        assert_eq!(suggest_tags(text), tags(&["anxiety", "work"]));
        assert_eq!(suggest_mood(text), Mood::Anxious);
    }

    #[test]
    fn neutral_by_default() {
        assert_eq!(suggest_mood("The bus was on time."), Mood::Neutral);
        assert!(suggest_tags("The bus was on time.").is_empty());
        assert_eq!(suggest_mood(""), Mood::Neutral);
    }

    #[test]
    fn priority_order_happy_before_sad() {
        // Both sets match; happy is checked first.
        assert_eq!(suggest_mood("Happy but a little sad"), Mood::Happy);
        assert_eq!(suggest_mood("Sad and worried"), Mood::Sad);
        assert_eq!(suggest_mood("Worried, then calm"), Mood::Anxious);
        assert_eq!(suggest_mood("Very calm evening"), Mood::Calm);
    }

    #[test]
    fn excited_reads_as_happy() {
        assert_eq!(suggest_mood("So excited for the trip"), Mood::Happy);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(suggest_mood("PEACEFUL"), Mood::Calm);
        assert_eq!(suggest_tags("My BOSS called"), tags(&["work"]));
    }

    #[test]
    fn suggestions_are_pure() {
        let text = "Grateful for my family, though sleep was rough and the deadline looms";
        let first = suggest(text);
        for _ in 0..10 {
            assert_eq!(suggest(text), first);
        }
        assert_eq!(first.tags, tags(&["family", "gratitude", "health", "work"]));
    }

    #[test]
    fn insight_lists_topics() {
        let insight = suggest_insight(Mood::Anxious, &tags(&["anxiety", "work"]));
        assert!(insight.starts_with("You sounded tense."));
        assert!(insight.ends_with("Topics: anxiety, work."));
        assert_eq!(
            suggest_insight(Mood::Neutral, &BTreeSet::new()),
            "Thanks for checking in with yourself."
        );
    }
}
