//! Keyword-based title, description and tag suggestions.
//!
//! Stateless: the suggestions are built from string templates over the
//! "meaningful" words of the input.

use smarttask_proto::api::Suggestions;

/// Inputs shorter than this get the default suggestions.
const MIN_INPUT_CHARS: usize = 3;

/// Words of this many characters or fewer are ignored.
const MAX_SHORT_WORD_CHARS: usize = 2;

/// Maximum number of tags returned.
const MAX_TAGS: usize = 5;

const STOP_WORDS: [&str; 11] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
];

/// Suggests task details for free-form input.
///
/// Missing or very short input yields [`default_suggestions`]. Input whose
/// words are all short or stop words yields three empty lists.
#[must_use]
pub fn suggest(input: Option<&str>) -> Suggestions {
    let Some(input) = input.filter(|s| s.chars().count() >= MIN_INPUT_CHARS) else {
        return default_suggestions();
    };

    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|w| w.chars().count() > MAX_SHORT_WORD_CHARS)
        .filter(|w| !STOP_WORDS.contains(w))
        .collect();

    let Some(first) = words.first() else {
        return Suggestions::default();
    };
    let leading = words.iter().take(2).copied().collect::<Vec<_>>().join(" ");

    Suggestions {
        titles: vec![
            format!("Complete {first} task"),
            format!("Review {first}"),
            format!("Work on {leading}"),
        ],
        descriptions: vec![
            format!("Important task related to {}", words.join(", ")),
            format!("Remember to focus on {first} completion"),
        ],
        tags: words.iter().take(MAX_TAGS).map(ToString::to_string).collect(),
    }
}

/// Suggestions offered when there is no usable input.
#[must_use]
pub fn default_suggestions() -> Suggestions {
    Suggestions {
        titles: vec![
            "Complete important task".to_string(),
            "Review pending items".to_string(),
            "Follow up on action items".to_string(),
        ],
        descriptions: vec![
            "This task requires your attention".to_string(),
            "Set a realistic deadline for this task".to_string(),
        ],
        tags: vec![
            "important".to_string(),
            "pending".to_string(),
            "action".to_string(),
        ],
    }
}
