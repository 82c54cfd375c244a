//! Subject extraction and relevance filtering.

use serde_json::Value;

use crate::types::Record;

/// Fallback subject when nothing recognisable is mentioned.
pub const GENERAL_SUBJECT: &str = "general";

/// Known market terms and the subject each maps to, checked in order.
const KNOWN_SUBJECTS: &[(&str, &str)] = &[
    ("trump", "Trump"),
    ("election", "election"),
    ("bitcoin", "Bitcoin"),
    ("crypto", "crypto"),
    ("eth", "Ethereum"),
    ("btc", "Bitcoin"),
    ("politics", "politics"),
    ("sports", "sports"),
    ("tech", "technology"),
];

/// Words that never name a market in "<word> market".
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "which", "what", "any", "prediction", "stock", "crypto",
];

/// Whether `term` starts a word in `text` (both lowercase).
fn mentions(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(i, _)| {
        text[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Pick the subject of a query.
///
/// Known market terms win (first in table order); otherwise the word before
/// "market"/"markets"; otherwise [`GENERAL_SUBJECT`].
///
/// ```rust
/// # use raven::reasoning::extract_subject;
/// assert_eq!(extract_subject("Should I go long on BTC?"), "Bitcoin");
/// assert_eq!(extract_subject("better position in the oscars market"), "Oscars");
/// assert_eq!(extract_subject("what now?"), "general");
/// ```
pub fn extract_subject(query: &str) -> String {
    let lower = query.to_lowercase();

    if let Some((_, subject)) = KNOWN_SUBJECTS.iter().find(|(term, _)| mentions(&lower, term)) {
        return subject.to_string();
    }

    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    for pair in words.windows(2) {
        let (word, next) = (pair[0], pair[1]);
        if (next == "market" || next == "markets") && !STOPWORDS.contains(&word) {
            return title_case(word);
        }
    }

    GENERAL_SUBJECT.to_string()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Keep up to five coins relevant to `subject`.
///
/// A coin is relevant when the subject appears in its name, symbol or any
/// category. The broad subjects `crypto` and `general` keep every coin.
pub fn filter_relevant_coins(coins: Vec<Record>, subject: &str) -> Vec<Record> {
    let subject = subject.to_lowercase();
    let broad = subject == "crypto" || subject == GENERAL_SUBJECT;
    coins
        .into_iter()
        .filter(|coin| broad || coin_mentions(coin, &subject))
        .take(5)
        .collect()
}

fn coin_mentions(coin: &Record, subject: &str) -> bool {
    let field = |name: &str| {
        coin.get(name)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(subject))
    };
    let in_categories = coin
        .get("categories")
        .and_then(Value::as_array)
        .is_some_and(|cats| {
            cats.iter()
                .filter_map(Value::as_str)
                .any(|c| c.to_lowercase().contains(subject))
        });
    field("name") || field("symbol") || in_categories
}
