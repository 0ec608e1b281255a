//! Keyword filtering
//!
//! A subscriber's filter is a list of terms combined with OR. A term matches
//! when it is a case-insensitive substring of the event's searchable text.
//! Quoted terms are phrases: they may contain commas and spaces.
//!
//! ```text
//! btc, eth                   -> btc OR eth
//! "united states", election  -> the phrase "united states" OR election
//! ```

use crate::types::Event;

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”')];

/// Split user input into terms on commas outside quotes
pub fn parse_keywords(input: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for c in input.chars() {
        match closing {
            Some(close) => {
                current.push(c);
                if c == close {
                    closing = None;
                }
            }
            None if c == ',' => {
                terms.push(std::mem::take(&mut current));
            }
            None => {
                if current.trim().is_empty() {
                    if let Some(&(_, close)) = QUOTE_PAIRS.iter().find(|(open, _)| *open == c) {
                        closing = Some(close);
                    }
                }
                current.push(c);
            }
        }
    }
    terms.push(current);

    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !unquote(t).is_empty())
        .collect()
}

/// Remove one pair of matching surrounding quotes
fn unquote(term: &str) -> &str {
    let term = term.trim();
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = term
            .strip_prefix(*open)
            .and_then(|rest| rest.strip_suffix(*close))
        {
            return inner.trim();
        }
    }
    term
}

/// Whether `event` passes the filter; an empty filter passes everything
pub fn matches(event: &Event, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let searchable = event.searchable_text();
    matches_text(&searchable, keywords)
}

/// Match against already lowercased text
pub fn matches_text(searchable: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .map(|k| unquote(k).to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| searchable.contains(&k))
}
