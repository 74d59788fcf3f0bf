use crate::error::SearchError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrievalMode {
    Proximity,
    Phrase,
    AndNot,
    And,
    Or,
    Keyword,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Proximity => "proximity",
            RetrievalMode::Phrase => "phrase",
            RetrievalMode::AndNot => "and-not",
            RetrievalMode::And => "and",
            RetrievalMode::Or => "or",
            RetrievalMode::Keyword => "keyword",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

lazy_static! {
    // Order matters: first match wins, and AND-NOT must precede AND.
    static ref CLASSIFIERS: Vec<(Regex, RetrievalMode)> = vec![
        (Regex::new(r"^#\d+\s+\w+\s+\w+$").expect("valid regex"), RetrievalMode::Proximity),
        (Regex::new(r#"^"[^"]+"$"#).expect("valid regex"), RetrievalMode::Phrase),
        (Regex::new(r"\b\w+\s+and\s+not\s+\w+\b").expect("valid regex"), RetrievalMode::AndNot),
        (Regex::new(r"\b\w+\s+and\s+\w+\b").expect("valid regex"), RetrievalMode::And),
        (Regex::new(r"\b\w+\s+or\s+\w+\b").expect("valid regex"), RetrievalMode::Or),
    ];
    static ref PROXIMITY: Regex = Regex::new(r"^#(\d+)\s+(\w+)\s+(\w+)").expect("valid regex");
    static ref PHRASE: Regex = Regex::new(r#""(.+?)""#).expect("valid regex");
    static ref SPLIT_AND_NOT: Regex = Regex::new(r"^(.+?)\s+and\s+not\s+(.+)$").expect("valid regex");
    static ref SPLIT_AND: Regex = Regex::new(r"^(.+?)\s+and\s+(.+)$").expect("valid regex");
    static ref SPLIT_OR: Regex = Regex::new(r"^(.+?)\s+or\s+(.+)$").expect("valid regex");
}

/// Picks the retrieval mode for a raw query. Matching runs on the trimmed, lowercased text.
pub fn classify(raw_query: &str) -> RetrievalMode {
    let query = raw_query.trim().to_lowercase();
    CLASSIFIERS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&query))
        .map(|(_, mode)| *mode)
        .unwrap_or(RetrievalMode::Keyword)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityQuery {
    pub distance: u32,
    pub first: String,
    pub second: String,
}

/// Parses `#<distance> <word> <word>`.
pub fn parse_proximity(query: &str) -> Result<ProximityQuery, SearchError> {
    let query = query.trim().to_lowercase();
    let invalid = || SearchError::invalid(RetrievalMode::Proximity.as_str(), &query);
    let caps = PROXIMITY.captures(&query).ok_or_else(invalid)?;
    let distance = caps[1].parse().map_err(|_| invalid())?;
    Ok(ProximityQuery { distance, first: caps[2].to_string(), second: caps[3].to_string() })
}

/// Returns the text between the first pair of quotes.
pub fn parse_phrase(query: &str) -> Result<String, SearchError> {
    let query = query.trim().to_lowercase();
    PHRASE
        .captures(&query)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| SearchError::invalid(RetrievalMode::Phrase.as_str(), &query))
}

/// Splits a boolean query on its connective into the left and right free-text spans.
pub fn split_boolean(mode: RetrievalMode, query: &str) -> Result<(String, String), SearchError> {
    let query = query.trim().to_lowercase();
    let pattern: &Regex = match mode {
        RetrievalMode::AndNot => &*SPLIT_AND_NOT,
        RetrievalMode::And => &*SPLIT_AND,
        RetrievalMode::Or => &*SPLIT_OR,
        _ => return Err(SearchError::invalid(mode.as_str(), &query)),
    };
    let caps = pattern.captures(&query).ok_or_else(|| SearchError::invalid(mode.as_str(), &query))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_precedence() {
        assert_eq!(classify("#3 apple banana"), RetrievalMode::Proximity);
        assert_eq!(classify("\"new york\""), RetrievalMode::Phrase);
        assert_eq!(classify("apple and not banana"), RetrievalMode::AndNot);
        assert_eq!(classify("apple and banana"), RetrievalMode::And);
        assert_eq!(classify("apple or banana"), RetrievalMode::Or);
        assert_eq!(classify("apple"), RetrievalMode::Keyword);
    }

    #[test]
    fn classification_is_case_and_space_insensitive() {
        assert_eq!(classify("  Apple AND Banana "), RetrievalMode::And);
        assert_eq!(classify("#2 Apple"), RetrievalMode::Keyword);
        assert_eq!(classify("\"a\" \"b\""), RetrievalMode::Keyword);
        // substring match: ordinary words still trigger boolean modes
        assert_eq!(classify("rock and roll history"), RetrievalMode::And);
    }

    #[test]
    fn parses_operands() {
        let p = parse_proximity("#12 Trade  War").unwrap();
        assert_eq!(p, ProximityQuery { distance: 12, first: "trade".into(), second: "war".into() });
        assert!(matches!(parse_proximity("trade war"), Err(SearchError::InvalidFormat { .. })));
        assert!(matches!(parse_proximity("#99999999999 a b"), Err(SearchError::InvalidFormat { .. })));

        assert_eq!(parse_phrase("\"New York\"").unwrap(), "new york");
        assert!(parse_phrase("new york").is_err());

        let (a, b) = split_boolean(RetrievalMode::AndNot, "climate policy and not europe").unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("climate policy", "europe"));
        assert!(split_boolean(RetrievalMode::Or, "no connective").is_err());
    }
}
