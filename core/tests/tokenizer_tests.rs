use newsdex_core::tokenizer::normalize;

#[test]
fn it_normalizes_and_stems() {
    let words = normalize("Running Runners RUN! The election's results.");
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"runner".to_string()));
    // apostrophe stripped before stemming
    assert!(words.contains(&"elect".to_string()));
    assert!(words.iter().all(|w| w.chars().all(|c| c.is_alphanumeric() || c == '_')));
}

#[test]
fn it_filters_stopwords() {
    let words = normalize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}
