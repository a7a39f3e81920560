// Invariants of the built-in fallback words and of dataset loading.
// Native-friendly; no wasm/browser APIs.

use std::collections::HashSet;

use danmaku_quiz::words::{FALLBACK_WORDS, LoadError, WordBank};

#[test]
fn fallback_words_are_unique_and_complete() {
    let mut seen = HashSet::new();
    for (word, meaning, context) in FALLBACK_WORDS {
        assert!(seen.insert(*word), "duplicate word '{}' in FALLBACK_WORDS", word);
        assert!(!word.trim().is_empty(), "empty word in FALLBACK_WORDS");
        assert!(!meaning.trim().is_empty(), "empty meaning for '{}'", word);
        assert!(
            context.contains(word),
            "context '{}' does not contain its word '{}'",
            context,
            word
        );
    }
}

#[test]
fn fallback_bank_supports_a_quiz() {
    let bank = WordBank::fallback();
    assert!(bank.quiz_pool().len() >= 3);
    for entry in bank.entries() {
        assert_eq!(entry.eligible_contexts().count(), 1, "'{}' has no usable context", entry.word);
    }
}

#[test]
fn json_dataset_with_missing_fields_loads() {
    let json = r#"[
        {"word": "内卷", "meaning": "M1", "contexts": ["这也太内卷了"]},
        {"word": "摆烂", "meaning": "M2"},
        {"word": "躺平"}
    ]"#;
    let bank = WordBank::from_json(json).unwrap();
    assert_eq!(bank.len(), 3);
    assert_eq!(bank.quiz_pool().len(), 2);
    assert!(bank.lookup("躺平").unwrap().contexts.is_empty());
}

#[test]
fn malformed_or_empty_dataset_is_an_error() {
    assert!(matches!(WordBank::from_json("{not json"), Err(LoadError::Parse(_))));
    assert!(matches!(WordBank::from_json("[]"), Err(LoadError::Empty)));
    let bank = WordBank::from_json_or_fallback("[]");
    assert_eq!(bank.len(), FALLBACK_WORDS.len());
}
