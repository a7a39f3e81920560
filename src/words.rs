//! Word dataset: loading, validation and the built-in fallback set.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rng::Rng;

/// Relative path fetched once at startup.
pub const DATA_URL: &str = "data.json";

/// One vocabulary item. `contexts` are example sentences; only those that
/// contain `word` verbatim are used as quiz prompts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub contexts: Vec<String>,
}

impl WordEntry {
    pub fn new(word: &str, meaning: &str, contexts: &[&str]) -> Self {
        Self {
            word: word.to_string(),
            meaning: meaning.to_string(),
            contexts: contexts.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Usable as the correct answer or a distractor.
    pub fn is_quizzable(&self) -> bool {
        !self.word.trim().is_empty() && !self.meaning.trim().is_empty()
    }

    pub fn eligible_contexts(&self) -> impl Iterator<Item = &str> {
        self.contexts
            .iter()
            .map(String::as_str)
            .filter(move |s| s.contains(self.word.as_str()))
    }
}

#[derive(Debug)]
pub enum LoadError {
    Parse(serde_json::Error),
    Empty,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Parse(e) => write!(f, "word data is not valid JSON: {e}"),
            LoadError::Empty => write!(f, "word data contains no usable entries"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Parse(e) => Some(e),
            LoadError::Empty => None,
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Parse(e)
    }
}

/// Immutable after load; shared read-only by every spawner and the quiz.
#[derive(Clone, Debug, Default)]
pub struct WordBank {
    entries: Vec<WordEntry>,
}

impl WordBank {
    pub fn new(entries: Vec<WordEntry>) -> Self {
        Self { entries }
    }

    /// Parse `data.json` contents. Entries without a word are dropped; an
    /// empty result is an error so the caller can fall back.
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let raw: Vec<WordEntry> = serde_json::from_str(text)?;
        let total = raw.len();
        let entries: Vec<WordEntry> = raw
            .into_iter()
            .filter(|e| !e.word.trim().is_empty())
            .collect();
        if entries.len() < total {
            log::warn!("dropped {} word entries with an empty word", total - entries.len());
        }
        if entries.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(Self { entries })
    }

    /// Parse, or substitute the built-in set on any failure.
    pub fn from_json_or_fallback(text: &str) -> Self {
        match Self::from_json(text) {
            Ok(bank) => bank,
            Err(err) => {
                log::warn!("{err}; using built-in fallback words");
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self::new(
            FALLBACK_WORDS
                .iter()
                .map(|(w, m, c)| WordEntry::new(w, m, &[c]))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn random_entry(&self, rng: &mut Rng) -> Option<&WordEntry> {
        rng.choose(&self.entries)
    }

    /// First entry carrying this word (the meaning card source).
    pub fn lookup(&self, word: &str) -> Option<&WordEntry> {
        self.entries.iter().find(|e| e.word == word)
    }

    pub fn quiz_pool(&self) -> Vec<&WordEntry> {
        self.entries.iter().filter(|e| e.is_quizzable()).collect()
    }
}

// (word, meaning, context)
pub const FALLBACK_WORDS: &[(&str, &str, &str)] = &[
    (
        "内卷",
        "Involution; escalating competition with little real gain.",
        "Workload doubled for no reason，太内卷了.",
    ),
    (
        "摆烂",
        "To give up trying and let things slide on purpose.",
        "Third delay today, 大家都摆烂了.",
    ),
    (
        "躺平",
        "Opting out of the rat race.",
        "I'll just 躺平 this week.",
    ),
];
