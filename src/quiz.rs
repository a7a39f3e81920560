//! Context quiz: one sentence, three meanings, one of them right.
//!
//! `QuizEngine` only tracks question state. Dwell timing belongs to the
//! game controller, which calls `finish_dwell` when the hint has been shown
//! long enough.

use std::fmt;

use crate::rng::Rng;
use crate::words::{WordBank, WordEntry};

/// How long the success / error hint stays up before moving on.
pub const QUIZ_DWELL_MS: f64 = 1400.0;
pub const OPTION_COUNT: usize = 3;

pub const MARK_OPEN: &str = "<span class=\"zh\">";
pub const MARK_CLOSE: &str = "</span>";

pub const HINT_CORRECT: &str = "✔ Correct!";
pub const HINT_WRONG: &str = "✖ Try another one…";
pub const HINT_NOT_ENOUGH: &str = "Not enough words to build a quiz yet.";

/// Wrap the first literal occurrence of `word`. A sentence that already
/// carries a mark is returned unchanged.
pub fn wrap_marked_word(sentence: &str, word: &str) -> String {
    if word.is_empty() || sentence.contains(MARK_OPEN) {
        return sentence.to_string();
    }
    match sentence.find(word) {
        Some(idx) => {
            let end = idx + word.len();
            format!(
                "{}{MARK_OPEN}{word}{MARK_CLOSE}{}",
                &sentence[..idx],
                &sentence[end..]
            )
        }
        None => sentence.to_string(),
    }
}

fn default_sentence(word: &str) -> String {
    format!("People keep competing for nothing—完全{word}了.")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuizOption {
    pub text: String,
    pub correct: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuizQuestion {
    pub word: String,
    /// Raw prompt sentence.
    pub sentence: String,
    /// Prompt with the word wrapped by `MARK_OPEN`/`MARK_CLOSE`.
    pub marked: String,
    pub options: Vec<QuizOption>,
}

impl QuizQuestion {
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| o.correct)
    }

    /// `(before, word, after)` around the first occurrence of the word, for
    /// renderers that build text nodes instead of markup.
    pub fn segments(&self) -> Option<(&str, &str, &str)> {
        let idx = self.sentence.find(self.word.as_str())?;
        let end = idx + self.word.len();
        Some((
            &self.sentence[..idx],
            &self.sentence[idx..end],
            &self.sentence[end..],
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizError {
    InsufficientPool { usable: usize },
}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizError::InsufficientPool { usable } => write!(
                f,
                "need at least {OPTION_COUNT} words with meanings, have {usable}"
            ),
        }
    }
}

impl std::error::Error for QuizError {}

pub fn build_question(bank: &WordBank, rng: &mut Rng) -> Result<QuizQuestion, QuizError> {
    let pool = bank.quiz_pool();
    if pool.len() < OPTION_COUNT {
        return Err(QuizError::InsufficientPool { usable: pool.len() });
    }
    let answer: &WordEntry = pool[rng.index(pool.len())];

    let contexts: Vec<&str> = answer.eligible_contexts().collect();
    let sentence = match rng.choose(&contexts) {
        Some(s) => s.to_string(),
        None => default_sentence(&answer.word),
    };
    let marked = wrap_marked_word(&sentence, &answer.word);

    let mut others: Vec<&WordEntry> = pool.into_iter().filter(|e| e.word != answer.word).collect();
    if others.len() < OPTION_COUNT - 1 {
        return Err(QuizError::InsufficientPool { usable: others.len() + 1 });
    }
    rng.shuffle(&mut others);

    let mut options = vec![QuizOption {
        text: answer.meaning.clone(),
        correct: true,
    }];
    options.extend(others.iter().take(OPTION_COUNT - 1).map(|e| QuizOption {
        text: e.meaning.clone(),
        correct: false,
    }));
    rng.shuffle(&mut options);

    Ok(QuizQuestion {
        word: answer.word.clone(),
        sentence,
        marked,
        options,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizState {
    Presenting,
    Correct,
    Incorrect,
    /// Terminal: the quiz surface is torn down and battle begins.
    Advanced,
}

#[derive(Debug)]
pub struct QuizEngine {
    state: QuizState,
    question: Option<QuizQuestion>,
}

impl Default for QuizEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizEngine {
    pub fn new() -> Self {
        Self {
            state: QuizState::Presenting,
            question: None,
        }
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn question(&self) -> Option<&QuizQuestion> {
        self.question.as_ref()
    }

    /// Replace the current question with a fresh one. On an insufficient
    /// pool the previous question is dropped and nothing is presented.
    pub fn present(&mut self, bank: &WordBank, rng: &mut Rng) -> Result<&QuizQuestion, QuizError> {
        self.state = QuizState::Presenting;
        self.question = None;
        let q = build_question(bank, rng)?;
        Ok(self.question.insert(q))
    }

    /// Score the option at `index`. Ignored unless a question is presenting.
    pub fn answer(&mut self, index: usize) -> Option<QuizState> {
        if self.state != QuizState::Presenting {
            return None;
        }
        let option = self.question.as_ref()?.options.get(index)?;
        self.state = if option.correct {
            QuizState::Correct
        } else {
            QuizState::Incorrect
        };
        Some(self.state)
    }

    /// Dwell over: `Correct` advances, `Incorrect` loops to a new question.
    pub fn finish_dwell(&mut self, bank: &WordBank, rng: &mut Rng) -> Result<QuizState, QuizError> {
        match self.state {
            QuizState::Correct => {
                self.state = QuizState::Advanced;
                self.question = None;
            }
            QuizState::Incorrect => {
                self.present(bank, rng)?;
            }
            QuizState::Presenting | QuizState::Advanced => {}
        }
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slang_bank() -> WordBank {
        WordBank::new(vec![
            WordEntry::new("内卷", "M1", &["这也太内卷了"]),
            WordEntry::new("摆烂", "M2", &[]),
            WordEntry::new("躺平", "M3", &["no word here"]),
        ])
    }

    #[test]
    fn wrap_marks_first_occurrence_only() {
        let s = wrap_marked_word("内卷 and 内卷", "内卷");
        assert_eq!(s, "<span class=\"zh\">内卷</span> and 内卷");
    }

    #[test]
    fn wrap_is_idempotent() {
        let once = wrap_marked_word("so 躺平 today", "躺平");
        assert_eq!(wrap_marked_word(&once, "躺平"), once);
    }

    #[test]
    fn wrap_without_match_is_identity() {
        assert_eq!(wrap_marked_word("hello", "内卷"), "hello");
        assert_eq!(wrap_marked_word("hello", ""), "hello");
    }

    #[test]
    fn question_is_well_formed() {
        let bank = slang_bank();
        let mut rng = Rng::new(11);
        for _ in 0..200 {
            let q = build_question(&bank, &mut rng).unwrap();
            assert_eq!(q.options.len(), OPTION_COUNT);
            assert_eq!(q.options.iter().filter(|o| o.correct).count(), 1);
            let answer = bank.lookup(&q.word).unwrap();
            let correct = &q.options[q.correct_index().unwrap()];
            assert_eq!(correct.text, answer.meaning);
            let wrong: Vec<&str> = q.options.iter().filter(|o| !o.correct).map(|o| o.text.as_str()).collect();
            assert_ne!(wrong[0], wrong[1]);
            assert!(!wrong.contains(&answer.meaning.as_str()));
            assert!(q.sentence.contains(&q.word));
            assert_eq!(q.marked.matches(MARK_OPEN).count(), 1);
        }
    }

    #[test]
    fn ineligible_contexts_fall_back_to_default_sentence() {
        let bank = slang_bank();
        let mut rng = Rng::new(5);
        for _ in 0..100 {
            let q = build_question(&bank, &mut rng).unwrap();
            if q.word == "躺平" {
                assert_eq!(q.sentence, "People keep competing for nothing—完全躺平了.");
            }
            if q.word == "内卷" {
                assert_eq!(q.sentence, "这也太内卷了");
            }
        }
    }

    #[test]
    fn small_pool_is_rejected() {
        let bank = WordBank::new(vec![WordEntry::new("a", "A", &[]), WordEntry::new("b", "B", &[])]);
        let mut rng = Rng::new(1);
        assert_eq!(
            build_question(&bank, &mut rng).unwrap_err(),
            QuizError::InsufficientPool { usable: 2 }
        );
    }

    #[test]
    fn duplicate_words_do_not_count_as_distractors() {
        let bank = WordBank::new(vec![
            WordEntry::new("a", "A", &[]),
            WordEntry::new("a", "A2", &[]),
            WordEntry::new("a", "A3", &[]),
        ]);
        let mut rng = Rng::new(1);
        assert!(build_question(&bank, &mut rng).is_err());
    }

    #[test]
    fn correct_answer_advances_after_dwell() {
        let bank = slang_bank();
        let mut rng = Rng::new(2);
        let mut quiz = QuizEngine::new();
        let idx = quiz.present(&bank, &mut rng).unwrap().correct_index().unwrap();
        assert_eq!(quiz.answer(idx), Some(QuizState::Correct));
        assert_eq!(quiz.answer(idx), None, "answers during dwell are ignored");
        assert_eq!(quiz.finish_dwell(&bank, &mut rng), Ok(QuizState::Advanced));
        assert!(quiz.question().is_none());
    }

    #[test]
    fn wrong_answer_loops_to_new_question() {
        let bank = slang_bank();
        let mut rng = Rng::new(3);
        let mut quiz = QuizEngine::new();
        let q = quiz.present(&bank, &mut rng).unwrap();
        let wrong = q.options.iter().position(|o| !o.correct).unwrap();
        assert_eq!(quiz.answer(wrong), Some(QuizState::Incorrect));
        assert_eq!(quiz.finish_dwell(&bank, &mut rng), Ok(QuizState::Presenting));
        assert!(quiz.question().is_some());
    }

    #[test]
    fn segments_split_around_word() {
        let q = QuizQuestion {
            word: "躺平".into(),
            sentence: "I'll just 躺平 this week.".into(),
            marked: String::new(),
            options: vec![],
        };
        assert_eq!(q.segments(), Some(("I'll just ", "躺平", " this week.")));
    }
}
