//! Quiz engine
//!
//! Two quiz sessions built on random samples from the word store:
//! - [`choice::TranslationQuiz`]: a translation prompt with four word options
//! - [`article::ArticleQuiz`]: type the article and a translation of one word
//!
//! Sessions never write to storage. "Not enough words" is a normal terminal state
//! ([`ExhaustedReason`]), not an error; the caller decides when to load again.

pub mod article;
pub mod choice;

pub use article::{ArticleOutcome, ArticleQuestion, ArticleQuiz, ArticleQuizState, ArticleVerdict};
pub use choice::{ChoiceOption, ChoiceOutcome, ChoiceQuestion, ChoiceQuizState, TranslationQuiz};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::storage::models::{Gender, Language, WordWithTranslations};
use crate::storage::{StorageError, StorageResult, WordRepository};

// ==================== Constants ====================

/// Words drawn per multiple-choice question
pub const CHOICE_SAMPLE_SIZE: usize = 10;

/// Wrong options shown next to the correct one
pub const DISTRACTOR_COUNT: usize = 3;

/// Smallest sample that can form a multiple-choice question
pub const MIN_CHOICE_WORDS: usize = DISTRACTOR_COUNT + 1;

/// Option background colors (ARGB), keyed by gender
pub const FEMININE_COLOR: u32 = 0xFFF8_BBD0;
pub const MASCULINE_COLOR: u32 = 0xFFB3_E5FC;
pub const NEUTER_COLOR: u32 = 0xFFC8_E6C9;
pub const DEFAULT_COLOR: u32 = 0xFFE0_E0E0;

/// Fixed display color for a gender tag
pub fn gender_color(gender: Option<Gender>) -> u32 {
    match gender {
        Some(Gender::Feminine) => FEMININE_COLOR,
        Some(Gender::Masculine) => MASCULINE_COLOR,
        Some(Gender::Neuter) => NEUTER_COLOR,
        None => DEFAULT_COLOR,
    }
}

// ==================== Word source ====================

/// Where quiz sessions draw their words from
pub trait WordSource: Send + Sync {
    /// Up to `count` distinct random words of `language`; fewer on shortage.
    fn sample_random_words(
        &self,
        language: Language,
        count: usize,
    ) -> StorageResult<Vec<WordWithTranslations>>;
}

impl WordSource for WordRepository {
    fn sample_random_words(
        &self,
        language: Language,
        count: usize,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        WordRepository::sample_random_words(self, language, count)
    }
}

// ==================== Outcomes ====================

/// Why a session cannot produce a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExhaustedReason {
    /// The language has no words at all
    NoWords,
    /// Fewer words than the quiz needs
    InsufficientWords { available: usize, required: usize },
    /// Not enough distinct words besides the correct one
    InsufficientDistractors { available: usize, required: usize },
    /// The drawn word has no translation to quiz on
    MissingTranslation { word_id: i64 },
}

impl fmt::Display for ExhaustedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustedReason::NoWords => {
                write!(f, "There are no words to practice. Add words to the dictionary.")
            }
            ExhaustedReason::InsufficientWords {
                available,
                required,
            } => write!(
                f,
                "Not enough words to start the quiz: {} stored, {} needed.",
                available, required
            ),
            ExhaustedReason::InsufficientDistractors {
                available,
                required,
            } => write!(
                f,
                "Not enough words to build answer options: {} available, {} needed.",
                available, required
            ),
            ExhaustedReason::MissingTranslation { word_id } => {
                write!(f, "Word {} has no translation to practice.", word_id)
            }
        }
    }
}

/// Quiz session error
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("no question is waiting for an answer")]
    NoActiveQuestion,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type QuizResult<T> = Result<T, QuizError>;

// ==================== Helpers ====================

pub(crate) fn session_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Trimmed, case-insensitive comparison of a user answer
pub(crate) fn answer_matches(answer: &str, expected: &str) -> bool {
    answer.trim().to_lowercase() == expected.trim().to_lowercase()
}
