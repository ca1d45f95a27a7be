//! Multiple-choice translation quiz
//!
//! One translation is shown as the prompt; the user picks the matching word among four
//! options (the correct word plus three distractors from the same random sample).

use futures_util::stream::{BoxStream, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{
    gender_color, session_rng, ExhaustedReason, QuizError, QuizResult, WordSource,
    CHOICE_SAMPLE_SIZE, DISTRACTOR_COUNT, MIN_CHOICE_WORDS,
};
use crate::storage::models::{Gender, Language, WordWithTranslations};

/// One selectable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub word_id: i64,
    pub full_word: String,
    pub gender: Option<Gender>,
    /// ARGB background for the option, see [`gender_color`]
    pub display_color: u32,
}

impl ChoiceOption {
    fn from_word(word: &WordWithTranslations) -> Self {
        Self {
            word_id: word.id(),
            full_word: word.word.full_word.clone(),
            gender: word.word.gender,
            display_color: gender_color(word.word.gender),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceQuestion {
    pub language: Language,
    /// First translation of the correct word
    pub prompt: String,
    /// Correct word and distractors in display order
    pub options: Vec<ChoiceOption>,
    pub correct_word_id: i64,
    pub correct_word: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOutcome {
    pub correct: bool,
    pub selected_word_id: i64,
    pub correct_word_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChoiceQuizState {
    Idle,
    Loading,
    QuestionReady {
        question: ChoiceQuestion,
    },
    Answered {
        question: ChoiceQuestion,
        outcome: ChoiceOutcome,
    },
    Exhausted {
        reason: ExhaustedReason,
    },
}

impl ChoiceQuizState {
    pub fn question(&self) -> Option<&ChoiceQuestion> {
        match self {
            ChoiceQuizState::QuestionReady { question }
            | ChoiceQuizState::Answered { question, .. } => Some(question),
            _ => None,
        }
    }
}

/// Translation quiz session
pub struct TranslationQuiz<S: WordSource> {
    source: S,
    rng: ChaCha8Rng,
    state: watch::Sender<ChoiceQuizState>,
}

impl<S: WordSource> TranslationQuiz<S> {
    pub fn new(source: S) -> Self {
        Self::build(source, None)
    }

    /// Reproducible session: the same seed over the same samples gives the same questions.
    pub fn with_seed(source: S, seed: u64) -> Self {
        Self::build(source, Some(seed))
    }

    fn build(source: S, seed: Option<u64>) -> Self {
        let (state, _) = watch::channel(ChoiceQuizState::Idle);
        Self {
            source,
            rng: session_rng(seed),
            state,
        }
    }

    pub fn state(&self) -> ChoiceQuizState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChoiceQuizState> {
        self.state.subscribe()
    }

    /// Current state first, then every transition.
    pub fn states(&self) -> BoxStream<'static, ChoiceQuizState> {
        WatchStream::new(self.subscribe()).boxed()
    }

    /// Draw a fresh question for `language`.
    ///
    /// Too few words ends in [`ChoiceQuizState::Exhausted`]. A storage failure is returned
    /// and leaves the session [`ChoiceQuizState::Idle`].
    pub fn load_next_question(&mut self, language: Language) -> QuizResult<ChoiceQuizState> {
        self.state.send_replace(ChoiceQuizState::Loading);

        let sample = match self.source.sample_random_words(language, CHOICE_SAMPLE_SIZE) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::error!(?language, error = %e, "failed to sample quiz words");
                self.state.send_replace(ChoiceQuizState::Idle);
                return Err(e.into());
            }
        };

        let next = match build_question(language, sample, &mut self.rng) {
            Ok(question) => {
                tracing::debug!(
                    ?language,
                    correct_word_id = question.correct_word_id,
                    "translation question ready"
                );
                ChoiceQuizState::QuestionReady { question }
            }
            Err(reason) => {
                tracing::info!(?language, ?reason, "translation quiz exhausted");
                ChoiceQuizState::Exhausted { reason }
            }
        };

        self.state.send_replace(next.clone());
        Ok(next)
    }

    /// Check `selected_word_id` against the current question.
    ///
    /// Answering again after a result is allowed; the latest outcome replaces the previous one.
    pub fn submit_answer(&mut self, selected_word_id: i64) -> QuizResult<ChoiceOutcome> {
        let question = self
            .state
            .borrow()
            .question()
            .cloned()
            .ok_or(QuizError::NoActiveQuestion)?;

        let outcome = grade(&question, selected_word_id);
        self.state.send_replace(ChoiceQuizState::Answered {
            question,
            outcome: outcome.clone(),
        });

        Ok(outcome)
    }
}

/// Build a question from a random sample, or say why none can be built.
pub(crate) fn build_question<R: Rng + ?Sized>(
    language: Language,
    sample: Vec<WordWithTranslations>,
    rng: &mut R,
) -> Result<ChoiceQuestion, ExhaustedReason> {
    let mut seen = HashSet::new();
    let mut words: Vec<WordWithTranslations> =
        sample.into_iter().filter(|w| seen.insert(w.id())).collect();

    if words.len() < MIN_CHOICE_WORDS {
        return Err(ExhaustedReason::InsufficientWords {
            available: words.len(),
            required: MIN_CHOICE_WORDS,
        });
    }

    // Only words with a translation can be the prompt.
    let candidates: Vec<usize> = (0..words.len())
        .filter(|&i| words[i].primary_translation().is_some())
        .collect();
    let Some(&correct_index) = candidates.choose(rng) else {
        return Err(ExhaustedReason::MissingTranslation {
            word_id: words[0].id(),
        });
    };

    let correct = words.swap_remove(correct_index);
    let prompt = correct
        .primary_translation()
        .map(str::to_string)
        .unwrap_or_default();

    if words.len() < DISTRACTOR_COUNT {
        return Err(ExhaustedReason::InsufficientDistractors {
            available: words.len(),
            required: DISTRACTOR_COUNT,
        });
    }

    let mut options: Vec<ChoiceOption> = words
        .choose_multiple(rng, DISTRACTOR_COUNT)
        .map(ChoiceOption::from_word)
        .collect();
    options.push(ChoiceOption::from_word(&correct));
    options.shuffle(rng);

    Ok(ChoiceQuestion {
        language,
        prompt,
        options,
        correct_word_id: correct.id(),
        correct_word: correct.word.full_word,
    })
}

fn grade(question: &ChoiceQuestion, selected_word_id: i64) -> ChoiceOutcome {
    let correct = selected_word_id == question.correct_word_id;
    let message = if correct {
        "Correct!".to_string()
    } else {
        format!("Incorrect. The right answer is '{}'.", question.correct_word)
    };

    ChoiceOutcome {
        correct,
        selected_word_id,
        correct_word_id: question.correct_word_id,
        message,
    }
}
