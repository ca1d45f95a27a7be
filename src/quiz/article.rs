//! Article + translation quiz
//!
//! One random word is shown; the user types its translation and, for nouns, the article that
//! goes with it. The article is read off the first token of the stored full word.

use futures_util::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{answer_matches, ExhaustedReason, QuizError, QuizResult, WordSource};
use crate::storage::models::{Gender, Language, WordWithTranslations};

const FRENCH_ARTICLES: [&str; 5] = ["le", "la", "les", "un", "une"];
const ROMANIAN_ARTICLES: [&str; 3] = ["un", "o", "niște"];

/// French elided article, written with either apostrophe
const ELIDED_ARTICLES: [&str; 2] = ["l'", "l\u{2019}"];

/// Split a full word into `(article, rest)` when it starts with an article of `language`.
///
/// The elided French form is returned as `l'` whatever apostrophe was stored.
pub fn split_article(full_word: &str, language: Language) -> Option<(String, String)> {
    let full_word = full_word.trim();

    if language == Language::French {
        for elided in ELIDED_ARTICLES {
            if let Some(rest) = full_word.strip_prefix(elided) {
                let rest = rest.trim_start();
                return (!rest.is_empty()).then(|| ("l'".to_string(), rest.to_string()));
            }
        }
    }

    let (first, rest) = full_word.split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }

    let first = first.to_lowercase();
    let articles: &[&str] = match language {
        Language::French => &FRENCH_ARTICLES,
        Language::Romanian => &ROMANIAN_ARTICLES,
    };

    if articles.contains(&first.as_str()) {
        Some((first, rest.to_string()))
    } else {
        None
    }
}

fn normalize_article(raw: &str) -> String {
    raw.trim().replace('\u{2019}', "'")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleQuestion {
    pub word_id: i64,
    pub language: Language,
    pub gender: Option<Gender>,
    /// Word without its article when the article is asked, otherwise the full word
    pub prompt: String,
    pub has_article_prompt: bool,
    #[serde(skip_serializing)]
    pub expected_article: Option<String>,
    #[serde(skip_serializing)]
    pub translations: Vec<String>,
}

impl ArticleQuestion {
    fn from_word(word: &WordWithTranslations) -> Self {
        let language = word.word.language;
        let split = word
            .word
            .gender
            .and_then(|_| split_article(&word.word.full_word, language));

        let (expected_article, prompt) = match split {
            Some((article, stem)) => (Some(article), stem),
            None => (None, word.word.full_word.clone()),
        };

        Self {
            word_id: word.id(),
            language,
            gender: word.word.gender,
            prompt,
            has_article_prompt: expected_article.is_some(),
            expected_article,
            translations: word.translations.iter().map(|t| t.text.clone()).collect(),
        }
    }
}

/// Combined result of one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleVerdict {
    AllCorrect,
    ArticleOnly,
    TranslationOnly,
    Neither,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleOutcome {
    pub verdict: ArticleVerdict,
    /// `None` when the question did not ask for an article
    pub article_correct: Option<bool>,
    pub translation_correct: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArticleQuizState {
    Idle,
    Loading,
    QuestionReady {
        question: ArticleQuestion,
    },
    Answered {
        question: ArticleQuestion,
        outcome: ArticleOutcome,
    },
    Exhausted {
        reason: ExhaustedReason,
    },
}

impl ArticleQuizState {
    pub fn question(&self) -> Option<&ArticleQuestion> {
        match self {
            ArticleQuizState::QuestionReady { question }
            | ArticleQuizState::Answered { question, .. } => Some(question),
            _ => None,
        }
    }
}

/// Free-text quiz session
pub struct ArticleQuiz<S: WordSource> {
    source: S,
    state: watch::Sender<ArticleQuizState>,
}

impl<S: WordSource> ArticleQuiz<S> {
    pub fn new(source: S) -> Self {
        let (state, _) = watch::channel(ArticleQuizState::Idle);
        Self { source, state }
    }

    pub fn state(&self) -> ArticleQuizState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ArticleQuizState> {
        self.state.subscribe()
    }

    pub fn states(&self) -> BoxStream<'static, ArticleQuizState> {
        WatchStream::new(self.subscribe()).boxed()
    }

    pub fn load_next_question(&mut self, language: Language) -> QuizResult<ArticleQuizState> {
        self.state.send_replace(ArticleQuizState::Loading);

        let mut sample = match self.source.sample_random_words(language, 1) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::error!(?language, error = %e, "failed to sample quiz word");
                self.state.send_replace(ArticleQuizState::Idle);
                return Err(e.into());
            }
        };

        let next = match sample.pop() {
            None => ArticleQuizState::Exhausted {
                reason: ExhaustedReason::NoWords,
            },
            Some(word) if word.translations.is_empty() => ArticleQuizState::Exhausted {
                reason: ExhaustedReason::MissingTranslation { word_id: word.id() },
            },
            Some(word) => {
                let question = ArticleQuestion::from_word(&word);
                tracing::debug!(
                    ?language,
                    word_id = question.word_id,
                    has_article_prompt = question.has_article_prompt,
                    "article question ready"
                );
                ArticleQuizState::QuestionReady { question }
            }
        };

        if let ArticleQuizState::Exhausted { reason } = &next {
            tracing::info!(?language, ?reason, "article quiz exhausted");
        }

        self.state.send_replace(next.clone());
        Ok(next)
    }

    /// Grade a typed answer. `user_article` is ignored when no article is asked.
    pub fn submit_answer(
        &mut self,
        user_article: Option<&str>,
        user_translation: &str,
    ) -> QuizResult<ArticleOutcome> {
        let question = self
            .state
            .borrow()
            .question()
            .cloned()
            .ok_or(QuizError::NoActiveQuestion)?;

        let outcome = grade(&question, user_article, user_translation);
        self.state.send_replace(ArticleQuizState::Answered {
            question,
            outcome: outcome.clone(),
        });

        Ok(outcome)
    }
}

fn grade(question: &ArticleQuestion, user_article: Option<&str>, user_translation: &str) -> ArticleOutcome {
    let translation_correct = question
        .translations
        .iter()
        .any(|expected| answer_matches(user_translation, expected));
    let expected_translation = question.translations.join(", ");

    let Some(expected_article) = question.expected_article.as_deref() else {
        let (verdict, message) = if translation_correct {
            (ArticleVerdict::AllCorrect, "Correct!".to_string())
        } else {
            (
                ArticleVerdict::Neither,
                format!("Incorrect. The right translation is '{}'.", expected_translation),
            )
        };
        return ArticleOutcome {
            verdict,
            article_correct: None,
            translation_correct,
            message,
        };
    };

    let article_correct = user_article
        .map(|a| answer_matches(&normalize_article(a), expected_article))
        .unwrap_or(false);

    let (verdict, message) = match (article_correct, translation_correct) {
        (true, true) => (ArticleVerdict::AllCorrect, "Excellent! Everything is correct!".to_string()),
        (true, false) => (
            ArticleVerdict::ArticleOnly,
            format!(
                "The article is right but the translation is not. The right translation is '{}'.",
                expected_translation
            ),
        ),
        (false, true) => (
            ArticleVerdict::TranslationOnly,
            format!(
                "The translation is right but the article is not. The right article is '{}'.",
                expected_article
            ),
        ),
        (false, false) => (
            ArticleVerdict::Neither,
            format!(
                "Incorrect. The right article is '{}' and the right translation is '{}'.",
                expected_article, expected_translation
            ),
        ),
    };

    ArticleOutcome {
        verdict,
        article_correct: Some(article_correct),
        translation_correct,
        message,
    }
}
