//! Data model
//!
//! Row types for `words` / `translations`, the language and gender enums with their on-disk
//! codes, and [`WordDraft`], the validated input for creating or editing a word.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Result as SqliteResult, Row};
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StorageResult};

// ============================================================
// Language
// ============================================================

/// Language a word belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    #[default]
    French,
    Romanian,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::French, Language::Romanian];

    /// Code stored in the `language` column
    pub fn code(self) -> i64 {
        match self {
            Language::French => 1,
            Language::Romanian => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Language::French),
            2 => Some(Language::Romanian),
            _ => None,
        }
    }

    /// Whether nouns of this language can carry `gender`
    pub fn allows_gender(self, gender: Gender) -> bool {
        match gender {
            Gender::Neuter => self == Language::Romanian,
            Gender::Masculine | Gender::Feminine => true,
        }
    }
}

impl ToSql for Language {
    fn to_sql(&self) -> SqliteResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Language {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        Language::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

// ============================================================
// Gender
// ============================================================

/// Grammatical gender of a noun
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Masculine,
    Feminine,
    Neuter,
}

impl Gender {
    /// Code stored in the `gender` column
    pub fn code(self) -> i64 {
        match self {
            Gender::Feminine => 1,
            Gender::Masculine => 2,
            Gender::Neuter => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Gender::Feminine),
            2 => Some(Gender::Masculine),
            3 => Some(Gender::Neuter),
            _ => None,
        }
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> SqliteResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        Gender::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

// ============================================================
// Word / Translation
// ============================================================

/// One vocabulary item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: i64,
    /// Full form including any article, e.g. "le chat". Stored lowercase.
    pub full_word: String,
    /// `Some` iff the word is a noun
    pub gender: Option<Gender>,
    pub language: Language,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Word {
    pub(crate) const COLUMNS: &'static str =
        "w.id AS id, w.full_word AS full_word, w.gender AS gender, w.language AS language, \
         w.created_at AS created_at, w.updated_at AS updated_at";

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            full_word: row.get("full_word")?,
            gender: row.get("gender")?,
            language: row.get("language")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
        })
    }
}

/// One meaning of a [`Word`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub word_id: i64,
    pub text: String,
}

impl Translation {
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            word_id: row.get("word_id")?,
            text: row.get("text")?,
        })
    }
}

/// A word together with its full translation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordWithTranslations {
    #[serde(flatten)]
    pub word: Word,
    /// Ordered by insertion
    pub translations: Vec<Translation>,
}

impl WordWithTranslations {
    pub fn id(&self) -> i64 {
        self.word.id
    }

    /// First stored translation, used as the prompt of a translation quiz
    pub fn primary_translation(&self) -> Option<&str> {
        self.translations.first().map(|t| t.text.as_str())
    }

    pub fn translation_texts(&self) -> Vec<&str> {
        self.translations.iter().map(|t| t.text.as_str()).collect()
    }
}

// ============================================================
// WordDraft - create / update input
// ============================================================

/// User input for creating or editing a word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordDraft {
    pub full_word: String,
    pub gender: Option<Gender>,
    pub language: Language,
    pub translations: Vec<String>,
    /// Nouns must carry a gender; for other words the gender is dropped.
    pub is_noun: bool,
}

impl WordDraft {
    pub fn new(
        full_word: impl Into<String>,
        gender: Option<Gender>,
        language: Language,
        translations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            full_word: full_word.into(),
            gender,
            language,
            translations: translations.into_iter().map(Into::into).collect(),
            is_noun: gender.is_some(),
        }
    }

    pub fn with_noun(mut self, is_noun: bool) -> Self {
        self.is_noun = is_noun;
        self
    }

    /// Validate and normalize (trim + lowercase) for storage.
    pub fn normalize(&self) -> StorageResult<NormalizedWord> {
        let full_word = normalize_text(&self.full_word);
        if full_word.is_empty() {
            return Err(StorageError::Validation("word must not be blank".into()));
        }

        if self.translations.is_empty() {
            return Err(StorageError::Validation(
                "at least one translation is required".into(),
            ));
        }

        let mut translations: Vec<String> = Vec::with_capacity(self.translations.len());
        for raw in &self.translations {
            let text = normalize_text(raw);
            if text.is_empty() {
                return Err(StorageError::Validation(
                    "translations must not be blank".into(),
                ));
            }
            if !translations.contains(&text) {
                translations.push(text);
            }
        }

        let gender = if self.is_noun {
            match self.gender {
                Some(gender) => Some(gender),
                None => {
                    return Err(StorageError::Validation(
                        "gender is required for nouns".into(),
                    ))
                }
            }
        } else {
            None
        };

        if let Some(gender) = gender {
            if !self.language.allows_gender(gender) {
                return Err(StorageError::Validation(format!(
                    "{:?} gender is not valid for {:?} words",
                    gender, self.language
                )));
            }
        }

        Ok(NormalizedWord {
            full_word,
            gender,
            language: self.language,
            translations,
        })
    }
}

/// A [`WordDraft`] that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWord {
    pub full_word: String,
    pub gender: Option<Gender>,
    pub language: Language,
    pub translations: Vec<String>,
}

/// Trim surrounding whitespace and lowercase.
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ============================================================
// Helpers
// ============================================================

pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return dt.with_timezone(&Utc);
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S") {
        return DateTime::from_naive_utc_and_offset(dt, Utc);
    }

    tracing::warn!(value = %s, "unparseable timestamp, falling back to epoch");
    DateTime::<Utc>::default()
}

pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
