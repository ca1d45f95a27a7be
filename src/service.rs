//! Collaborator-facing facade
//!
//! Everything a UI layer needs: word CRUD, search, live streams, the selected language and quiz
//! sessions. The active language is always passed explicitly; the stored setting is only a
//! preference the caller may read.

use crate::config::Config;
use crate::quiz::{ArticleQuiz, TranslationQuiz};
use crate::storage::{
    Language, LiveStream, Storage, StorageError, StorageResult, WordDraft, WordRepository,
    WordWithTranslations,
};
use futures_util::stream::BoxStream;

#[derive(Clone)]
pub struct VocabularyService {
    storage: Storage,
}

impl VocabularyService {
    /// Open the database named by `config`, creating its directory first.
    pub fn open(config: &Config) -> StorageResult<Self> {
        config.ensure_data_dir().map_err(|e| {
            StorageError::StorageUnavailable(format!(
                "cannot create {}: {}",
                config.database_path.display(),
                e
            ))
        })?;

        Ok(Self::new(Storage::open(&config.database_path)?))
    }

    pub fn in_memory() -> StorageResult<Self> {
        Ok(Self::new(Storage::in_memory()?))
    }

    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn words(&self) -> WordRepository {
        self.storage.words()
    }

    // ==================== Word store ====================

    pub fn create_word(&self, draft: &WordDraft) -> StorageResult<i64> {
        self.words().create_word(draft)
    }

    pub fn update_word(&self, id: i64, draft: &WordDraft) -> StorageResult<()> {
        self.words().update_word(id, draft)
    }

    pub fn delete_word(&self, id: i64) -> StorageResult<bool> {
        self.words().delete_word(id)
    }

    pub fn get_word(&self, id: i64) -> StorageResult<Option<WordWithTranslations>> {
        self.words().get_word(id)
    }

    pub fn list_words(&self, language: Language) -> StorageResult<Vec<WordWithTranslations>> {
        self.words().list_words(language)
    }

    pub fn list_all_words(&self) -> StorageResult<Vec<WordWithTranslations>> {
        self.words().list_all_words()
    }

    pub fn count_words(&self, language: Language) -> StorageResult<i64> {
        self.words().count_words(language)
    }

    pub fn search(&self, query: &str, language: Language) -> StorageResult<Vec<WordWithTranslations>> {
        self.words().search(query, language)
    }

    pub fn sample_random_words(
        &self,
        language: Language,
        count: usize,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        self.words().sample_random_words(language, count)
    }

    pub fn watch_words(&self, language: Language) -> LiveStream<Vec<WordWithTranslations>> {
        self.words().watch_words(language)
    }

    pub fn watch_search(
        &self,
        query: impl Into<String>,
        language: Language,
    ) -> LiveStream<Vec<WordWithTranslations>> {
        self.words().watch_search(query, language)
    }

    /// Regenerate the search index; returns the number of indexed words.
    pub fn rebuild_search_index(&self) -> StorageResult<usize> {
        self.storage.search_index().rebuild()
    }

    // ==================== Settings ====================

    pub fn selected_language(&self) -> Language {
        self.storage.settings().selected_language()
    }

    pub fn set_selected_language(&self, language: Language) -> StorageResult<()> {
        self.storage.settings().set_selected_language(language)
    }

    pub fn watch_selected_language(&self) -> BoxStream<'static, Language> {
        self.storage.settings().watch_selected_language()
    }

    // ==================== Quiz ====================

    pub fn translation_quiz(&self) -> TranslationQuiz<WordRepository> {
        TranslationQuiz::new(self.words())
    }

    pub fn seeded_translation_quiz(&self, seed: u64) -> TranslationQuiz<WordRepository> {
        TranslationQuiz::with_seed(self.words(), seed)
    }

    pub fn article_quiz(&self) -> ArticleQuiz<WordRepository> {
        ArticleQuiz::new(self.words())
    }
}

/// Message to show the user for a failed operation
pub fn user_message(err: &StorageError) -> String {
    match err {
        StorageError::Validation(e) => format!("Please check the input: {}", e),
        StorageError::Conflict(_) => "This word is already in the dictionary.".to_string(),
        StorageError::NotFound(_) => "The word no longer exists.".to_string(),
        StorageError::StorageUnavailable(e) => format!("The dictionary cannot be accessed: {}", e),
        StorageError::Database(e) => format!("Database error: {}", e),
        StorageError::Migration(e) => format!("Database upgrade failed: {}", e),
        StorageError::Serialization(e) => format!("Stored data is unreadable: {}", e),
        StorageError::LockError(e) => format!("The dictionary is busy: {}", e),
    }
}
