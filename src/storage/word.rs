//! Word and translation persistence
//!
//! CRUD over `words` and `translations`, scoped by language.
//!
//! A word and its translation set are always written together in one transaction, together
//! with the word's search index row. Editing replaces the whole translation set.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::storage::collation::WORD_COLLATION;
use crate::storage::models::{
    format_datetime, Language, NormalizedWord, Translation, Word, WordDraft, WordWithTranslations,
};
use crate::storage::search::SearchIndex;
use crate::storage::{lock_connection, ChangeNotifier, LiveStream, StorageError, StorageResult, StoreChange};

/// Ids bound per `IN (...)` query when loading translations
const TRANSLATION_BATCH_SIZE: usize = 500;

/// Word repository
///
/// Public methods lock the shared connection; the `*_internal` functions take a
/// `&Connection` so they can run inside an already open transaction.
#[derive(Clone)]
pub struct WordRepository {
    conn: Arc<Mutex<Connection>>,
    changes: ChangeNotifier,
}

impl WordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>, changes: ChangeNotifier) -> Self {
        Self { conn, changes }
    }

    /// Run `f` in a transaction while holding the connection lock.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let mut conn = lock_connection(&self.conn)?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ============================================================
    // Mutations
    // ============================================================

    /// Create a word with its translations. Returns the new word id.
    ///
    /// # Errors
    /// * `Validation` - blank word, no translations, blank translation, gender rules
    /// * `Conflict` - the `(full_word, language)` pair already exists
    pub fn create_word(&self, draft: &WordDraft) -> StorageResult<i64> {
        let word = draft.normalize()?;
        let id = self.write(|conn| Self::create_word_internal(conn, &word))?;

        tracing::info!(word_id = id, language = ?word.language, "word created");
        self.changes.notify(StoreChange::Words(word.language));
        Ok(id)
    }

    /// Replace a word's fields and its whole translation set.
    ///
    /// # Errors
    /// * `Validation` - same rules as [`Self::create_word`]
    /// * `NotFound` - no word with `id`
    /// * `Conflict` - another word already uses the new `(full_word, language)`
    pub fn update_word(&self, id: i64, draft: &WordDraft) -> StorageResult<()> {
        let word = draft.normalize()?;
        let previous_language = self.write(|conn| Self::update_word_internal(conn, id, &word))?;

        tracing::info!(word_id = id, language = ?word.language, "word updated");
        self.changes.notify(StoreChange::Words(word.language));
        if previous_language != word.language {
            self.changes.notify(StoreChange::Words(previous_language));
        }
        Ok(())
    }

    /// Delete a word, its translations and its index row.
    ///
    /// Idempotent: returns `false` when there was nothing to delete.
    pub fn delete_word(&self, id: i64) -> StorageResult<bool> {
        let deleted = self.write(|conn| Self::delete_word_internal(conn, id))?;

        match deleted {
            Some(language) => {
                tracing::info!(word_id = id, ?language, "word deleted");
                self.changes.notify(StoreChange::Words(language));
                Ok(true)
            }
            None => {
                tracing::debug!(word_id = id, "delete of missing word ignored");
                Ok(false)
            }
        }
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Get one word with its translations.
    ///
    /// # Arguments
    /// * `id` - word id returned by [`Self::create_word`]
    ///
    /// # Returns
    /// * `StorageResult<Option<WordWithTranslations>>` - `None` when the id does not exist
    pub fn get_word(&self, id: i64) -> StorageResult<Option<WordWithTranslations>> {
        let conn = lock_connection(&self.conn)?;
        Self::get_word_internal(&conn, id)
    }

    /// All words of a language, ordered by full word.
    pub fn list_words(&self, language: Language) -> StorageResult<Vec<WordWithTranslations>> {
        let conn = lock_connection(&self.conn)?;
        Self::list_words_internal(&conn, language)
    }

    /// Every word of every language, ordered by full word.
    pub fn list_all_words(&self) -> StorageResult<Vec<WordWithTranslations>> {
        let conn = lock_connection(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM words w ORDER BY w.full_word COLLATE {} ASC, w.id ASC",
            Word::COLUMNS,
            WORD_COLLATION
        );
        let mut stmt = conn.prepare(&sql)?;
        let words = stmt
            .query_map([], |row| Word::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_translations(&conn, words)
    }

    /// Number of stored words in `language`
    pub fn count_words(&self, language: Language) -> StorageResult<i64> {
        let conn = lock_connection(&self.conn)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM words WHERE language = ?1",
            params![language],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// Up to `count` distinct words of `language`, drawn uniformly without replacement.
    ///
    /// Returns fewer when the language has fewer words; callers check the length.
    pub fn sample_random_words(
        &self,
        language: Language,
        count: usize,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        let conn = lock_connection(&self.conn)?;
        Self::sample_random_words_internal(&conn, language, count)
    }

    /// Substring search over full words and translations (see [`SearchIndex`]).
    pub fn search(&self, query: &str, language: Language) -> StorageResult<Vec<WordWithTranslations>> {
        let conn = lock_connection(&self.conn)?;
        SearchIndex::search_internal(&conn, query, language)
    }

    // ============================================================
    // Live queries
    // ============================================================

    /// `list_words(language)`, re-emitted after every change to that language.
    pub fn watch_words(&self, language: Language) -> LiveStream<Vec<WordWithTranslations>> {
        let repo = self.clone();
        self.changes
            .live_query(language, move || repo.list_words(language))
    }

    /// `search(query, language)`, re-emitted after every change to that language.
    pub fn watch_search(
        &self,
        query: impl Into<String>,
        language: Language,
    ) -> LiveStream<Vec<WordWithTranslations>> {
        let repo = self.clone();
        let query = query.into();
        self.changes
            .live_query(language, move || repo.search(&query, language))
    }

    // ============================================================
    // Internal implementations (take &Connection)
    // ============================================================

    fn find_word_id(conn: &Connection, full_word: &str, language: Language) -> StorageResult<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM words WHERE full_word = ?1 AND language = ?2",
                params![full_word, language],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    fn insert_translations(conn: &Connection, word_id: i64, translations: &[String]) -> StorageResult<()> {
        let mut stmt = conn.prepare("INSERT INTO translations (word_id, text) VALUES (?1, ?2)")?;
        for text in translations {
            stmt.execute(params![word_id, text])?;
        }

        Ok(())
    }

    pub(crate) fn create_word_internal(conn: &Connection, word: &NormalizedWord) -> StorageResult<i64> {
        if Self::find_word_id(conn, &word.full_word, word.language)?.is_some() {
            return Err(StorageError::Conflict(format!(
                "'{}' already exists for {:?}",
                word.full_word, word.language
            )));
        }

        let now = format_datetime(Utc::now());
        conn.execute(
            r#"
            INSERT INTO words (full_word, gender, language, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![word.full_word, word.gender, word.language, now],
        )?;
        let id = conn.last_insert_rowid();

        Self::insert_translations(conn, id, &word.translations)?;
        SearchIndex::refresh_internal(conn, id)?;

        Ok(id)
    }

    /// Returns the language the word had before the update.
    pub(crate) fn update_word_internal(
        conn: &Connection,
        id: i64,
        word: &NormalizedWord,
    ) -> StorageResult<Language> {
        let previous_language: Language = conn
            .query_row("SELECT language FROM words WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("word {}", id)))?;

        if let Some(existing) = Self::find_word_id(conn, &word.full_word, word.language)? {
            if existing != id {
                return Err(StorageError::Conflict(format!(
                    "'{}' already exists for {:?}",
                    word.full_word, word.language
                )));
            }
        }

        conn.execute(
            r#"
            UPDATE words SET full_word = ?2, gender = ?3, language = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
            params![id, word.full_word, word.gender, word.language, format_datetime(Utc::now())],
        )?;

        conn.execute("DELETE FROM translations WHERE word_id = ?1", params![id])?;
        Self::insert_translations(conn, id, &word.translations)?;
        SearchIndex::refresh_internal(conn, id)?;

        Ok(previous_language)
    }

    /// Returns the deleted word's language, `None` if it did not exist.
    pub(crate) fn delete_word_internal(conn: &Connection, id: i64) -> StorageResult<Option<Language>> {
        let language: Option<Language> = conn
            .query_row("SELECT language FROM words WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        if language.is_none() {
            return Ok(None);
        }

        SearchIndex::remove_internal(conn, id)?;
        conn.execute("DELETE FROM translations WHERE word_id = ?1", params![id])?;
        conn.execute("DELETE FROM words WHERE id = ?1", params![id])?;

        Ok(language)
    }

    pub(crate) fn get_word_internal(conn: &Connection, id: i64) -> StorageResult<Option<WordWithTranslations>> {
        let sql = format!("SELECT {} FROM words w WHERE w.id = ?1", Word::COLUMNS);
        let word = conn
            .query_row(&sql, params![id], |row| Word::from_row(row))
            .optional()?;

        match word {
            Some(word) => Ok(Self::attach_translations(conn, vec![word])?.pop()),
            None => Ok(None),
        }
    }

    pub(crate) fn list_words_internal(
        conn: &Connection,
        language: Language,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM words w
            WHERE w.language = ?1
            ORDER BY w.full_word COLLATE {} ASC, w.id ASC
            "#,
            Word::COLUMNS,
            WORD_COLLATION
        );
        let mut stmt = conn.prepare(&sql)?;
        let words = stmt
            .query_map(params![language], |row| Word::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_translations(conn, words)
    }

    pub(crate) fn sample_random_words_internal(
        conn: &Connection,
        language: Language,
        count: usize,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM words w WHERE w.language = ?1 ORDER BY RANDOM() LIMIT ?2",
            Word::COLUMNS
        );
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&sql)?;
        let words = stmt
            .query_map(params![language, limit], |row| Word::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_translations(conn, words)
    }

    /// Load translations for `words`, keeping the order of `words`.
    pub(crate) fn attach_translations(
        conn: &Connection,
        words: Vec<Word>,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        let ids: Vec<i64> = words.iter().map(|w| w.id).collect();
        let mut by_word: HashMap<i64, Vec<Translation>> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(TRANSLATION_BATCH_SIZE) {
            let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, word_id, text FROM translations WHERE word_id IN ({}) ORDER BY id ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::ToSql> =
                chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
            let rows = stmt.query_map(params.as_slice(), |row| Translation::from_row(row))?;

            for translation in rows {
                let translation = translation?;
                by_word.entry(translation.word_id).or_default().push(translation);
            }
        }

        Ok(words
            .into_iter()
            .map(|word| {
                let translations = by_word.remove(&word.id).unwrap_or_default();
                WordWithTranslations { word, translations }
            })
            .collect())
    }
}
