//! Substring search index
//!
//! `word_search` keeps one denormalized row per word: the full word and every translation
//! joined by [`FIELD_SEPARATOR`]. Rows are rewritten inside the same transaction as the
//! mutation that changed the word, so a reader never sees a word without its index entry.
//!
//! Matching is literal containment (`instr`) against lowercase text. Queries are lowercased in
//! Rust because SQLite's `lower()` only folds ASCII.

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::storage::collation::WORD_COLLATION;
use crate::storage::models::{Language, Word, WordWithTranslations};
use crate::storage::word::WordRepository;
use crate::storage::{lock_connection, StorageResult};

/// Separates fields inside `search_text` (ASCII unit separator, `char(31)` in SQL)
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Normalize a raw query. `None` means "no filter".
pub fn normalize_query(raw: &str) -> Option<String> {
    let query: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != FIELD_SEPARATOR)
        .collect();

    if query.is_empty() {
        None
    } else {
        Some(query)
    }
}

/// Read and maintenance access to the search index
pub struct SearchIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SearchIndex {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Words of `language` whose full word or any translation contains `query`.
    ///
    /// Ordered by full word. A blank query lists every word of the language.
    pub fn search(&self, query: &str, language: Language) -> StorageResult<Vec<WordWithTranslations>> {
        let conn = lock_connection(&self.conn)?;
        Self::search_internal(&conn, query, language)
    }

    /// Regenerate every index row from `words` and `translations`.
    ///
    /// Returns the number of indexed words.
    pub fn rebuild(&self) -> StorageResult<usize> {
        let mut conn = lock_connection(&self.conn)?;
        let tx = conn.transaction()?;
        let indexed = Self::rebuild_internal(&tx)?;
        tx.commit()?;

        tracing::info!(indexed, "search index rebuilt");
        Ok(indexed)
    }

    /// Number of words that have no index row. Zero unless the database was edited by hand.
    pub fn missing_entries(&self) -> StorageResult<i64> {
        let conn = lock_connection(&self.conn)?;
        let missing = conn.query_row(
            "SELECT COUNT(*) FROM words w LEFT JOIN word_search s ON s.word_id = w.id
             WHERE s.word_id IS NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(missing)
    }

    // ============================================================
    // Internal (called with the connection or transaction already held)
    // ============================================================

    pub(crate) fn search_internal(
        conn: &Connection,
        query: &str,
        language: Language,
    ) -> StorageResult<Vec<WordWithTranslations>> {
        let Some(query) = normalize_query(query) else {
            return WordRepository::list_words_internal(conn, language);
        };

        let sql = format!(
            r#"
            SELECT {}
            FROM words w
            JOIN word_search s ON s.word_id = w.id
            WHERE s.language = ?1 AND instr(s.search_text, ?2) > 0
            ORDER BY w.full_word COLLATE {} ASC, w.id ASC
            "#,
            Word::COLUMNS,
            WORD_COLLATION
        );

        let mut stmt = conn.prepare(&sql)?;
        let words = stmt
            .query_map(params![language, query], |row| Word::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        WordRepository::attach_translations(conn, words)
    }

    /// Rewrite the index row of one word from its current rows.
    pub(crate) fn refresh_internal(conn: &Connection, word_id: i64) -> StorageResult<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO word_search (word_id, language, search_text)
            SELECT w.id,
                   w.language,
                   w.full_word || char(31) || COALESCE(
                       (SELECT group_concat(t.text, char(31))
                        FROM translations t WHERE t.word_id = w.id),
                       ''
                   )
            FROM words w
            WHERE w.id = ?1
            "#,
            params![word_id],
        )?;

        Ok(())
    }

    pub(crate) fn remove_internal(conn: &Connection, word_id: i64) -> StorageResult<()> {
        conn.execute("DELETE FROM word_search WHERE word_id = ?1", params![word_id])?;
        Ok(())
    }

    pub(crate) fn rebuild_internal(conn: &Connection) -> StorageResult<usize> {
        conn.execute("DELETE FROM word_search", [])?;
        let indexed = conn.execute(
            r#"
            INSERT INTO word_search (word_id, language, search_text)
            SELECT w.id,
                   w.language,
                   w.full_word || char(31) || COALESCE(
                       (SELECT group_concat(t.text, char(31))
                        FROM translations t WHERE t.word_id = w.id),
                       ''
                   )
            FROM words w
            "#,
            [],
        )?;

        Ok(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{Gender, WordDraft};
    use crate::storage::Storage;

    fn seeded() -> Storage {
        let storage = Storage::in_memory().expect("Failed to create in-memory storage");
        let words = storage.words();
        words
            .create_word(&WordDraft::new("le chat", Some(Gender::Masculine), Language::French, ["кот"]))
            .unwrap();
        words
            .create_word(&WordDraft::new("la table", Some(Gender::Feminine), Language::French, ["стол"]))
            .unwrap();
        words
            .create_word(&WordDraft::new("o pisică", Some(Gender::Feminine), Language::Romanian, ["кошка"]))
            .unwrap();
        storage
    }

    fn full_words(results: &[WordWithTranslations]) -> Vec<&str> {
        results.iter().map(|w| w.word.full_word.as_str()).collect()
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  HaT "), Some("hat".to_string()));
        assert_eq!(normalize_query("   "), None);
        assert_eq!(normalize_query("\u{1f}"), None);
        assert_eq!(normalize_query("КОТ"), Some("кот".to_string()));
    }

    #[test]
    fn test_search_matches_word_and_translation() {
        let storage = seeded();
        let index = storage.search_index();

        let by_word = index.search("hat", Language::French).unwrap();
        assert_eq!(full_words(&by_word), vec!["le chat"]);

        let by_translation = index.search("кот", Language::French).unwrap();
        assert_eq!(full_words(&by_translation), vec!["le chat"]);

        let upper = index.search("  КОТ ", Language::French).unwrap();
        assert_eq!(full_words(&upper), vec!["le chat"]);
    }

    #[test]
    fn test_search_is_scoped_by_language() {
        let storage = seeded();
        let index = storage.search_index();

        // "кошка" contains "кош" but belongs to a Romanian word
        assert!(index.search("кош", Language::French).unwrap().is_empty());
        let romanian = index.search("кош", Language::Romanian).unwrap();
        assert_eq!(full_words(&romanian), vec!["o pisică"]);
    }

    #[test]
    fn test_blank_query_lists_language() {
        let storage = seeded();
        let results = storage.search_index().search("  ", Language::French).unwrap();
        assert_eq!(full_words(&results), vec!["la table", "le chat"]);
    }

    #[test]
    fn test_query_cannot_span_fields() {
        let storage = seeded();
        // "chat" + separator + "кот" would only match across the field boundary
        let results = storage
            .search_index()
            .search("at\u{1f}ко", Language::French)
            .unwrap();
        assert!(results.is_empty());
        let joined = storage.search_index().search("atк", Language::French).unwrap();
        assert!(joined.is_empty());
    }

    #[test]
    fn test_rebuild_restores_missing_rows() {
        let storage = seeded();
        storage
            .transaction(|conn| {
                conn.execute("DELETE FROM word_search", [])?;
                Ok(())
            })
            .unwrap();

        let index = storage.search_index();
        assert_eq!(index.missing_entries().unwrap(), 3);
        assert!(index.search("chat", Language::French).unwrap().is_empty());

        assert_eq!(index.rebuild().unwrap(), 3);
        assert_eq!(index.missing_entries().unwrap(), 0);
        assert_eq!(index.search("chat", Language::French).unwrap().len(), 1);
    }
}
