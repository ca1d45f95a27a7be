//! Property-Based Tests for the word store
//!
//! Invariants covered:
//! - Round-trip: create_word -> get_word returns the normalized word and translation set
//! - Uniqueness: a duplicate (full_word, language) is rejected and changes nothing
//! - Replacement: update_word leaves exactly the new translation set, no orphan rows
//! - Deletion: delete_word removes the word, its translations and its search entry
//! - Search: every stored translation substring finds its word, never a word of the other language

use proptest::prelude::*;
use rusqlite::Connection;

use langcards::{Gender, Language, Storage, StorageError, WordDraft};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_language() -> impl Strategy<Value = Language> {
    prop_oneof![Just(Language::French), Just(Language::Romanian)]
}

fn arb_full_word() -> impl Strategy<Value = String> {
    "[a-zăâîșțéèç]{1,8}( [a-zăâîșțéèç]{1,8})?"
}

fn arb_translations() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[а-яё]{1,10}", 1..5)
}

fn arb_gender(language: Language) -> BoxedStrategy<Option<Gender>> {
    match language {
        Language::French => prop_oneof![
            Just(None),
            Just(Some(Gender::Masculine)),
            Just(Some(Gender::Feminine)),
        ]
        .boxed(),
        Language::Romanian => prop_oneof![
            Just(None),
            Just(Some(Gender::Masculine)),
            Just(Some(Gender::Feminine)),
            Just(Some(Gender::Neuter)),
        ]
        .boxed(),
    }
}

fn arb_draft() -> impl Strategy<Value = WordDraft> {
    arb_language().prop_flat_map(|language| {
        (arb_full_word(), arb_gender(language), arb_translations()).prop_map(
            move |(full_word, gender, translations)| {
                WordDraft::new(full_word, gender, language, translations)
            },
        )
    })
}

fn dedup(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn count(storage: &Storage, sql: &str) -> i64 {
    storage
        .transaction(|conn: &Connection| Ok(conn.query_row(sql, [], |row| row.get(0))?))
        .expect("count query failed")
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_create_get_round_trip(draft in arb_draft()) {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();

        let id = repo.create_word(&draft).unwrap();
        let stored = repo.get_word(id).unwrap().expect("created word must be readable");

        prop_assert_eq!(&stored.word.full_word, &draft.full_word);
        prop_assert_eq!(stored.word.gender, draft.gender);
        prop_assert_eq!(stored.word.language, draft.language);
        prop_assert_eq!(stored.translation_texts(), dedup(&draft.translations));
    }

    #[test]
    fn prop_duplicate_is_rejected_without_side_effects(
        draft in arb_draft(),
        other_translations in arb_translations(),
    ) {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();
        repo.create_word(&draft).unwrap();

        let words_before = count(&storage, "SELECT COUNT(*) FROM words");
        let translations_before = count(&storage, "SELECT COUNT(*) FROM translations");

        let duplicate = WordDraft::new(
            draft.full_word.to_uppercase(),
            draft.gender,
            draft.language,
            other_translations,
        );
        let result = repo.create_word(&duplicate);
        prop_assert!(matches!(result, Err(StorageError::Conflict(_))));

        prop_assert_eq!(count(&storage, "SELECT COUNT(*) FROM words"), words_before);
        prop_assert_eq!(count(&storage, "SELECT COUNT(*) FROM translations"), translations_before);
    }

    #[test]
    fn prop_update_replaces_translation_set(
        draft in arb_draft(),
        replacement in arb_translations(),
    ) {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();
        let id = repo.create_word(&draft).unwrap();

        let edited = WordDraft { translations: replacement.clone(), ..draft.clone() };
        repo.update_word(id, &edited).unwrap();

        let stored = repo.get_word(id).unwrap().unwrap();
        let expected = dedup(&replacement);
        prop_assert_eq!(stored.translation_texts(), expected.clone());
        prop_assert_eq!(
            count(&storage, "SELECT COUNT(*) FROM translations"),
            expected.len() as i64
        );
        prop_assert_eq!(storage.search_index().missing_entries().unwrap(), 0);
    }

    #[test]
    fn prop_delete_removes_everything(draft in arb_draft()) {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();
        let id = repo.create_word(&draft).unwrap();

        prop_assert!(repo.delete_word(id).unwrap());
        prop_assert!(repo.get_word(id).unwrap().is_none());
        prop_assert_eq!(count(&storage, "SELECT COUNT(*) FROM translations"), 0);
        prop_assert_eq!(count(&storage, "SELECT COUNT(*) FROM word_search"), 0);
        prop_assert!(!repo.delete_word(id).unwrap());
    }

    #[test]
    fn prop_translation_substring_finds_word(
        draft in arb_draft(),
        start in 0usize..10,
        len in 1usize..4,
    ) {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();
        let id = repo.create_word(&draft).unwrap();

        let translation: Vec<char> = draft.translations[0].chars().collect();
        let start = start % translation.len();
        let end = (start + len).min(translation.len());
        let needle: String = translation[start..end].iter().collect();

        let hits = repo.search(&needle.to_uppercase(), draft.language).unwrap();
        prop_assert!(hits.iter().any(|w| w.id() == id));

        let other = match draft.language {
            Language::French => Language::Romanian,
            Language::Romanian => Language::French,
        };
        prop_assert!(repo.search(&needle, other).unwrap().is_empty());
    }
}

// ============================================================================
// File-backed storage
// ============================================================================

#[test]
fn test_words_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cards.db");

    let id = {
        let storage = Storage::open(&path).unwrap();
        storage
            .words()
            .create_word(&WordDraft::new("o pisică", Some(Gender::Feminine), Language::Romanian, ["кошка"]))
            .unwrap()
    };

    let reopened = Storage::open(&path).unwrap();
    let word = reopened.words().get_word(id).unwrap().unwrap();
    assert_eq!(word.word.full_word, "o pisică");
    assert_eq!(reopened.words().search("кош", Language::Romanian).unwrap().len(), 1);
}
