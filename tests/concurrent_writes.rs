//! Concurrent writers on one word
//!
//! Several threads update, delete and re-create the same word through clones of one `Storage`
//! while a reader checks every committed snapshot:
//! - no translation or index row outlives its word
//! - every stored word has its index row and a full translation set
//! - a translation set always comes from a single update (writes never interleave)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use langcards::{Gender, Language, Storage, StorageError, StorageResult, WordDraft};

const WRITERS: usize = 8;
const ROUNDS: usize = 50;
const FULL_WORD: &str = "la masă";

fn draft(writer: usize) -> WordDraft {
    WordDraft::new(
        FULL_WORD,
        Some(Gender::Feminine),
        Language::Romanian,
        [format!("w{}-a", writer), format!("w{}-b", writer)],
    )
}

fn current_id(storage: &Storage) -> StorageResult<Option<i64>> {
    Ok(storage
        .words()
        .list_words(Language::Romanian)?
        .first()
        .map(|w| w.id()))
}

fn write_round(storage: &Storage, writer: usize, round: usize) -> StorageResult<()> {
    let repo = storage.words();
    let result = match (round + writer) % 4 {
        0 => match current_id(storage)? {
            Some(id) => repo.delete_word(id).map(|_| ()),
            None => Ok(()),
        },
        3 => repo.create_word(&draft(writer)).map(|_| ()),
        _ => match current_id(storage)? {
            Some(id) => repo.update_word(id, &draft(writer)),
            None => Ok(()),
        },
    };

    match result {
        // Lost races against another writer are expected outcomes.
        Ok(()) | Err(StorageError::NotFound(_)) | Err(StorageError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Returns a description of the first broken invariant in the current snapshot.
fn check_snapshot(storage: &Storage) -> Option<String> {
    let counts: (i64, i64, i64) = storage
        .transaction(|conn| {
            let orphan_translations = conn.query_row(
                "SELECT COUNT(*) FROM translations t LEFT JOIN words w ON w.id = t.word_id
                 WHERE w.id IS NULL",
                [],
                |row| row.get(0),
            )?;
            let orphan_index = conn.query_row(
                "SELECT COUNT(*) FROM word_search s LEFT JOIN words w ON w.id = s.word_id
                 WHERE w.id IS NULL",
                [],
                |row| row.get(0),
            )?;
            let bare_words = conn.query_row(
                "SELECT COUNT(*) FROM words w
                 WHERE NOT EXISTS (SELECT 1 FROM translations t WHERE t.word_id = w.id)",
                [],
                |row| row.get(0),
            )?;
            Ok((orphan_translations, orphan_index, bare_words))
        })
        .expect("snapshot query failed");

    if counts != (0, 0, 0) {
        return Some(format!("orphans/bare words: {:?}", counts));
    }

    let missing = storage.search_index().missing_entries().expect("missing_entries failed");
    if missing != 0 {
        return Some(format!("{} words without index row", missing));
    }

    for word in storage.words().list_all_words().expect("list failed") {
        let texts = word.translation_texts();
        let prefix = texts.first().and_then(|t| t.split('-').next()).unwrap_or_default();
        if texts.len() != 2 || !texts.iter().all(|t| t.starts_with(&format!("{}-", prefix))) {
            return Some(format!("mixed translation set {:?}", texts));
        }
    }

    None
}

#[test]
fn test_concurrent_update_and_delete_keep_rows_consistent() {
    let storage = Storage::in_memory().expect("Failed to create in-memory storage");
    storage.words().create_word(&draft(0)).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let checker = {
        let storage = storage.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut violations = Vec::new();
            while !done.load(Ordering::SeqCst) {
                if let Some(violation) = check_snapshot(&storage) {
                    violations.push(violation);
                }
            }
            violations
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let storage = storage.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    write_round(&storage, writer, round)?;
                }
                Ok::<(), StorageError>(())
            })
        })
        .collect();

    for handle in writers {
        handle.join().expect("writer panicked").expect("writer hit an unexpected error");
    }
    done.store(true, Ordering::SeqCst);

    let violations = checker.join().expect("checker panicked");
    assert!(violations.is_empty(), "inconsistent snapshots: {:?}", violations);
    assert_eq!(check_snapshot(&storage), None);

    // At most one copy of the word survives.
    assert!(storage.words().count_words(Language::Romanian).unwrap() <= 1);
}
