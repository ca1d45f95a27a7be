//! Word ordering
//!
//! `WORD_ORDER` sorts full words the way a dictionary does: accents and case are ignored
//! first ("école" sits between "abricot" and "zèbre"), then exact text breaks ties.

use rusqlite::Connection;
use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;

use crate::storage::StorageResult;

/// Collation name used in `ORDER BY ... COLLATE`
pub const WORD_COLLATION: &str = "WORD_ORDER";

/// Primary sort key: decomposed, combining marks dropped, lowercased.
pub fn sort_key(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn compare_words(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(&sort_key(b)).then_with(|| a.cmp(b))
}

/// Register [`WORD_COLLATION`] on a connection. Needed before any ordered word query.
pub(crate) fn register(conn: &Connection) -> StorageResult<()> {
    conn.create_collation(WORD_COLLATION, compare_words)?;
    Ok(())
}
