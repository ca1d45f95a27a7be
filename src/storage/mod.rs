//! SQLite vocabulary storage
//!
//! Local, single-user store for words and their translations:
//! - word / translation CRUD scoped by language
//! - substring search index kept in the same transaction as every mutation
//! - the persisted "selected language" setting
//! - change notifications that drive live list / search streams

pub mod collation;
pub mod live;
pub mod migrations;
pub mod models;
pub mod search;
pub mod settings;
pub mod word;

pub use live::{ChangeNotifier, LiveStream, StoreChange};
pub use migrations::run_migrations;
pub use models::*;
pub use search::SearchIndex;
pub use settings::SettingsRepository;
pub use word::WordRepository;

use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;

// ============================================================
// Errors
// ============================================================

/// Storage error
#[derive(Error, Debug)]
pub enum StorageError {
    /// Blank field, missing gender for a noun, gender not valid for the language
    #[error("validation failed: {0}")]
    Validation(String),

    /// `(full_word, language)` already stored
    #[error("word already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backing file cannot be opened, read or written
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lock acquisition failed: {0}")]
    LockError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// SQLite result codes that mean the medium itself is unusable.
const UNAVAILABLE_CODES: [ErrorCode; 8] = [
    ErrorCode::CannotOpen,
    ErrorCode::SystemIoFailure,
    ErrorCode::DatabaseBusy,
    ErrorCode::DatabaseLocked,
    ErrorCode::ReadOnly,
    ErrorCode::DiskFull,
    ErrorCode::NotADatabase,
    ErrorCode::DatabaseCorrupt,
];

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        let failure = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => Some((failure.code, failure.extended_code)),
            _ => None,
        };

        match failure {
            Some((code, _)) if UNAVAILABLE_CODES.contains(&code) => {
                StorageError::StorageUnavailable(err.to_string())
            }
            Some((ErrorCode::ConstraintViolation, extended))
                if extended == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StorageError::Conflict(err.to_string())
            }
            _ => StorageError::Database(err),
        }
    }
}

/// Lock the shared connection, turning a poisoned mutex into [`StorageError::LockError`].
pub(crate) fn lock_connection(conn: &Mutex<Connection>) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StorageError::LockError(e.to_string()))
}

// ============================================================
// Storage - shared database handle
// ============================================================

/// Shared handle to the vocabulary database.
///
/// Cloning is cheap; every clone talks to the same connection and the same change channels.
/// All access goes through one mutex, so writers are serialized and each read sees a
/// committed snapshot.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
    changes: ChangeNotifier,
    selected_language: Arc<watch::Sender<Language>>,
}

impl Storage {
    /// Open (or create) the database file and run migrations.
    ///
    /// Fails with [`StorageError::StorageUnavailable`] when the file cannot be opened.
    pub fn open<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();
        let connection = Connection::open(&db_path)?;

        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;

        tracing::info!(path = %path_str, "opened vocabulary database");
        Self::from_connection(connection, path_str)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::from_connection(connection, ":memory:".to_string())
    }

    fn from_connection(connection: Connection, db_path: String) -> StorageResult<Self> {
        collation::register(&connection)?;
        migrations::run_migrations(&connection)?;
        let language = SettingsRepository::load_selected_language(&connection)?;
        let (sender, _) = watch::channel(language);

        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
            db_path,
            changes: ChangeNotifier::new(),
            selected_language: Arc::new(sender),
        })
    }

    /// Path the database was opened from (`:memory:` for in-memory stores)
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Word and translation repository on the shared connection
    pub fn words(&self) -> WordRepository {
        WordRepository::new(Arc::clone(&self.conn), self.changes.clone())
    }

    /// Search index maintenance (rebuild, consistency check)
    pub fn search_index(&self) -> SearchIndex {
        SearchIndex::new(Arc::clone(&self.conn))
    }

    /// Settings store sharing this handle's selected-language channel
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(Arc::clone(&self.conn), Arc::clone(&self.selected_language))
    }

    /// Change channel that drives live queries
    pub fn changes(&self) -> &ChangeNotifier {
        &self.changes
    }

    /// Run `f` inside a transaction; commits on `Ok`, rolls back on `Err`.
    pub fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let mut conn = lock_connection(&self.conn)?;

        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;

        Ok(result)
    }
}
