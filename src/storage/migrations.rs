//! Schema migrations
//!
//! Brings the SQLite schema up to the version this build expects.
//!
//! ## Strategy
//! - every migration runs in its own `BEGIN IMMEDIATE` transaction
//! - applied versions are recorded in `schema_migrations`
//! - migrations are idempotent (`IF NOT EXISTS`) so a half-initialized file can be reopened

use rusqlite::Connection;

use crate::storage::{StorageError, StorageResult};

/// Schema version produced by [`run_migrations`].
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Base tables (v1)
const INIT_SCHEMA: &str = include_str!("schema.sql");

/// Search index table plus a backfill from existing rows (v2).
///
/// `char(31)` is the field separator used by [`crate::storage::search`].
const SEARCH_INDEX_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS word_search (
    word_id INTEGER PRIMARY KEY,
    language INTEGER NOT NULL,
    search_text TEXT NOT NULL,
    FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_word_search_language
    ON word_search(language);

INSERT OR REPLACE INTO word_search (word_id, language, search_text)
    SELECT w.id,
           w.language,
           w.full_word || char(31) || COALESCE(
               (SELECT group_concat(t.text, char(31)) FROM translations t WHERE t.word_id = w.id),
               ''
           )
    FROM words w;
"#;

/// A single schema migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i32,
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(version: i32, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// All migrations, ordered by version.
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration::new(1, "initial schema", INIT_SCHEMA),
        Migration::new(2, "search index", SEARCH_INDEX_SCHEMA),
    ]
}

fn ensure_migrations_table(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| StorageError::Migration(format!("failed to create schema_migrations: {}", e)))?;

    Ok(())
}

/// Highest applied migration version, 0 for a fresh database.
pub fn get_current_version(conn: &Connection) -> StorageResult<i32> {
    ensure_migrations_table(conn)?;

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn get_applied_versions(conn: &Connection) -> StorageResult<Vec<i32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i32>, _>>()?;

    Ok(versions)
}

fn record_migration(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.name,
            chrono::Utc::now().timestamp()
        ],
    )?;

    Ok(())
}

/// Run every pending migration.
///
/// Returns the schema version after the run.
pub fn run_migrations(conn: &Connection) -> StorageResult<i32> {
    ensure_migrations_table(conn)?;

    let applied_versions = get_applied_versions(conn)?;
    let mut final_version = get_current_version(conn)?;

    tracing::debug!(
        current = final_version,
        target = CURRENT_SCHEMA_VERSION,
        "checking schema migrations"
    );

    for migration in get_migrations() {
        if applied_versions.contains(&migration.version) {
            continue;
        }

        tracing::info!(version = migration.version, name = %migration.name, "running migration");

        match execute_migration_in_transaction(conn, &migration) {
            Ok(()) => {
                final_version = migration.version;
            }
            Err(e) => {
                tracing::error!(version = migration.version, error = %e, "migration failed");
                return Err(e);
            }
        }
    }

    Ok(final_version)
}

fn execute_migration_in_transaction(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    conn.execute_batch("BEGIN IMMEDIATE")?;

    let outcome = conn
        .execute_batch(&migration.sql)
        .map_err(|e| {
            StorageError::Migration(format!("migration v{} failed: {}", migration.version, e))
        })
        .and_then(|()| record_migration(conn, migration));

    match outcome {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK").ok();
            Err(e)
        }
    }
}

/// Applied migration, as stored in `schema_migrations`
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i32,
    pub name: String,
    pub applied_at: i64,
}

pub fn get_migration_history(conn: &Connection) -> StorageResult<Vec<MigrationRecord>> {
    ensure_migrations_table(conn)?;

    let mut stmt =
        conn.prepare("SELECT version, name, applied_at FROM schema_migrations ORDER BY version")?;

    let records = stmt
        .query_map([], |row| {
            Ok(MigrationRecord {
                version: row.get(0)?,
                name: row.get(1)?,
                applied_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        conn
    }

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let conn = open();
        assert_eq!(get_current_version(&conn).unwrap(), 0);

        let version = run_migrations(&conn).expect("Failed to run migrations");
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
        assert_eq!(get_current_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = open();
        run_migrations(&conn).unwrap();
        let version = run_migrations(&conn).expect("Second run should be a no-op");
        assert_eq!(version, CURRENT_SCHEMA_VERSION);

        let history = get_migration_history(&conn).unwrap();
        assert_eq!(history.len(), get_migrations().len());
        assert_eq!(history[0].name, "initial schema");
        assert_eq!(history[1].version, 2);
    }

    #[test]
    fn test_search_index_backfill() {
        let conn = open();
        ensure_migrations_table(&conn).unwrap();
        let v1 = &get_migrations()[0];
        execute_migration_in_transaction(&conn, v1).unwrap();

        conn.execute_batch(
            r#"
            INSERT INTO words (id, full_word, gender, language, created_at, updated_at)
                VALUES (1, 'le chat', 2, 1, '2024-01-01 00:00:00', '2024-01-01 00:00:00');
            INSERT INTO translations (word_id, text) VALUES (1, 'кот');
            INSERT INTO translations (word_id, text) VALUES (1, 'кошка');
            "#,
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let text: String = conn
            .query_row("SELECT search_text FROM word_search WHERE word_id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(text.starts_with("le chat\u{1f}"));
        assert!(text.contains("кот"));
        assert!(text.contains("кошка"));
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let conn = open();
        ensure_migrations_table(&conn).unwrap();
        let broken = Migration::new(99, "broken", "CREATE TABLE ok_table (id INTEGER); SELEC nonsense;");

        let result = execute_migration_in_transaction(&conn, &broken);
        assert!(matches!(result, Err(StorageError::Migration(_))));

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='ok_table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!exists);
        assert_eq!(get_current_version(&conn).unwrap(), 0);
    }
}
