//! Settings store
//!
//! Persists the selected language in `app_settings` (JSON values) and publishes the current
//! value through a `tokio::sync::watch` channel so collaborators can observe changes.

use chrono::Utc;
use futures_util::stream::{BoxStream, StreamExt};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::storage::models::{format_datetime, Language};
use crate::storage::{lock_connection, StorageResult};

/// `app_settings` key of the selected language
pub const SELECTED_LANGUAGE_KEY: &str = "selected_language";

pub struct SettingsRepository {
    conn: Arc<Mutex<Connection>>,
    selected_language: Arc<watch::Sender<Language>>,
}

impl SettingsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>, selected_language: Arc<watch::Sender<Language>>) -> Self {
        Self {
            conn,
            selected_language,
        }
    }

    /// Currently selected language (FRENCH until set)
    pub fn selected_language(&self) -> Language {
        *self.selected_language.borrow()
    }

    /// Persist `language`, then publish it to observers.
    pub fn set_selected_language(&self, language: Language) -> StorageResult<()> {
        {
            let conn = lock_connection(&self.conn)?;
            Self::save_value(&conn, SELECTED_LANGUAGE_KEY, &serde_json::to_string(&language)?)?;
        }

        let previous = self.selected_language.send_replace(language);
        if previous != language {
            tracing::info!(?previous, current = ?language, "selected language changed");
        }
        Ok(())
    }

    /// Receiver of the selected language; `borrow()` is always the latest value.
    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.selected_language.subscribe()
    }

    /// Current value first, then every change.
    pub fn watch_selected_language(&self) -> BoxStream<'static, Language> {
        WatchStream::new(self.subscribe()).boxed()
    }

    // ============================================================
    // Internal
    // ============================================================

    /// Read the persisted language. Missing or unreadable values fall back to FRENCH.
    pub(crate) fn load_selected_language(conn: &Connection) -> StorageResult<Language> {
        let Some(raw) = Self::load_value(conn, SELECTED_LANGUAGE_KEY)? else {
            return Ok(Language::default());
        };

        match serde_json::from_str(&raw) {
            Ok(language) => Ok(language),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "ignoring unreadable selected language");
                Ok(Language::default())
            }
        }
    }

    fn load_value(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn save_value(conn: &Connection, key: &str, value: &str) -> StorageResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, format_datetime(Utc::now())],
        )?;

        Ok(())
    }
}
