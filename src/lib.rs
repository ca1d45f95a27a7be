//! Langcards: a local French/Romanian vocabulary store.
//!
//! - [`storage`]: SQLite word/translation store, substring search, settings, live streams
//! - [`quiz`]: multiple-choice and article + translation quiz sessions
//! - [`service`]: the facade a UI layer talks to
//!
//! ```no_run
//! use langcards::{Config, Gender, Language, VocabularyService, WordDraft};
//!
//! let config = Config::from_env();
//! let _log_guard = langcards::logging::init_tracing(&config);
//!
//! let service = VocabularyService::open(&config)?;
//! service.create_word(&WordDraft::new("le chat", Some(Gender::Masculine), Language::French, ["кот"]))?;
//! let hits = service.search("hat", Language::French)?;
//! assert_eq!(hits.len(), 1);
//! # Ok::<(), langcards::StorageError>(())
//! ```

pub mod config;
pub mod logging;
pub mod quiz;
pub mod service;
pub mod storage;

pub use config::Config;
pub use quiz::{ExhaustedReason, QuizError, QuizResult, WordSource};
pub use service::{user_message, VocabularyService};
pub use storage::{
    Gender, Language, LiveStream, Storage, StorageError, StorageResult, StoreChange, Translation,
    Word, WordDraft, WordWithTranslations,
};
