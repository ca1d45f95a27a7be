use std::path::{Path, PathBuf};

const APP_DIR: &str = "langcards";
const DB_FILE: &str = "langcards.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_level: String,
    /// Daily-rolling log files are written here when set
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_path = non_empty("LANGCARDS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let log_level = non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let log_dir = non_empty("LANGCARDS_LOG_DIR").map(PathBuf::from);

        Self {
            database_path,
            log_level,
            log_dir,
        }
    }

    /// Create the directory that will hold the database file.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        match self.database_path.parent() {
            Some(dir) if dir != Path::new("") => std::fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR).join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_dir, None);
        assert!(config.database_path.ends_with(DB_FILE));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("LANGCARDS_DB_PATH", "/tmp/cards/test.db"),
            ("RUST_LOG", "langcards=debug"),
            ("LANGCARDS_LOG_DIR", "/tmp/cards/logs"),
        ]);
        assert_eq!(config.database_path, PathBuf::from("/tmp/cards/test.db"));
        assert_eq!(config.log_level, "langcards=debug");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/cards/logs")));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = config(&[("RUST_LOG", "  "), ("LANGCARDS_LOG_DIR", "")]);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn test_ensure_data_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("nested").join("cards.db"),
            ..config(&[])
        };

        config.ensure_data_dir().unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
