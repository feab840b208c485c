// Token persistence
// One key-value entry, `auth_token`, that survives restarts

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key the token is persisted under
pub const TOKEN_KEY: &str = "auth_token";

/// Local key-value storage holding the token
pub trait TokenStore: Send + Sync {
    /// Stored token, `None` until the first successful login
    fn load(&self) -> Result<Option<String>>;

    /// Overwrite the stored token
    fn save(&self, token: &str) -> Result<()>;
}

/// SQLite-backed store using an `auth_kv(key, value)` table
pub struct SqliteTokenStore {
    path: PathBuf,
}

impl SqliteTokenStore {
    /// Open (and create if needed) the store at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };

        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }

        let conn = store.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to create auth_kv table")?;

        tracing::debug!("Token store ready at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<rusqlite::Connection> {
        rusqlite::Connection::open(&self.path)
            .with_context(|| format!("Failed to open SQLite database: {}", self.path.display()))
    }
}

impl TokenStore for SqliteTokenStore {
    fn load(&self) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;

        let conn = self.connect()?;
        conn.query_row(
            "SELECT value FROM auth_kv WHERE key = ?",
            [TOKEN_KEY],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to load token from SQLite")
    }

    fn save(&self, token: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO auth_kv (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [TOKEN_KEY, token],
        )
        .context("Failed to save token to SQLite")?;
        Ok(())
    }
}

/// In-process store, lost on exit
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(TOKEN_KEY.to_string(), token.to_string());
        }
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        Ok(entries.get(TOKEN_KEY).cloned())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_store_lazily_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTokenStore::open(dir.path().join("nested/store.sqlite3")).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");

        let store = SqliteTokenStore::open(&path).unwrap();
        store.save("first").unwrap();
        store.save("Bearer second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("Bearer second"));

        // Survives reopening
        let reopened = SqliteTokenStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap().as_deref(), Some("Bearer second"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

        let store = MemoryTokenStore::with_token("xyz");
        assert_eq!(store.load().unwrap().as_deref(), Some("xyz"));
    }
}
