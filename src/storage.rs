use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};

/// Lifetime of a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Survives restarts.
    Durable,
    /// Lives as long as the process; survives screen navigation only.
    Volatile,
}

/// Read/write/clear access to persisted client state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<String>>;
    fn set(&self, scope: Scope, key: &str, value: &str) -> Result<()>;
    fn remove(&self, scope: Scope, key: &str) -> Result<()>;
}

/// SQLite-backed durable scope plus an in-memory volatile scope.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    volatile: Arc<RwLock<HashMap<String, String>>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;
        tracing::debug!(path = %path.display(), "storage opened");

        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            volatile: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }
}

impl KeyValueStore for Store {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<String>> {
        match scope {
            Scope::Volatile => Ok(self.volatile.read().get(key).cloned()),
            Scope::Durable => {
                let conn = self.conn.lock();
                conn.query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("storage: read {key}"))
            }
        }
    }

    fn set(&self, scope: Scope, key: &str, value: &str) -> Result<()> {
        match scope {
            Scope::Volatile => {
                self.volatile
                    .write()
                    .insert(key.to_string(), value.to_string());
            }
            Scope::Durable => {
                let conn = self.conn.lock();
                conn.execute(
                    r#"
INSERT INTO kv (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
                    params![key, value, unix_now()],
                )
                .with_context(|| format!("storage: write {key}"))?;
            }
        }
        Ok(())
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        match scope {
            Scope::Volatile => {
                self.volatile.write().remove(key);
            }
            Scope::Durable => {
                let conn = self.conn.lock();
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                    .with_context(|| format!("storage: delete {key}"))?;
            }
        }
        Ok(())
    }
}

/// Both scopes in memory. Used by tests and offline browsing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(Scope, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: Scope, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert((scope, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        self.entries.write().remove(&(scope, key.to_string()));
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, unix_now()],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sw-catalogue").join("state.db"))
}
