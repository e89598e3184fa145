//! SQLite key-value repository.
//!
//! State lives in a single `kv_state` table keyed by `(namespace, key)`.
//! Schema changes are numbered migrations tracked in `schema_version`, each
//! applied exactly once.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::{Namespace, StateRepository, StoreError};

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "CREATE TABLE IF NOT EXISTS kv_state (
              namespace TEXT NOT NULL,
              key TEXT NOT NULL,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY (namespace, key)
          );",
}];

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let applied = run_migrations(&conn)?;
        if applied > 0 {
            log::info!("SqliteRepository: applied {} migration(s)", applied);
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default database path: `<data_dir>/dealsignal.db`.
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("dealsignal.db")
    }
}

impl StateRepository for SqliteRepository {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT value FROM kv_state WHERE namespace = ?1 AND key = ?2")?;
        let mut rows = stmt.query(params![namespace.as_str(), key])?;
        let value: Option<String> = match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(value)
    }

    fn save(&self, namespace: Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.lock().execute(
            "INSERT INTO kv_state (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![namespace.as_str(), key, value, now],
        )?;
        Ok(())
    }

    fn keys(&self, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key FROM kv_state WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![namespace.as_str()], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

fn current_version(conn: &Connection) -> Result<i32, StoreError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?)
}

/// Run all pending migrations. Returns how many were applied.
fn run_migrations(conn: &Connection) -> Result<usize, StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);
    if current > max_known {
        return Err(StoreError::Migration(format!(
            "database schema version ({}) is newer than supported ({})",
            current, max_known
        )));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration(format!("v{}: {}", migration.version, e)))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )?;
        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}
